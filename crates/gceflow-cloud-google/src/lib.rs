//! Compute Engine platform for gceflow
//!
//! Implements the `ComputePlatform` trait over the Compute Engine v1 REST
//! API. Authentication uses a ready OAuth2 bearer token; acquiring and
//! refreshing that token is left to the caller.
//!
//! # Requirements
//!
//! - `GCEFLOW_PROJECT` and `GCEFLOW_ACCESS_TOKEN` env vars (for `GoogleConfig::from_env`)
//!
//! # Example
//!
//! ```ignore
//! use gceflow_cloud::{Compute, GroupOrchestrator, OrchestratorConfig};
//! use gceflow_cloud_google::{GoogleConfig, GooglePlatform};
//! use std::sync::Arc;
//!
//! let platform = GooglePlatform::new(GoogleConfig::from_env()?)?;
//! let orchestrator = GroupOrchestrator::new(
//!     Compute::new(Arc::new(platform)),
//!     OrchestratorConfig::default(),
//! );
//! let nodes = orchestrator.list_nodes(Some("web")).await?;
//! ```

pub mod config;
pub mod error;
pub mod platform;
pub mod wire;

pub use config::{DEFAULT_API_BASE, GoogleConfig};
pub use error::{GoogleError, Result};
pub use platform::GooglePlatform;
