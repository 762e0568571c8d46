//! gceflow Cloud Orchestration
//!
//! Provisions and tears down groups of compute nodes on a platform where every
//! mutation is an asynchronous operation that has to be polled to completion.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  gceflow CLI                     │
//! │        (create / destroy / destroy-group)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 gceflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │            GroupOrchestrator              │   │
//! │  └──────┬─────────────────────────┬─────────┘   │
//! │  ┌──────▼───────────┐  ┌──────────▼─────────┐   │
//! │  │ NodeProvisioner  │  │ TeardownCoordinator│   │
//! │  │ ResourceEnsurer  │  │                    │   │
//! │  └──────┬───────────┘  └──────────┬─────────┘   │
//! │  ┌──────▼─────────────────────────▼─────────┐   │
//! │  │   Compute  (submit → OperationPoller)     │   │
//! │  │   trait ComputePlatform { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ compute engine│ │   in-memory   │
//! │  (REST, v1)   │ │  (test-utils) │
//! └───────────────┘ └───────────────┘
//! ```

pub mod compute;
pub mod ensurer;
pub mod error;
pub mod image;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod naming;
pub mod node;
pub mod operation;
pub mod orchestrator;
pub mod platform;
pub mod poller;
pub mod provisioner;
pub mod report;
pub mod request;
pub mod resource;
pub mod retry;
pub mod teardown;

// Re-exports
pub use compute::Compute;
pub use ensurer::ResourceEnsurer;
pub use error::{CloudError, ErrorCode, Result};
pub use image::{ImageInfo, OperatingSystem};
pub use naming::NodeId;
pub use node::{LoginCredentials, Node, NodeSpec, NodeTemplate};
pub use operation::{Operation, OperationError, OperationHandle, OperationKind, OperationStatus};
pub use orchestrator::{GroupOrchestrator, OrchestratorConfig};
pub use platform::{ComputePlatform, ListFilter};
pub use poller::OperationPoller;
pub use provisioner::NodeProvisioner;
pub use report::{LaunchReport, NodeFailure, SharedResources, TeardownReport};
pub use request::{NewDisk, NewFirewall, NewInstance, NewNetwork, ResourceRequest, ResourceUpdate};
pub use resource::{
    AttachedDisk, Disk, Firewall, FirewallRule, Instance, InstanceStatus, Network,
    NetworkInterface, PlatformResource, Resource, ResourceKind, ResourceRef, Scope, Tags,
};
pub use retry::{PollConfig, RetryConfig};
pub use teardown::TeardownCoordinator;
