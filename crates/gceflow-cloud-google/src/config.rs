//! Connection settings for the Compute Engine API

use crate::error::{GoogleError, Result};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/compute/v1";

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub project: String,
    /// OAuth2 bearer token with the compute scope
    pub access_token: String,
    pub api_base: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl GoogleConfig {
    pub fn new(project: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            access_token: access_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create GoogleConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let project = std::env::var("GCEFLOW_PROJECT")
            .map_err(|_| GoogleError::MissingEnvVar("GCEFLOW_PROJECT".to_string()))?;
        let access_token = std::env::var("GCEFLOW_ACCESS_TOKEN")
            .map_err(|_| GoogleError::MissingEnvVar("GCEFLOW_ACCESS_TOKEN".to_string()))?;

        let mut config = Self::new(project, access_token);
        if let Ok(api_base) = std::env::var("GCEFLOW_API_BASE") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn project_url(&self) -> String {
        format!("{}/projects/{}", self.api_base.trim_end_matches('/'), self.project)
    }

    /// Resolve `project/image`, a bare image name, or a full link
    pub fn image_link(&self, image: &str) -> String {
        if image.starts_with("https://") {
            return image.to_string();
        }
        match image.split_once('/') {
            Some((project, name)) => format!(
                "{}/projects/{}/global/images/{}",
                self.api_base.trim_end_matches('/'),
                project,
                name
            ),
            None => format!("{}/global/images/{}", self.project_url(), image),
        }
    }

    pub fn machine_type_link(&self, zone: &str, machine_type: &str) -> String {
        if machine_type.starts_with("https://") {
            return machine_type.to_string();
        }
        format!(
            "{}/zones/{}/machineTypes/{}",
            self.project_url(),
            zone,
            machine_type
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.is_empty() {
            return Err(GoogleError::InvalidConfig("project is empty".to_string()));
        }
        if self.access_token.is_empty() {
            return Err(GoogleError::InvalidConfig(
                "access token is empty".to_string(),
            ));
        }
        Ok(())
    }
}
