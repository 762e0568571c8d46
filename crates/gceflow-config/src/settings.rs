//! `gceflow.yaml` のスキーマ
//!
//! ```yaml
//! project: myproject
//! zone: us-central1-a
//! concurrency: 4
//! node:
//!   machine_type: f1-micro
//!   image: debian-cloud/debian-7-wheezy-v20140718
//!   inbound_ports: [22, 80]
//!   login_user: gceflow
//!   public_key_path: ~/.ssh/id_rsa.pub
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PROJECT_ENV: &str = "GCEFLOW_PROJECT";
pub const ZONE_ENV: &str = "GCEFLOW_ZONE";
pub const ACCESS_TOKEN_ENV: &str = "GCEFLOW_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub project: String,
    #[serde(default = "default_zone")]
    pub zone: String,
    /// Bearer トークン。通常は `GCEFLOW_ACCESS_TOKEN` で渡す
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub node: NodeDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            max_interval_ms: 5_000,
            multiplier: 1.5,
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// CLI が作成する全ノードに適用するテンプレート値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDefaults {
    pub machine_type: String,
    /// `project/image`、イメージ名のみ、または完全なリンク
    pub image: String,
    pub disk_size_gb: u32,
    pub inbound_ports: Vec<u16>,
    pub external_ip: bool,
    pub login_user: Option<String>,
    pub public_key_path: Option<PathBuf>,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            machine_type: "f1-micro".to_string(),
            image: "debian-cloud/debian-7-wheezy-v20140718".to_string(),
            disk_size_gb: 10,
            inbound_ports: vec![22],
            external_ip: true,
            login_user: None,
            public_key_path: None,
        }
    }
}

fn default_zone() -> String {
    "us-central1-a".to_string()
}

fn default_resource_prefix() -> String {
    "gceflow".to_string()
}

fn default_concurrency() -> usize {
    4
}

impl Settings {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// 環境変数 `GCEFLOW_PROJECT`, `GCEFLOW_ZONE`, `GCEFLOW_ACCESS_TOKEN` はファイルより優先
    pub fn apply_env(&mut self) {
        if let Ok(project) = std::env::var(PROJECT_ENV) {
            self.project = project;
        }
        if let Ok(zone) = std::env::var(ZONE_ENV) {
            self.zone = zone;
        }
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            self.access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::Invalid("project が空です".into()));
        }
        if self.zone.trim().is_empty() {
            return Err(ConfigError::Invalid("zone が空です".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency は 1 以上にしてください".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts は 1 以上にしてください".into(),
            ));
        }
        if self.node.inbound_ports.is_empty() {
            return Err(ConfigError::Invalid(
                "node.inbound_ports にポートを 1 つ以上指定してください".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_minimal_settings_use_defaults() {
        let settings = Settings::from_yaml_str("project: myproject\n").unwrap();
        assert_eq!(settings.zone, "us-central1-a");
        assert_eq!(settings.resource_prefix, "gceflow");
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.poll, PollSettings::default());
        assert_eq!(settings.node.inbound_ports, vec![22]);
        assert!(settings.access_token.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_full_settings() {
        let yaml = r#"
project: myproject
zone: europe-west1-b
resource_prefix: lab
concurrency: 8
poll:
  max_interval_ms: 2000
retry:
  max_attempts: 5
node:
  machine_type: n1-standard-1
  inbound_ports: [22, 8080]
  login_user: jclouds
  public_key_path: /home/jclouds/.ssh/id_rsa.pub
"#;
        let settings = Settings::from_yaml_str(yaml).unwrap();
        assert_eq!(settings.resource_prefix, "lab");
        assert_eq!(settings.poll.max_interval_ms, 2000);
        assert_eq!(settings.poll.initial_interval_ms, 500);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.node.machine_type, "n1-standard-1");
        assert_eq!(settings.node.disk_size_gb, 10);
        assert_eq!(settings.node.login_user.as_deref(), Some("jclouds"));
    }

    #[test]
    fn test_missing_project_is_parse_error() {
        let result = Settings::from_yaml_str("zone: us-central1-a\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::from_yaml_str("project: myproject\n").unwrap();
        settings.concurrency = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        let mut settings = Settings::from_yaml_str("project: myproject\n").unwrap();
        settings.retry.max_attempts = 0;
        assert!(settings.validate().is_err());

        // 空の project
        let settings = Settings::from_yaml_str("project: ''\n").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let mut settings = Settings::from_yaml_str("project: myproject\n").unwrap();
        temp_env::with_vars(
            [
                (PROJECT_ENV, Some("other")),
                (ZONE_ENV, Some("asia-east1-a")),
                (ACCESS_TOKEN_ENV, Some("ya29.token")),
            ],
            || settings.apply_env(),
        );
        assert_eq!(settings.project, "other");
        assert_eq!(settings.zone, "asia-east1-a");
        assert_eq!(settings.access_token.as_deref(), Some("ya29.token"));
    }
}
