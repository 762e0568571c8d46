//! 設定からオーケストレーターを組み立てる

use anyhow::Context as _;
use gceflow_cloud::{
    Compute, GroupOrchestrator, NodeTemplate, OrchestratorConfig, PollConfig, RetryConfig,
};
use gceflow_cloud_google::{GoogleConfig, GooglePlatform};
use gceflow_config::Settings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct Context {
    pub settings: Settings,
    pub google: GoogleConfig,
    pub orchestrator: GroupOrchestrator,
}

/// コマンドライン引数によるノード既定値の上書き
#[derive(Debug, Default)]
pub struct TemplateOverrides {
    pub tags: Vec<String>,
    pub network: Option<String>,
    pub ports: Vec<u16>,
    pub machine_type: Option<String>,
    pub image: Option<String>,
    pub disk_size: Option<u32>,
}

impl Context {
    pub fn load() -> anyhow::Result<Self> {
        let settings = gceflow_config::load_settings()?;
        tracing::debug!(
            "プロジェクト {} / ゾーン {} を使用",
            settings.project,
            settings.zone
        );
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let token = settings.access_token.clone().context(
            "アクセストークンがありません。gceflow.yaml の access_token または GCEFLOW_ACCESS_TOKEN を設定してください",
        )?;
        let mut google = GoogleConfig::new(&settings.project, token);
        if let Some(api_base) = &settings.api_base {
            google = google.with_api_base(api_base);
        }

        let platform = Arc::new(GooglePlatform::new(google.clone())?);
        let compute = Compute::with_config(platform, retry_config(&settings), poll_config(&settings));
        let orchestrator = GroupOrchestrator::new(
            compute,
            OrchestratorConfig {
                concurrency: settings.concurrency,
                resource_prefix: settings.resource_prefix.clone(),
            },
        );

        Ok(Self {
            settings,
            google,
            orchestrator,
        })
    }

    pub fn template(&self, overrides: TemplateOverrides) -> anyhow::Result<NodeTemplate> {
        let defaults = &self.settings.node;
        let zone = &self.settings.zone;
        let machine_type = overrides
            .machine_type
            .as_deref()
            .unwrap_or(&defaults.machine_type);
        let image = overrides.image.as_deref().unwrap_or(&defaults.image);

        let mut template = NodeTemplate::new(
            zone.as_str(),
            self.google.machine_type_link(zone, machine_type),
            self.google.image_link(image),
        )
        .with_tags(overrides.tags);
        template.disk_size_gb = overrides.disk_size.unwrap_or(defaults.disk_size_gb);
        template.external_ip = defaults.external_ip;
        template.inbound_ports = if overrides.ports.is_empty() {
            defaults.inbound_ports.clone()
        } else {
            overrides.ports
        };
        if let Some(network) = overrides.network {
            template = template.with_network(network);
        }

        if let (Some(user), Some(key_path)) = (&defaults.login_user, &defaults.public_key_path) {
            let key_path = expand_home(key_path);
            let public_key = std::fs::read_to_string(&key_path)
                .with_context(|| format!("公開鍵 {} を読み込めません", key_path.display()))?;
            template = template.with_login(user, public_key);
        }

        Ok(template)
    }
}

fn retry_config(settings: &Settings) -> RetryConfig {
    let retry = &settings.retry;
    RetryConfig {
        max_attempts: retry.max_attempts,
        initial_delay: Duration::from_millis(retry.initial_delay_ms),
        max_delay: Duration::from_millis(retry.max_delay_ms),
        backoff_multiplier: retry.backoff_multiplier,
    }
}

fn poll_config(settings: &Settings) -> PollConfig {
    let poll = &settings.poll;
    PollConfig {
        initial_interval: Duration::from_millis(poll.initial_interval_ms),
        max_interval: Duration::from_millis(poll.max_interval_ms),
        multiplier: poll.multiplier,
        operation_timeout: Duration::from_secs(poll.timeout_secs),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(yaml: &str) -> Settings {
        Settings::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_missing_token_is_reported() {
        let err = Context::from_settings(settings("project: myproject\n"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("GCEFLOW_ACCESS_TOKEN"));
    }

    #[test]
    fn test_template_from_defaults_and_overrides() {
        let ctx = Context::from_settings(settings("project: myproject\naccess_token: t\n")).unwrap();

        let template = ctx.template(TemplateOverrides::default()).unwrap();
        assert_eq!(template.zone, "us-central1-a");
        assert_eq!(
            template.machine_type,
            "https://www.googleapis.com/compute/v1/projects/myproject/zones/us-central1-a/machineTypes/f1-micro"
        );
        assert!(template.image.ends_with("/debian-cloud/global/images/debian-7-wheezy-v20140718"));
        assert_eq!(template.inbound_ports, vec![22]);
        assert!(template.login.is_none());

        let template = ctx
            .template(TemplateOverrides {
                tags: vec!["web".into()],
                network: Some("lab".into()),
                ports: vec![80, 443],
                disk_size: Some(20),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(template.tags, vec!["web"]);
        assert_eq!(template.network.as_deref(), Some("lab"));
        assert_eq!(template.inbound_ports, vec![80, 443]);
        assert_eq!(template.disk_size_gb, 20);
    }

    #[test]
    fn test_template_reads_public_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let key = dir.path().join("id_rsa.pub");
        std::fs::write(&key, "ssh-rsa AAAAB3NzaC1yc2E\n").unwrap();

        let yaml = format!(
            "project: myproject\naccess_token: t\nnode:\n  login_user: jclouds\n  public_key_path: {}\n",
            key.display()
        );
        let ctx = Context::from_settings(settings(&yaml)).unwrap();
        let template = ctx.template(TemplateOverrides::default()).unwrap();
        let login = template.login.unwrap();
        assert_eq!(login.user, "jclouds");
        assert_eq!(
            login.ssh_keys_entry(),
            "jclouds:ssh-rsa AAAAB3NzaC1yc2E jclouds@localhost"
        );
    }
}
