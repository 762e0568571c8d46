//! Single-node provisioning chain
//!
//! network → firewall → boot disk → instance → tags, each step awaited before
//! the next one starts. A failure stops the chain and is returned as-is;
//! resources created by earlier steps are left in place for the caller.

use crate::compute::Compute;
use crate::ensurer::ResourceEnsurer;
use crate::error::{CloudError, Result};
use crate::node::NodeSpec;
use crate::request::{NewDisk, NewFirewall, NewInstance, NewNetwork, ResourceUpdate};
use crate::resource::{Disk, Firewall, FirewallRule, Instance, Network, ResourceKind, Scope, Tags};

pub struct NodeProvisioner<'a> {
    compute: &'a Compute,
}

impl<'a> NodeProvisioner<'a> {
    pub fn new(compute: &'a Compute) -> Self {
        Self { compute }
    }

    pub async fn create_node(&self, spec: &NodeSpec) -> Result<Instance> {
        tracing::info!("Provisioning node {} in {}", spec.name, spec.zone);

        let network = self.ensure_network(spec).await?;
        self.ensure_firewall(spec, &network).await?;

        let zone = Scope::zone(&spec.zone);
        let disk_name = spec.boot_disk_name();
        tracing::info!("Creating boot disk: {}", disk_name);
        let disk: Disk = self
            .compute
            .create(
                &zone,
                NewDisk {
                    name: disk_name,
                    size_gb: spec.disk_size_gb,
                    source_image: spec.image.clone(),
                }
                .into(),
            )
            .await?;

        tracing::info!("Creating instance: {}", spec.name);
        let instance: Instance = self
            .compute
            .create(
                &zone,
                NewInstance {
                    name: spec.name.clone(),
                    machine_type: spec.machine_type.clone(),
                    boot_disk: disk.self_link,
                    network: network.self_link,
                    external_ip: spec.external_ip,
                    metadata: spec.metadata.clone(),
                }
                .into(),
            )
            .await?;

        self.set_tags(&zone, &instance.name, &spec.desired_tags())
            .await
    }

    async fn ensure_network(&self, spec: &NodeSpec) -> Result<Network> {
        ResourceEnsurer::new(self.compute)
            .ensure(&Scope::Global, &spec.network, || {
                NewNetwork {
                    name: spec.network.clone(),
                    ipv4_range: spec.network_range.clone(),
                    description: None,
                }
                .into()
            })
            .await
    }

    async fn ensure_firewall(&self, spec: &NodeSpec, network: &Network) -> Result<Firewall> {
        let name = spec.firewall_name();
        let range = network
            .ipv4_range
            .clone()
            .unwrap_or_else(|| spec.network_range.clone());

        ResourceEnsurer::new(self.compute)
            .ensure(&Scope::Global, &name, || {
                NewFirewall {
                    name: name.clone(),
                    network: network.self_link.clone(),
                    source_ranges: vec![range, "0.0.0.0/0".to_string()],
                    source_tags: spec.tags.clone(),
                    target_tags: vec![name.clone()],
                    allowed: vec![
                        FirewallRule::new("tcp", &spec.inbound_ports),
                        FirewallRule::new("udp", &spec.inbound_ports),
                    ],
                }
                .into()
            })
            .await
    }

    /// Make sure the instance carries `wanted`, keeping any tags it already has
    ///
    /// Every write echoes a freshly fetched fingerprint. A rejected fingerprint
    /// is retried once with re-fetched state.
    pub async fn set_tags(&self, zone: &Scope, name: &str, wanted: &[String]) -> Result<Instance> {
        let mut retried = false;
        loop {
            let instance: Instance = self.compute.fetch_required(zone, name).await?;
            if instance.tags.contains_all(wanted) {
                return Ok(instance);
            }

            let mut items = instance.tags.items.clone();
            for tag in wanted {
                if !items.contains(tag) {
                    items.push(tag.clone());
                }
            }

            tracing::info!("Setting tags on {}: {:?}", name, items);
            let update = ResourceUpdate::SetTags(Tags {
                items,
                fingerprint: instance.tags.fingerprint.clone(),
            });
            match self
                .compute
                .update(ResourceKind::Instance, zone, name, update)
                .await
            {
                Ok(_) => return self.compute.fetch_required(zone, name).await,
                Err(e) if e.is_conflict() && !retried => {
                    tracing::warn!("Tag fingerprint on {} is stale, re-fetching: {}", name, e);
                    retried = true;
                }
                Err(e) if e.is_conflict() => {
                    return Err(CloudError::Conflict {
                        resource: name.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, MemoryPlatform};
    use crate::node::NodeTemplate;
    use std::sync::Arc;

    fn spec(platform: &MemoryPlatform) -> NodeSpec {
        let template = NodeTemplate::new(
            "us-central1-a",
            platform.machine_type_link("us-central1-a", "f1-micro"),
            platform.image_link("debian-cloud", "debian-7-wheezy-v20140718"),
        )
        .with_network("jclouds-test")
        .with_tags(["aTag"]);
        NodeSpec::from_template("test-1", "test", "jclouds-test", &template)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_node_sequence() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let compute = Compute::new(platform.clone());

        let instance = NodeProvisioner::new(&compute)
            .create_node(&spec(&platform))
            .await
            .unwrap();

        assert_eq!(instance.name, "test-1");
        assert_eq!(instance.tags.items, vec!["aTag", "jclouds-test-port-22"]);
        let inserts: Vec<_> = platform
            .applied()
            .into_iter()
            .filter_map(|c| match c {
                Call::Insert { kind, name } => Some((kind, name)),
                _ => None,
            })
            .collect();
        assert_eq!(
            inserts,
            vec![
                (ResourceKind::Network, "jclouds-test".to_string()),
                (ResourceKind::Firewall, "jclouds-test-port-22".to_string()),
                (ResourceKind::Disk, "test-1-boot".to_string()),
                (ResourceKind::Instance, "test-1".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_leaves_earlier_resources() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.fail_operation_for(
            "test-1",
            crate::error::ErrorCode::QuotaExceeded,
            "Quota 'INSTANCES' exceeded",
        );
        let compute = Compute::new(platform.clone());

        let err = NodeProvisioner::new(&compute)
            .create_node(&spec(&platform))
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::OperationFailed { .. }));
        assert!(platform.exists(ResourceKind::Disk, &Scope::zone("us-central1-a"), "test-1-boot"));
        assert!(!platform.exists(ResourceKind::Instance, &Scope::zone("us-central1-a"), "test-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_tags_retries_once_on_stale_fingerprint() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.seed_node("us-central1-a", "web-1", "net", "web");
        platform.inject_tag_conflicts(1);
        let compute = Compute::new(platform.clone());
        let zone = Scope::zone("us-central1-a");

        let instance = NodeProvisioner::new(&compute)
            .set_tags(&zone, "web-1", &["web".to_string()])
            .await
            .unwrap();
        assert_eq!(instance.tags.items, vec!["web"]);

        let writes: Vec<Option<String>> = platform
            .submitted()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetTags { fingerprint, .. } => Some(fingerprint),
                _ => None,
            })
            .collect();
        assert_eq!(writes.len(), 2);
        assert_ne!(writes[0], writes[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_tags_gives_up_after_second_conflict() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.seed_node("us-central1-a", "web-1", "net", "web");
        platform.inject_tag_conflicts(2);
        let compute = Compute::new(platform.clone());

        let err = NodeProvisioner::new(&compute)
            .set_tags(&Scope::zone("us-central1-a"), "web-1", &["web".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Conflict { ref resource, .. } if resource == "web-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_tags_skips_write_when_present() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.seed_node("us-central1-a", "web-1", "net", "web");
        let compute = Compute::new(platform.clone());
        let zone = Scope::zone("us-central1-a");
        let provisioner = NodeProvisioner::new(&compute);

        provisioner.set_tags(&zone, "web-1", &["web".to_string()]).await.unwrap();
        provisioner.set_tags(&zone, "web-1", &["web".to_string()]).await.unwrap();

        let writes = platform
            .submitted()
            .into_iter()
            .filter(|c| matches!(c, Call::SetTags { .. }))
            .count();
        assert_eq!(writes, 1);
    }
}
