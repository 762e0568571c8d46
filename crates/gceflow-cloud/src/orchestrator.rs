//! Group-level orchestration
//!
//! Group membership and shared-resource usage are always recomputed from
//! platform listings. Nothing here keeps a reference count in memory, so
//! several orchestrators (or processes) can work on the same group.

use crate::compute::Compute;
use crate::error::{CloudError, Result};
use crate::naming::{self, DEFAULT_NETWORK, METADATA_GROUP, NodeId};
use crate::node::{Node, NodeSpec, NodeTemplate};
use crate::platform::ListFilter;
use crate::provisioner::NodeProvisioner;
use crate::report::{LaunchReport, SharedResources, TeardownReport};
use crate::resource::{
    Firewall, Instance, Network, ResourceKind, Scope, name_from_link, same_resource,
};
use crate::teardown::TeardownCoordinator;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum node chains running at once
    pub concurrency: usize,
    /// Prefix of derived group networks
    pub resource_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            resource_prefix: "gceflow".to_string(),
        }
    }
}

pub struct GroupOrchestrator {
    compute: Compute,
    config: OrchestratorConfig,
}

impl GroupOrchestrator {
    pub fn new(compute: Compute, config: OrchestratorConfig) -> Self {
        Self { compute, config }
    }

    pub fn compute(&self) -> &Compute {
        &self.compute
    }

    /// Network the group's nodes attach to
    pub fn network_for(&self, group: &str, template: &NodeTemplate) -> String {
        template
            .network
            .clone()
            .unwrap_or_else(|| naming::group_network_name(&self.config.resource_prefix, group))
    }

    pub async fn create_nodes(
        &self,
        group: &str,
        count: usize,
        template: &NodeTemplate,
    ) -> Result<LaunchReport> {
        let (_keep_open, cancel) = watch::channel(false);
        self.create_nodes_cancellable(group, count, template, cancel)
            .await
    }

    /// Launch `count` nodes, stopping new launches once `cancel` reads `true`
    ///
    /// Chains already started run to completion; nodes never started are
    /// reported as [`CloudError::Cancelled`] failures. A failed chain's
    /// instance and boot disk are removed so its name can be reused, and when
    /// no node came up the group network is reclaimed if nothing else uses it.
    pub async fn create_nodes_cancellable(
        &self,
        group: &str,
        count: usize,
        template: &NodeTemplate,
        cancel: watch::Receiver<bool>,
    ) -> Result<LaunchReport> {
        naming::validate_group(group)?;
        let started = Instant::now();
        let mut report = LaunchReport::new();
        if count == 0 {
            return Ok(report);
        }

        let existing: Vec<Instance> = self
            .compute
            .list(&ListFilter::new().with_name_prefix(format!("{}-", group)))
            .await?;
        let names =
            naming::next_node_names(group, existing.iter().map(|i| i.name.as_str()), count);
        let network = self.network_for(group, template);

        tracing::info!(
            "Creating {} node(s) in group {} on network {}: {:?}",
            count,
            group,
            network,
            names
        );

        let provisioner = NodeProvisioner::new(&self.compute);
        let provisioner = &provisioner;
        let cancel = &cancel;
        let mut results = stream::iter(names)
            .map(|name| {
                let spec = NodeSpec::from_template(name, group, network.clone(), template);
                async move {
                    if *cancel.borrow() {
                        tracing::warn!("Launch cancelled before {} started", spec.name);
                        let err = CloudError::Cancelled(spec.name.clone());
                        return (spec.name, Err(err));
                    }
                    let result = provisioner.create_node(&spec).await;
                    if let Err(e) = &result {
                        tracing::error!("Node {} failed: {}", spec.name, e);
                        self.discard_partial_node(&spec).await;
                    }
                    (spec.name, result)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1));

        let mut started_and_failed = 0;
        while let Some((name, result)) = results.next().await {
            match result {
                Ok(instance) => {
                    tracing::info!("Node {} is {}", name, instance.status);
                    report.add_success(instance);
                }
                Err(e) => {
                    if !matches!(e, CloudError::Cancelled(_)) {
                        started_and_failed += 1;
                    }
                    report.add_failure(name, e);
                }
            }
        }

        // Nothing came up: let the live count decide whether the network and
        // firewall ensured by the failed chains stay
        if report.created.is_empty() && started_and_failed > 0 {
            let outcome = match self.reclaim_network(&network).await {
                Ok(outcome) => outcome,
                Err(e) => failed_reclaim(&network, e),
            };
            report.shared.push(outcome);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Destroy one node, then reclaim its network and firewalls if it was the
    /// last one using them
    ///
    /// A node that no longer exists is not an error and reclaims nothing.
    pub async fn destroy_node(&self, id: &NodeId) -> Result<Vec<SharedResources>> {
        let zone = Scope::zone(&id.zone);
        let Some(instance) = self.compute.fetch::<Instance>(&zone, &id.name).await? else {
            tracing::info!("Node {} already gone", id);
            return Ok(Vec::new());
        };

        let teardown = TeardownCoordinator::new(&self.compute)
            .destroy(&instance)
            .await;

        // Only a completed teardown may discount the node; otherwise the live
        // count sees it if it is still there
        let excluding = match &teardown {
            Ok(()) => vec![instance.self_link.clone()],
            Err(_) => Vec::new(),
        };
        let mut shared = Vec::new();
        for network in networks_of([&instance]) {
            shared.push(self.reclaim_recorded(&network, &excluding).await);
        }

        if let Err(e) = teardown {
            tracing::error!("Failed to destroy {}: {} (shared: {:?})", id, e, shared);
            return Err(e);
        }
        Ok(shared)
    }

    /// Destroy every node of the group, then reclaim shared resources once
    pub async fn destroy_group(&self, group: &str) -> Result<TeardownReport> {
        let started = Instant::now();
        let mut report = TeardownReport::new();

        let members: Vec<Instance> = self
            .compute
            .list(&ListFilter::new().with_label(METADATA_GROUP, group))
            .await?;
        tracing::info!("Destroying {} node(s) of group {}", members.len(), group);

        let teardown = TeardownCoordinator::new(&self.compute);
        let teardown = &teardown;
        let mut results = stream::iter(members.iter())
            .map(|instance| async move { (instance, teardown.destroy(instance).await) })
            .buffer_unordered(self.config.concurrency.max(1));

        let mut destroyed: Vec<&Instance> = Vec::new();
        while let Some((instance, result)) = results.next().await {
            match result {
                Ok(()) => {
                    report.destroyed.push(instance.name.clone());
                    destroyed.push(instance);
                }
                Err(e) => {
                    tracing::error!("Failed to destroy {}: {}", instance.name, e);
                    report.add_failure(instance.name.clone(), e);
                }
            }
        }

        let excluding: Vec<String> = destroyed.iter().map(|i| i.self_link.clone()).collect();
        let mut networks = networks_of(members.iter());
        // Picks up a group network left behind by a launch that never got a node up
        let group_network = naming::group_network_name(&self.config.resource_prefix, group);
        if let Some(network) = self
            .compute
            .fetch::<Network>(&Scope::Global, &group_network)
            .await?
        {
            if !networks.iter().any(|link| same_resource(link, &network.self_link)) {
                networks.insert(network.self_link);
            }
        }
        for network in networks {
            report
                .shared
                .push(self.reclaim_recorded(&network, &excluding).await);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    pub async fn list_nodes(&self, group: Option<&str>) -> Result<Vec<Node>> {
        let filter = match group {
            Some(group) => ListFilter::new().with_label(METADATA_GROUP, group),
            None => ListFilter::new(),
        };
        let instances: Vec<Instance> = self.compute.list(&filter).await?;
        let mut nodes: Vec<Node> = instances
            .iter()
            .filter(|i| i.metadata.contains_key(METADATA_GROUP))
            .map(Node::from)
            .collect();
        nodes.sort_by_key(|n| n.id.to_string());
        Ok(nodes)
    }

    pub async fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        let instance = self
            .compute
            .fetch::<Instance>(&Scope::zone(&id.zone), &id.name)
            .await?;
        Ok(instance.as_ref().map(Node::from))
    }

    /// Reclaim a network by name if no instance uses it any more
    ///
    /// Retries what a failed teardown or launch left behind.
    pub async fn reclaim_network(&self, name: &str) -> Result<SharedResources> {
        match self.compute.fetch::<Network>(&Scope::Global, name).await? {
            Some(network) => self.reclaim_shared_resources(&network.self_link, &[]).await,
            None => {
                tracing::info!("Network {} already gone", name);
                Ok(SharedResources::Retained {
                    network: name.to_string(),
                })
            }
        }
    }

    async fn reclaim_recorded(&self, network_link: &str, excluding: &[String]) -> SharedResources {
        match self.reclaim_shared_resources(network_link, excluding).await {
            Ok(outcome) => outcome,
            Err(e) => failed_reclaim(name_from_link(network_link), e),
        }
    }

    /// Remove whatever a failed chain created for its own node
    async fn discard_partial_node(&self, spec: &NodeSpec) {
        let zone = Scope::zone(&spec.zone);
        let steps = [
            (ResourceKind::Instance, spec.name.clone()),
            (ResourceKind::Disk, spec.boot_disk_name()),
        ];
        for (kind, name) in steps {
            match self.compute.delete_if_exists(kind, &zone, &name).await {
                Ok(true) => tracing::info!("Removed {} {} of failed node", kind, name),
                Ok(false) => {}
                Err(e) => tracing::warn!("Could not remove {} {}: {}", kind, name, e),
            }
        }
    }

    /// Delete the network's firewalls and then the network, if no instance
    /// other than `excluding` still references it
    pub async fn reclaim_shared_resources(
        &self,
        network_link: &str,
        excluding: &[String],
    ) -> Result<SharedResources> {
        let network = name_from_link(network_link).to_string();
        if network == DEFAULT_NETWORK {
            return Ok(SharedResources::Retained { network });
        }

        let remaining = self.remaining_instances(network_link, excluding).await?;
        if remaining > 0 {
            tracing::info!(
                "Network {} still used by {} instance(s), keeping it",
                network,
                remaining
            );
            return Ok(SharedResources::InUse { network, remaining });
        }

        let firewalls: Vec<Firewall> = self
            .compute
            .list(&ListFilter::new().on_network(network_link))
            .await?;
        let mut deleted = Vec::new();
        for firewall in firewalls {
            tracing::info!("Deleting firewall: {}", firewall.name);
            if self
                .compute
                .delete_if_exists(ResourceKind::Firewall, &Scope::Global, &firewall.name)
                .await?
            {
                deleted.push(firewall.name);
            }
        }

        tracing::info!("Deleting network: {}", network);
        match self
            .compute
            .delete_if_exists(ResourceKind::Network, &Scope::Global, &network)
            .await
        {
            Ok(true) => Ok(SharedResources::Reclaimed {
                network,
                firewalls: deleted,
            }),
            Ok(false) if deleted.is_empty() => Ok(SharedResources::Retained { network }),
            Ok(false) => Ok(SharedResources::Reclaimed {
                network,
                firewalls: deleted,
            }),
            Err(e) if e.is_in_use() => {
                tracing::warn!("Network {} was picked up concurrently: {}", network, e);
                let remaining = self.remaining_instances(network_link, excluding).await?;
                Ok(SharedResources::InUse { network, remaining })
            }
            Err(e) => Err(e),
        }
    }

    async fn remaining_instances(&self, network_link: &str, excluding: &[String]) -> Result<usize> {
        let instances: Vec<Instance> = self
            .compute
            .list(&ListFilter::new().on_network(network_link))
            .await?;
        Ok(instances
            .iter()
            .filter(|i| !excluding.contains(&i.self_link))
            .count())
    }
}

fn failed_reclaim(network: &str, error: CloudError) -> SharedResources {
    tracing::error!("Reclaiming network {} failed: {}", network, error);
    SharedResources::Failed {
        network: network.to_string(),
        message: error.to_string(),
    }
}

fn networks_of<'a>(instances: impl IntoIterator<Item = &'a Instance>) -> BTreeSet<String> {
    instances
        .into_iter()
        .flat_map(|i| i.network_interfaces.iter().map(|nic| nic.network.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, MemoryPlatform};
    use std::sync::Arc;

    fn template(platform: &MemoryPlatform) -> NodeTemplate {
        NodeTemplate::new(
            "us-central1-a",
            platform.machine_type_link("us-central1-a", "f1-micro"),
            platform.image_link("debian-cloud", "debian-7-wheezy-v20140718"),
        )
    }

    fn orchestrator(platform: &Arc<MemoryPlatform>) -> GroupOrchestrator {
        GroupOrchestrator::new(
            Compute::new(platform.clone()),
            OrchestratorConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_nodes_shares_network() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let orchestrator = orchestrator(&platform);

        let report = orchestrator
            .create_nodes("web", 3, &template(&platform))
            .await
            .unwrap();

        assert!(report.is_success());
        let mut names: Vec<_> = report.created.iter().map(|i| i.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["web-1", "web-2", "web-3"]);
        assert_eq!(platform.resource_names(ResourceKind::Network), vec!["gceflow-web"]);
        assert_eq!(
            platform.resource_names(ResourceKind::Firewall),
            vec!["gceflow-web-port-22"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_nodes_continues_numbering() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.seed_node("us-central1-a", "web-1", "gceflow-web", "web");
        let orchestrator = orchestrator(&platform);

        let report = orchestrator
            .create_nodes("web", 1, &template(&platform))
            .await
            .unwrap();
        assert_eq!(report.created[0].name, "web-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_group_rejected() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let err = orchestrator(&platform)
            .create_nodes("Web_Tier", 1, &template(&platform))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidConfig(_)));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_network_never_reclaimed() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.seed_node("us-central1-a", "web-1", "default", "web");
        let orchestrator = orchestrator(&platform);

        let shared = orchestrator
            .destroy_node(&NodeId::new("us-central1-a", "web-1"))
            .await
            .unwrap();

        assert_eq!(
            shared,
            vec![SharedResources::Retained {
                network: "default".into()
            }]
        );
        assert!(platform.exists(ResourceKind::Network, &Scope::Global, "default"));
        assert!(
            !platform
                .submitted()
                .iter()
                .any(|c| matches!(c, Call::Delete { kind: ResourceKind::Network, .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_and_get_nodes() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.seed_node("us-central1-a", "web-1", "net", "web");
        platform.seed_node("us-central1-b", "db-1", "net", "db");
        let orchestrator = orchestrator(&platform);

        let all = orchestrator.list_nodes(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let web = orchestrator.list_nodes(Some("web")).await.unwrap();
        assert_eq!(web.len(), 1);
        assert_eq!(web[0].id.to_string(), "us-central1-a/web-1");
        assert_eq!(web[0].network.as_deref(), Some("net"));

        let node = orchestrator
            .get_node(&NodeId::new("us-central1-b", "db-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.group.as_deref(), Some("db"));

        assert!(
            orchestrator
                .get_node(&NodeId::new("us-central1-a", "db-1"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
