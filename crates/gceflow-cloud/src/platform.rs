//! Compute platform trait definition

use crate::error::Result;
use crate::operation::{Operation, OperationHandle};
use crate::request::{ResourceRequest, ResourceUpdate};
use crate::resource::{Resource, ResourceKind, Scope, same_resource};
use async_trait::async_trait;

/// Compute platform abstraction
///
/// The REST transport and the in-memory test platform both implement this
/// trait. Every mutating call is asynchronous on the platform side and
/// returns an [`OperationHandle`] that must be polled to completion.
#[async_trait]
pub trait ComputePlatform: Send + Sync {
    /// Returns the platform name (e.g., "google-compute-engine")
    fn name(&self) -> &str;

    /// Fetch one resource; `Ok(None)` when it does not exist
    async fn get(&self, kind: ResourceKind, scope: &Scope, name: &str)
    -> Result<Option<Resource>>;

    /// List resources of a kind matching the filter, all pages drained
    async fn list(&self, kind: ResourceKind, filter: &ListFilter) -> Result<Vec<Resource>>;

    /// Submit a creation request
    async fn insert(&self, scope: &Scope, request: ResourceRequest) -> Result<OperationHandle>;

    /// Submit a deletion request
    async fn delete(&self, kind: ResourceKind, scope: &Scope, name: &str)
    -> Result<OperationHandle>;

    /// Submit an in-place update
    async fn update(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
        update: ResourceUpdate,
    ) -> Result<OperationHandle>;

    /// Fetch the current state of an operation
    ///
    /// Unknown or expired operations yield a `NotFound` error.
    async fn get_operation(&self, handle: &OperationHandle) -> Result<Operation>;
}

/// Filter applied to [`ComputePlatform::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Restrict to one scope; `None` lists across every zone
    pub scope: Option<Scope>,
    /// Network self link or name the resource is attached to
    pub network: Option<String>,
    /// Metadata key/value the resource must carry
    pub label: Option<(String, String)>,
    pub name_prefix: Option<String>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn on_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label = Some((key.into(), value.into()));
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Client-side evaluation, used where the backend cannot filter
    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(scope) = &self.scope {
            if resource.kind().is_zonal() && &resource.scope() != scope {
                return false;
            }
        }

        if let Some(prefix) = &self.name_prefix {
            if !resource.name().starts_with(prefix.as_str()) {
                return false;
            }
        }

        if let Some(network) = &self.network {
            let attached = match resource {
                Resource::Instance(instance) => instance.is_on_network(network),
                Resource::Firewall(firewall) => same_resource(&firewall.network, network),
                Resource::Network(net) => same_resource(&net.self_link, network),
                Resource::Disk(_) => false,
            };
            if !attached {
                return false;
            }
        }

        if let Some((key, value)) = &self.label {
            let labelled = match resource {
                Resource::Instance(instance) => instance.metadata.get(key) == Some(value),
                _ => false,
            };
            if !labelled {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Firewall, Instance, InstanceStatus, NetworkInterface, Tags};
    use std::collections::BTreeMap;

    fn instance(name: &str, zone: &str, network: &str, group: &str) -> Resource {
        let mut metadata = BTreeMap::new();
        metadata.insert("gceflow-group".to_string(), group.to_string());
        Resource::Instance(Instance {
            name: name.into(),
            self_link: format!("https://c/projects/p/zones/{}/instances/{}", zone, name),
            zone: zone.into(),
            machine_type: "f1-micro".into(),
            status: InstanceStatus::Running,
            tags: Tags::default(),
            network_interfaces: vec![NetworkInterface {
                network: format!("https://c/projects/p/global/networks/{}", network),
                network_ip: None,
                nat_ip: None,
            }],
            disks: vec![],
            metadata,
        })
    }

    #[test]
    fn test_filter_by_scope_and_network() {
        let a = instance("web-1", "us-central1-a", "net-a", "web");
        let b = instance("web-2", "us-central1-b", "net-b", "web");

        let filter = ListFilter::new().in_scope(Scope::zone("us-central1-a"));
        assert!(filter.matches(&a));
        assert!(!filter.matches(&b));

        let filter = ListFilter::new().on_network("net-b");
        assert!(!filter.matches(&a));
        assert!(filter.matches(&b));
    }

    #[test]
    fn test_filter_by_label_and_prefix() {
        let a = instance("web-1", "z", "n", "web");
        let b = instance("db-1", "z", "n", "db");

        let filter = ListFilter::new().with_label("gceflow-group", "web");
        assert!(filter.matches(&a));
        assert!(!filter.matches(&b));

        assert!(ListFilter::new().with_name_prefix("db-").matches(&b));
    }

    #[test]
    fn test_scope_ignored_for_global_resources() {
        let fw = Resource::Firewall(Firewall {
            name: "net-port-22".into(),
            self_link: "https://c/projects/p/global/firewalls/net-port-22".into(),
            network: "https://c/projects/p/global/networks/net".into(),
            source_ranges: vec![],
            source_tags: vec![],
            target_tags: vec![],
            allowed: vec![],
        });
        let filter = ListFilter::new()
            .in_scope(Scope::zone("us-central1-a"))
            .on_network("https://c/projects/p/global/networks/net");
        assert!(filter.matches(&fw));
    }
}
