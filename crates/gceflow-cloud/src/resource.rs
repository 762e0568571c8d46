//! Platform resource model
//!
//! Resources are snapshots of platform state. The orchestration layer never
//! caches them across steps; every step re-fetches what it needs.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of platform resource managed by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Firewall,
    Disk,
    Instance,
}

impl ResourceKind {
    /// REST collection name (e.g. `networks`)
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Network => "networks",
            ResourceKind::Firewall => "firewalls",
            ResourceKind::Disk => "disks",
            ResourceKind::Instance => "instances",
        }
    }

    pub fn is_zonal(&self) -> bool {
        matches!(self, ResourceKind::Disk | ResourceKind::Instance)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Firewall => write!(f, "firewall"),
            ResourceKind::Disk => write!(f, "disk"),
            ResourceKind::Instance => write!(f, "instance"),
        }
    }
}

/// Location scope of a resource or operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Scope {
    Global,
    Region(String),
    Zone(String),
}

impl Scope {
    pub fn zone(name: impl Into<String>) -> Self {
        Scope::Zone(name.into())
    }

    /// Path segment used in self links (`global`, `zones/us-central1-a`)
    pub fn path(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Region(region) => format!("regions/{}", region),
            Scope::Zone(zone) => format!("zones/{}", zone),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Last path segment of a self link; plain names pass through unchanged
pub fn name_from_link(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

/// Compare two resource references that may be links or bare names
pub fn same_resource(a: &str, b: &str) -> bool {
    if a.contains('/') && b.contains('/') {
        a == b
    } else {
        name_from_link(a) == name_from_link(b)
    }
}

/// Common projection of any platform resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub self_link: String,
    pub scope: Scope,
    /// Provider-reported lifecycle state, when the kind has one
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub self_link: String,
    pub ipv4_range: Option<String>,
    pub gateway_ipv4: Option<String>,
    pub description: Option<String>,
}

/// Allowed protocol/ports pair of a firewall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub protocol: String,
    pub ports: Vec<String>,
}

impl FirewallRule {
    pub fn new(protocol: impl Into<String>, ports: &[u16]) -> Self {
        Self {
            protocol: protocol.into(),
            ports: ports.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firewall {
    pub name: String,
    pub self_link: String,
    /// Self link of the network the rule is attached to
    pub network: String,
    pub source_ranges: Vec<String>,
    pub source_tags: Vec<String>,
    pub target_tags: Vec<String>,
    pub allowed: Vec<FirewallRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    pub self_link: String,
    pub zone: String,
    pub size_gb: u32,
    pub source_image: Option<String>,
    pub status: Option<String>,
}

/// Lifecycle state reported for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Provisioning,
    Staging,
    Running,
    Stopping,
    Stopped,
    Suspended,
    Terminated,
    Unknown,
}

impl InstanceStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "PROVISIONING" => InstanceStatus::Provisioning,
            "STAGING" => InstanceStatus::Staging,
            "RUNNING" => InstanceStatus::Running,
            "STOPPING" => InstanceStatus::Stopping,
            "STOPPED" => InstanceStatus::Stopped,
            "SUSPENDED" => InstanceStatus::Suspended,
            "TERMINATED" => InstanceStatus::Terminated,
            _ => InstanceStatus::Unknown,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Provisioning => "PROVISIONING",
            InstanceStatus::Staging => "STAGING",
            InstanceStatus::Running => "RUNNING",
            InstanceStatus::Stopping => "STOPPING",
            InstanceStatus::Stopped => "STOPPED",
            InstanceStatus::Suspended => "SUSPENDED",
            InstanceStatus::Terminated => "TERMINATED",
            InstanceStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Instance tags guarded by a fingerprint
///
/// Writes must echo the fingerprint read most recently; the platform rejects
/// stale fingerprints with `CONDITION_NOT_MET`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    pub items: Vec<String>,
    pub fingerprint: Option<String>,
}

impl Tags {
    pub fn contains_all(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|tag| self.items.contains(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Network self link
    pub network: String,
    pub network_ip: Option<String>,
    pub nat_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedDisk {
    /// Disk self link
    pub source: String,
    pub boot: bool,
    pub auto_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub self_link: String,
    pub zone: String,
    pub machine_type: String,
    pub status: InstanceStatus,
    pub tags: Tags,
    pub network_interfaces: Vec<NetworkInterface>,
    pub disks: Vec<AttachedDisk>,
    pub metadata: BTreeMap<String, String>,
}

impl Instance {
    pub fn boot_disk(&self) -> Option<&AttachedDisk> {
        self.disks.iter().find(|d| d.boot)
    }

    pub fn is_on_network(&self, network: &str) -> bool {
        self.network_interfaces
            .iter()
            .any(|nic| same_resource(&nic.network, network))
    }
}

/// Any platform resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Network(Network),
    Firewall(Firewall),
    Disk(Disk),
    Instance(Instance),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Network(_) => ResourceKind::Network,
            Resource::Firewall(_) => ResourceKind::Firewall,
            Resource::Disk(_) => ResourceKind::Disk,
            Resource::Instance(_) => ResourceKind::Instance,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Network(r) => &r.name,
            Resource::Firewall(r) => &r.name,
            Resource::Disk(r) => &r.name,
            Resource::Instance(r) => &r.name,
        }
    }

    pub fn self_link(&self) -> &str {
        match self {
            Resource::Network(r) => &r.self_link,
            Resource::Firewall(r) => &r.self_link,
            Resource::Disk(r) => &r.self_link,
            Resource::Instance(r) => &r.self_link,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Resource::Network(_) | Resource::Firewall(_) => Scope::Global,
            Resource::Disk(r) => Scope::Zone(r.zone.clone()),
            Resource::Instance(r) => Scope::Zone(r.zone.clone()),
        }
    }

    pub fn status(&self) -> Option<String> {
        match self {
            Resource::Disk(r) => r.status.clone(),
            Resource::Instance(r) => Some(r.status.to_string()),
            _ => None,
        }
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind(),
            name: self.name().to_string(),
            self_link: self.self_link().to_string(),
            scope: self.scope(),
            status: self.status(),
        }
    }
}

/// Typed view over one [`ResourceKind`]
pub trait PlatformResource: Sized + Send + Sync {
    const KIND: ResourceKind;

    fn from_resource(resource: Resource) -> Result<Self>;

    fn into_resource(self) -> Resource;

    fn to_ref(&self) -> ResourceRef;
}

macro_rules! platform_resource {
    ($ty:ident, $kind:ident) => {
        impl PlatformResource for $ty {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn from_resource(resource: Resource) -> Result<Self> {
                match resource {
                    Resource::$kind(inner) => Ok(inner),
                    other => Err(CloudError::UnexpectedResource {
                        expected: Self::KIND,
                        actual: other.kind(),
                    }),
                }
            }

            fn into_resource(self) -> Resource {
                Resource::$kind(self)
            }

            fn to_ref(&self) -> ResourceRef {
                self.clone().into_resource().to_ref()
            }
        }
    };
}

platform_resource!(Network, Network);
platform_resource!(Firewall, Firewall);
platform_resource!(Disk, Disk);
platform_resource!(Instance, Instance);

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        Instance {
            name: "test-1".into(),
            self_link: "https://compute.example/projects/p/zones/us-central1-a/instances/test-1"
                .into(),
            zone: "us-central1-a".into(),
            machine_type: "f1-micro".into(),
            status: InstanceStatus::Running,
            tags: Tags::default(),
            network_interfaces: vec![NetworkInterface {
                network: "https://compute.example/projects/p/global/networks/jclouds-test".into(),
                network_ip: Some("10.0.0.2".into()),
                nat_ip: None,
            }],
            disks: vec![AttachedDisk {
                source: "https://compute.example/projects/p/zones/us-central1-a/disks/test-1-boot"
                    .into(),
                boot: true,
                auto_delete: true,
            }],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_typed_extraction() {
        let resource = Resource::Instance(instance());
        let inst = Instance::from_resource(resource.clone()).unwrap();
        assert_eq!(inst.name, "test-1");

        let err = Disk::from_resource(resource).unwrap_err();
        assert!(matches!(
            err,
            CloudError::UnexpectedResource {
                expected: ResourceKind::Disk,
                actual: ResourceKind::Instance
            }
        ));
    }

    #[test]
    fn test_resource_ref_projection() {
        let r = instance().to_ref();
        assert_eq!(r.kind, ResourceKind::Instance);
        assert_eq!(r.scope, Scope::zone("us-central1-a"));
        assert_eq!(r.status.as_deref(), Some("RUNNING"));
    }

    #[test]
    fn test_network_matching() {
        let inst = instance();
        assert!(inst.is_on_network("jclouds-test"));
        assert!(inst.is_on_network(
            "https://compute.example/projects/p/global/networks/jclouds-test"
        ));
        assert!(!inst.is_on_network("default"));
        assert_eq!(inst.boot_disk().map(|d| name_from_link(&d.source)), Some("test-1-boot"));
    }

    #[test]
    fn test_instance_status_parse() {
        assert_eq!(InstanceStatus::parse("TERMINATED"), InstanceStatus::Terminated);
        assert_eq!(InstanceStatus::parse("REPAIRING"), InstanceStatus::Unknown);
    }
}
