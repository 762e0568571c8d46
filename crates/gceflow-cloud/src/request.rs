//! Creation and update requests submitted to the platform

use crate::resource::{FirewallRule, ResourceKind, Tags};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNetwork {
    pub name: String,
    pub ipv4_range: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFirewall {
    pub name: String,
    /// Network self link
    pub network: String,
    pub source_ranges: Vec<String>,
    pub source_tags: Vec<String>,
    pub target_tags: Vec<String>,
    pub allowed: Vec<FirewallRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDisk {
    pub name: String,
    pub size_gb: u32,
    /// Image self link the disk is initialised from
    pub source_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInstance {
    pub name: String,
    /// Machine type self link
    pub machine_type: String,
    /// Boot disk self link; attached with `boot` and `autoDelete` set
    pub boot_disk: String,
    /// Network self link
    pub network: String,
    /// Request an ephemeral external address
    pub external_ip: bool,
    pub metadata: BTreeMap<String, String>,
}

/// Any creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRequest {
    Network(NewNetwork),
    Firewall(NewFirewall),
    Disk(NewDisk),
    Instance(NewInstance),
}

impl ResourceRequest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRequest::Network(_) => ResourceKind::Network,
            ResourceRequest::Firewall(_) => ResourceKind::Firewall,
            ResourceRequest::Disk(_) => ResourceKind::Disk,
            ResourceRequest::Instance(_) => ResourceKind::Instance,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceRequest::Network(r) => &r.name,
            ResourceRequest::Firewall(r) => &r.name,
            ResourceRequest::Disk(r) => &r.name,
            ResourceRequest::Instance(r) => &r.name,
        }
    }
}

impl From<NewNetwork> for ResourceRequest {
    fn from(r: NewNetwork) -> Self {
        ResourceRequest::Network(r)
    }
}

impl From<NewFirewall> for ResourceRequest {
    fn from(r: NewFirewall) -> Self {
        ResourceRequest::Firewall(r)
    }
}

impl From<NewDisk> for ResourceRequest {
    fn from(r: NewDisk) -> Self {
        ResourceRequest::Disk(r)
    }
}

impl From<NewInstance> for ResourceRequest {
    fn from(r: NewInstance) -> Self {
        ResourceRequest::Instance(r)
    }
}

/// In-place mutation of an existing resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceUpdate {
    /// Replace instance tags; `fingerprint` must match the current one
    SetTags(Tags),
}

impl ResourceUpdate {
    /// Platform method name, as reported in operation records
    pub fn method(&self) -> &'static str {
        match self {
            ResourceUpdate::SetTags(_) => "setTags",
        }
    }
}
