//! Node templates, per-node specs and the node view

use crate::image::ImageInfo;
use crate::naming::{
    self, METADATA_DELETE_BOOT_DISK, METADATA_GROUP, METADATA_IMAGE, METADATA_SSH_KEYS, NodeId,
};
use crate::resource::{Instance, InstanceStatus, name_from_link};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub user: String,
    pub public_key: String,
}

impl LoginCredentials {
    /// `user:key user@localhost`
    pub fn ssh_keys_entry(&self) -> String {
        format!(
            "{}:{} {}@localhost",
            self.user,
            self.public_key.trim(),
            self.user
        )
    }
}

/// Desired shape shared by every node of a launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub zone: String,
    /// Machine type self link
    pub machine_type: String,
    /// Image self link
    pub image: String,
    pub disk_size_gb: u32,
    /// Network name; defaults to the group network
    pub network: Option<String>,
    pub network_range: String,
    pub inbound_ports: Vec<u16>,
    pub tags: Vec<String>,
    pub login: Option<LoginCredentials>,
    pub metadata: BTreeMap<String, String>,
    pub external_ip: bool,
    pub delete_boot_disk: bool,
}

impl NodeTemplate {
    pub fn new(
        zone: impl Into<String>,
        machine_type: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            zone: zone.into(),
            machine_type: machine_type.into(),
            image: image.into(),
            disk_size_gb: 10,
            network: None,
            network_range: "10.0.0.0/8".to_string(),
            inbound_ports: vec![22],
            tags: Vec::new(),
            login: None,
            metadata: BTreeMap::new(),
            external_ip: true,
            delete_boot_disk: true,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_login(mut self, user: impl Into<String>, public_key: impl Into<String>) -> Self {
        self.login = Some(LoginCredentials {
            user: user.into(),
            public_key: public_key.into(),
        });
        self
    }
}

/// Fully resolved input for provisioning one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub group: String,
    pub zone: String,
    pub machine_type: String,
    pub image: String,
    pub disk_size_gb: u32,
    pub network: String,
    pub network_range: String,
    pub inbound_ports: Vec<u16>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub external_ip: bool,
}

impl NodeSpec {
    pub fn from_template(
        name: impl Into<String>,
        group: impl Into<String>,
        network: impl Into<String>,
        template: &NodeTemplate,
    ) -> Self {
        let group = group.into();

        let mut metadata = template.metadata.clone();
        if let Some(login) = &template.login {
            metadata.insert(METADATA_SSH_KEYS.to_string(), login.ssh_keys_entry());
        }
        metadata.insert(METADATA_GROUP.to_string(), group.clone());
        metadata.insert(METADATA_IMAGE.to_string(), template.image.clone());
        metadata.insert(
            METADATA_DELETE_BOOT_DISK.to_string(),
            template.delete_boot_disk.to_string(),
        );

        Self {
            name: name.into(),
            group,
            zone: template.zone.clone(),
            machine_type: template.machine_type.clone(),
            image: template.image.clone(),
            disk_size_gb: template.disk_size_gb,
            network: network.into(),
            network_range: template.network_range.clone(),
            inbound_ports: template.inbound_ports.clone(),
            tags: template.tags.clone(),
            metadata,
            external_ip: template.external_ip,
        }
    }

    pub fn boot_disk_name(&self) -> String {
        naming::boot_disk_name(&self.name)
    }

    pub fn firewall_name(&self) -> String {
        naming::firewall_name(&self.network, &self.inbound_ports)
    }

    /// Requested tags plus the firewall target tag, without duplicates
    pub fn desired_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len() + 1);
        for tag in self.tags.iter().cloned().chain([self.firewall_name()]) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Caller-facing view of a provisioned instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub group: Option<String>,
    pub image: Option<ImageInfo>,
    pub status: InstanceStatus,
    pub tags: Vec<String>,
    /// Network name
    pub network: Option<String>,
    pub private_ips: Vec<String>,
    pub public_ips: Vec<String>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn image_id(&self) -> Option<&str> {
        self.image.as_ref().map(|image| image.id.as_str())
    }
}

impl From<&Instance> for Node {
    fn from(instance: &Instance) -> Self {
        Self {
            id: NodeId::new(&instance.zone, &instance.name),
            group: instance.metadata.get(METADATA_GROUP).cloned(),
            image: instance
                .metadata
                .get(METADATA_IMAGE)
                .map(|link| ImageInfo::from_link(link)),
            status: instance.status,
            tags: instance.tags.items.clone(),
            network: instance
                .network_interfaces
                .first()
                .map(|nic| name_from_link(&nic.network).to_string()),
            private_ips: instance
                .network_interfaces
                .iter()
                .filter_map(|nic| nic.network_ip.clone())
                .collect(),
            public_ips: instance
                .network_interfaces
                .iter()
                .filter_map(|nic| nic.nat_ip.clone())
                .collect(),
        }
    }
}
