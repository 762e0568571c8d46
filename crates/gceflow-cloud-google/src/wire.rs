//! Compute Engine v1 JSON shapes
//!
//! Response DTOs convert into the `gceflow-cloud` domain model; request
//! payloads serialize to exactly what the API expects.

use chrono::{DateTime, Utc};
use gceflow_cloud::resource::name_from_link;
use gceflow_cloud::{
    AttachedDisk, Disk, ErrorCode, Firewall, FirewallRule, Instance, InstanceStatus, Network,
    NetworkInterface, NewDisk, NewFirewall, NewInstance, NewNetwork, Operation, OperationError,
    OperationHandle, OperationKind, OperationStatus, Resource, ResourceKind, ResourceRef, Scope,
    Tags,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ---- responses -------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDto {
    pub name: String,
    pub self_link: String,
    #[serde(rename = "IPv4Range")]
    pub ipv4_range: Option<String>,
    #[serde(rename = "gatewayIPv4")]
    pub gateway_ipv4: Option<String>,
    pub description: Option<String>,
}

impl From<NetworkDto> for Network {
    fn from(dto: NetworkDto) -> Self {
        Network {
            name: dto.name,
            self_link: dto.self_link,
            ipv4_range: dto.ipv4_range,
            gateway_ipv4: dto.gateway_ipv4,
            description: dto.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedDto {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

impl From<&FirewallRule> for AllowedDto {
    fn from(rule: &FirewallRule) -> Self {
        AllowedDto {
            ip_protocol: rule.protocol.clone(),
            ports: rule.ports.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallDto {
    pub name: String,
    pub self_link: String,
    pub network: String,
    #[serde(default)]
    pub source_ranges: Vec<String>,
    #[serde(default)]
    pub source_tags: Vec<String>,
    #[serde(default)]
    pub target_tags: Vec<String>,
    #[serde(default)]
    pub allowed: Vec<AllowedDto>,
}

impl From<FirewallDto> for Firewall {
    fn from(dto: FirewallDto) -> Self {
        Firewall {
            name: dto.name,
            self_link: dto.self_link,
            network: dto.network,
            source_ranges: dto.source_ranges,
            source_tags: dto.source_tags,
            target_tags: dto.target_tags,
            allowed: dto
                .allowed
                .into_iter()
                .map(|a| FirewallRule {
                    protocol: a.ip_protocol,
                    ports: a.ports,
                })
                .collect(),
        }
    }
}

/// `sizeGb` is an int64 and arrives as a JSON string
fn size_gb<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u32),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskDto {
    pub name: String,
    pub self_link: String,
    pub zone: String,
    #[serde(deserialize_with = "size_gb")]
    pub size_gb: u32,
    pub source_image: Option<String>,
    pub status: Option<String>,
}

impl From<DiskDto> for Disk {
    fn from(dto: DiskDto) -> Self {
        Disk {
            name: dto.name,
            self_link: dto.self_link,
            zone: name_from_link(&dto.zone).to_string(),
            size_gb: dto.size_gb,
            source_image: dto.source_image,
            status: dto.status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TagsDto {
    #[serde(default)]
    pub items: Vec<String>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetadataDto {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfigDto {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "natIP", skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceDto {
    pub network: String,
    #[serde(rename = "networkIP")]
    pub network_ip: Option<String>,
    #[serde(default)]
    pub access_configs: Vec<AccessConfigDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskDto {
    pub source: String,
    #[serde(default)]
    pub boot: bool,
    #[serde(default)]
    pub auto_delete: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDto {
    pub name: String,
    pub self_link: String,
    pub zone: String,
    pub machine_type: String,
    pub status: String,
    #[serde(default)]
    pub tags: TagsDto,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterfaceDto>,
    #[serde(default)]
    pub disks: Vec<AttachedDiskDto>,
    #[serde(default)]
    pub metadata: MetadataDto,
}

impl From<InstanceDto> for Instance {
    fn from(dto: InstanceDto) -> Self {
        Instance {
            name: dto.name,
            self_link: dto.self_link,
            zone: name_from_link(&dto.zone).to_string(),
            machine_type: dto.machine_type,
            status: InstanceStatus::parse(&dto.status),
            tags: Tags {
                items: dto.tags.items,
                fingerprint: dto.tags.fingerprint,
            },
            network_interfaces: dto
                .network_interfaces
                .into_iter()
                .map(|nic| NetworkInterface {
                    nat_ip: nic.access_configs.iter().find_map(|ac| ac.nat_ip.clone()),
                    network: nic.network,
                    network_ip: nic.network_ip,
                })
                .collect(),
            disks: dto
                .disks
                .into_iter()
                .map(|d| AttachedDisk {
                    source: d.source,
                    boot: d.boot,
                    auto_delete: d.auto_delete,
                })
                .collect(),
            metadata: dto
                .metadata
                .items
                .into_iter()
                .map(|item| (item.key, item.value))
                .collect(),
        }
    }
}

/// Parse one resource of the given kind
pub fn resource_from_json(kind: ResourceKind, value: serde_json::Value) -> serde_json::Result<Resource> {
    Ok(match kind {
        ResourceKind::Network => Resource::Network(serde_json::from_value::<NetworkDto>(value)?.into()),
        ResourceKind::Firewall => {
            Resource::Firewall(serde_json::from_value::<FirewallDto>(value)?.into())
        }
        ResourceKind::Disk => Resource::Disk(serde_json::from_value::<DiskDto>(value)?.into()),
        ResourceKind::Instance => {
            Resource::Instance(serde_json::from_value::<InstanceDto>(value)?.into())
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDto {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    pub next_page_token: Option<String>,
}

/// `aggregated/<collection>` page; items keyed by `zones/<zone>`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedListDto {
    #[serde(default)]
    pub items: BTreeMap<String, serde_json::Value>,
    pub next_page_token: Option<String>,
}

impl AggregatedListDto {
    /// Flatten the per-scope lists of `collection` (`instances`, `disks`)
    pub fn into_items(self, collection: &str) -> Vec<serde_json::Value> {
        self.items
            .into_values()
            .filter_map(|mut scoped| match scoped.get_mut(collection) {
                Some(serde_json::Value::Array(items)) => Some(std::mem::take(items)),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct OperationErrorEntry {
    pub code: String,
    pub location: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OperationErrorsDto {
    #[serde(default)]
    pub errors: Vec<OperationErrorEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDto {
    pub name: String,
    pub self_link: String,
    pub target_link: Option<String>,
    pub operation_type: Option<String>,
    pub status: String,
    pub progress: Option<u8>,
    pub insert_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub zone: Option<String>,
    pub region: Option<String>,
    pub error: Option<OperationErrorsDto>,
}

impl OperationDto {
    pub fn scope(&self) -> Scope {
        if let Some(zone) = &self.zone {
            Scope::Zone(name_from_link(zone).to_string())
        } else if let Some(region) = &self.region {
            Scope::Region(name_from_link(region).to_string())
        } else {
            Scope::Global
        }
    }

    /// Handle for an operation just returned by a mutating call
    pub fn into_handle(self, kind: ResourceKind, name: &str, scope: &Scope) -> OperationHandle {
        let op_scope = self.scope();
        let self_link = self.target_link.clone().unwrap_or_default();
        OperationHandle {
            kind: self
                .operation_type
                .as_deref()
                .map(OperationKind::from_operation_type)
                .unwrap_or(OperationKind::Update),
            name: self.name,
            self_link: self.self_link,
            scope: op_scope,
            target: ResourceRef {
                kind,
                name: name.to_string(),
                self_link,
                scope: scope.clone(),
                status: None,
            },
        }
    }

    /// Snapshot for an already known handle
    pub fn into_operation(self, handle: &OperationHandle) -> Operation {
        Operation {
            handle: handle.clone(),
            status: OperationStatus::parse(&self.status).unwrap_or(OperationStatus::Running),
            errors: self
                .error
                .map(|e| e.errors)
                .unwrap_or_default()
                .into_iter()
                .map(|e| OperationError {
                    code: ErrorCode::parse(&e.code),
                    message: e.message,
                    location: e.location,
                })
                .collect(),
            progress: self.progress,
            inserted_at: self.insert_time,
            ended_at: self.end_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorReason {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

// ---- requests --------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct NetworkPayload<'a> {
    pub name: &'a str,
    #[serde(rename = "IPv4Range")]
    pub ipv4_range: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

impl<'a> From<&'a NewNetwork> for NetworkPayload<'a> {
    fn from(r: &'a NewNetwork) -> Self {
        NetworkPayload {
            name: &r.name,
            ipv4_range: &r.ipv4_range,
            description: r.description.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallPayload<'a> {
    pub name: &'a str,
    pub network: &'a str,
    pub source_ranges: &'a [String],
    pub source_tags: &'a [String],
    pub target_tags: &'a [String],
    pub allowed: Vec<AllowedDto>,
}

impl<'a> From<&'a NewFirewall> for FirewallPayload<'a> {
    fn from(r: &'a NewFirewall) -> Self {
        FirewallPayload {
            name: &r.name,
            network: &r.network,
            source_ranges: &r.source_ranges,
            source_tags: &r.source_tags,
            target_tags: &r.target_tags,
            allowed: r.allowed.iter().map(AllowedDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskPayload<'a> {
    pub name: &'a str,
    pub size_gb: u32,
    pub source_image: &'a str,
}

impl<'a> From<&'a NewDisk> for DiskPayload<'a> {
    fn from(r: &'a NewDisk) -> Self {
        DiskPayload {
            name: &r.name,
            size_gb: r.size_gb,
            source_image: &r.source_image,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskPayload<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mode: &'static str,
    pub source: &'a str,
    pub auto_delete: bool,
    pub boot: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfacePayload<'a> {
    pub network: &'a str,
    pub access_configs: Vec<AccessConfigDto>,
}

#[derive(Debug, Serialize)]
pub struct MetadataPayload {
    pub kind: &'static str,
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePayload<'a> {
    pub name: &'a str,
    pub machine_type: &'a str,
    pub service_accounts: Vec<serde_json::Value>,
    pub disks: Vec<AttachedDiskPayload<'a>>,
    pub network_interfaces: Vec<NetworkInterfacePayload<'a>>,
    pub metadata: MetadataPayload,
}

impl<'a> From<&'a NewInstance> for InstancePayload<'a> {
    fn from(r: &'a NewInstance) -> Self {
        let access_configs = if r.external_ip {
            vec![AccessConfigDto {
                kind: "ONE_TO_ONE_NAT".to_string(),
                nat_ip: None,
            }]
        } else {
            Vec::new()
        };
        InstancePayload {
            name: &r.name,
            machine_type: &r.machine_type,
            service_accounts: Vec::new(),
            disks: vec![AttachedDiskPayload {
                kind: "PERSISTENT",
                mode: "READ_WRITE",
                source: &r.boot_disk,
                auto_delete: true,
                boot: true,
            }],
            network_interfaces: vec![NetworkInterfacePayload {
                network: &r.network,
                access_configs,
            }],
            metadata: MetadataPayload {
                kind: "compute#metadata",
                items: r
                    .metadata
                    .iter()
                    .map(|(key, value)| MetadataItem {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SetTagsPayload<'a> {
    pub items: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<&'a str>,
}

impl<'a> From<&'a Tags> for SetTagsPayload<'a> {
    fn from(tags: &'a Tags) -> Self {
        SetTagsPayload {
            items: &tags.items,
            fingerprint: tags.fingerprint.as_deref(),
        }
    }
}
