//! In-memory compute platform
//!
//! Behaves like the real platform where the orchestrator can observe it:
//! mutations are accepted asynchronously and only take effect when the
//! operation reaches DONE after a scripted number of polls, conflicting
//! mutations finish with platform error codes, and tag writes are guarded by
//! fingerprints. Faults (transport errors, expired operations, failed
//! operations, fingerprint races) can be injected per test.

use crate::error::{CloudError, ErrorCode, Result};
use crate::operation::{
    Operation, OperationError, OperationHandle, OperationKind, OperationStatus,
};
use crate::platform::{ComputePlatform, ListFilter};
use crate::request::{ResourceRequest, ResourceUpdate};
use crate::resource::{
    AttachedDisk, Disk, Firewall, Instance, InstanceStatus, Network, NetworkInterface, Resource,
    ResourceKind, ResourceRef, Scope, Tags, name_from_link, same_resource,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

const API_BASE: &str = "https://www.googleapis.com/compute/v1";

/// Platform call recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get {
        kind: ResourceKind,
        name: String,
    },
    List {
        kind: ResourceKind,
    },
    Insert {
        kind: ResourceKind,
        name: String,
    },
    Delete {
        kind: ResourceKind,
        name: String,
    },
    SetTags {
        instance: String,
        items: Vec<String>,
        fingerprint: Option<String>,
    },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Get { .. } | Call::List { .. })
    }
}

type Key = (ResourceKind, Scope, String);

enum Effect {
    Create(Resource),
    Delete(Key),
    SetTags(Key, Vec<String>),
}

struct PendingOperation {
    operation: Operation,
    polls: u32,
    effect: Option<Effect>,
}

#[derive(Default)]
struct State {
    resources: BTreeMap<Key, Resource>,
    operations: HashMap<String, PendingOperation>,
    next_operation: u64,
    next_fingerprint: u64,
    next_address: u32,
    calls: Vec<Call>,
    applied: Vec<Call>,
    failing_fetches: u32,
    scripted_failures: HashMap<String, OperationError>,
    tag_conflicts: u32,
    lost_insert_responses: HashSet<String>,
}

impl State {
    fn fingerprint(&mut self) -> String {
        self.next_fingerprint += 1;
        format!("fp-{:04}", self.next_fingerprint)
    }
}

pub struct MemoryPlatform {
    project: String,
    polls_until_done: u32,
    state: Mutex<State>,
}

fn key(kind: ResourceKind, scope: &Scope, name: &str) -> Key {
    let scope = if kind.is_zonal() {
        scope.clone()
    } else {
        Scope::Global
    };
    (kind, scope, name.to_string())
}

impl MemoryPlatform {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            polls_until_done: 3,
            state: Mutex::new(State::default()),
        }
    }

    /// Number of `get_operation` calls before an operation reports DONE
    pub fn with_polls_until_done(mut self, polls: u32) -> Self {
        self.polls_until_done = polls.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn self_link(&self, kind: ResourceKind, scope: &Scope, name: &str) -> String {
        let (_, scope, _) = key(kind, scope, name);
        format!(
            "{}/projects/{}/{}/{}/{}",
            API_BASE,
            self.project,
            scope.path(),
            kind.collection(),
            name
        )
    }

    pub fn image_link(&self, image_project: &str, image: &str) -> String {
        format!("{}/projects/{}/global/images/{}", API_BASE, image_project, image)
    }

    pub fn machine_type_link(&self, zone: &str, machine_type: &str) -> String {
        format!(
            "{}/projects/{}/zones/{}/machineTypes/{}",
            API_BASE, self.project, zone, machine_type
        )
    }

    /// Place a resource directly, bypassing operations
    pub fn seed(&self, resource: Resource) {
        let k = key(resource.kind(), &resource.scope(), resource.name());
        self.lock().resources.insert(k, resource);
    }

    /// Seed a running node with its boot disk and network
    pub fn seed_node(&self, zone: &str, name: &str, network: &str, group: &str) -> Instance {
        let network_link = self.self_link(ResourceKind::Network, &Scope::Global, network);
        if !self.exists(ResourceKind::Network, &Scope::Global, network) {
            self.seed(Resource::Network(Network {
                name: network.to_string(),
                self_link: network_link.clone(),
                ipv4_range: Some("10.0.0.0/8".to_string()),
                gateway_ipv4: Some("10.0.0.1".to_string()),
                description: None,
            }));
        }

        let scope = Scope::zone(zone);
        let disk_name = format!("{}-boot", name);
        let disk_link = self.self_link(ResourceKind::Disk, &scope, &disk_name);
        self.seed(Resource::Disk(Disk {
            name: disk_name,
            self_link: disk_link.clone(),
            zone: zone.to_string(),
            size_gb: 10,
            source_image: Some(self.image_link("debian-cloud", "debian-7-wheezy-v20140718")),
            status: Some("READY".to_string()),
        }));

        let mut metadata = BTreeMap::new();
        metadata.insert("gceflow-group".to_string(), group.to_string());
        let fingerprint = self.lock().fingerprint();
        let instance = Instance {
            name: name.to_string(),
            self_link: self.self_link(ResourceKind::Instance, &scope, name),
            zone: zone.to_string(),
            machine_type: self.machine_type_link(zone, "f1-micro"),
            status: InstanceStatus::Running,
            tags: Tags {
                items: Vec::new(),
                fingerprint: Some(fingerprint),
            },
            network_interfaces: vec![NetworkInterface {
                network: network_link,
                network_ip: Some("10.0.0.100".to_string()),
                nat_ip: None,
            }],
            disks: vec![AttachedDisk {
                source: disk_link,
                boot: true,
                auto_delete: true,
            }],
            metadata,
        };
        self.seed(Resource::Instance(instance.clone()));
        instance
    }

    pub fn exists(&self, kind: ResourceKind, scope: &Scope, name: &str) -> bool {
        self.lock().resources.contains_key(&key(kind, scope, name))
    }

    pub fn resource_names(&self, kind: ResourceKind) -> Vec<String> {
        self.lock()
            .resources
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    /// Every call received, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Mutating calls received, in submission order
    pub fn submitted(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Mutations that took effect, in completion order
    pub fn applied(&self) -> Vec<Call> {
        self.lock().applied.clone()
    }

    pub fn operation_polls(&self, operation: &str) -> u32 {
        self.lock()
            .operations
            .get(operation)
            .map(|op| op.polls)
            .unwrap_or(0)
    }

    /// Fail the next `count` operation fetches with a transport error
    pub fn fail_next_operation_fetches(&self, count: u32) {
        self.lock().failing_fetches = count;
    }

    /// Drop an operation record, as the platform does after expiry
    pub fn expire_operation(&self, operation: &str) {
        self.lock().operations.remove(operation);
    }

    /// Finish the next operation targeting `name` with the given error
    pub fn fail_operation_for(&self, name: &str, code: ErrorCode, message: &str) {
        self.lock()
            .scripted_failures
            .insert(name.to_string(), OperationError::new(code, message));
    }

    /// Accept and apply the next insert of `name`, then answer with a
    /// transport error so the caller never sees the operation
    pub fn drop_insert_response_for(&self, name: &str) {
        self.lock().lost_insert_responses.insert(name.to_string());
    }

    /// Reject the next `count` tag writes as if a concurrent writer won
    pub fn inject_tag_conflicts(&self, count: u32) {
        self.lock().tag_conflicts = count;
    }

    fn submit(
        &self,
        state: &mut State,
        kind: OperationKind,
        target: ResourceRef,
        effect: Effect,
    ) -> OperationHandle {
        state.next_operation += 1;
        let name = format!("operation-{:04}", state.next_operation);
        let scope = match &target.scope {
            Scope::Zone(zone) => Scope::Zone(zone.clone()),
            _ => Scope::Global,
        };
        let handle = OperationHandle {
            self_link: format!(
                "{}/projects/{}/{}/operations/{}",
                API_BASE,
                self.project,
                scope.path(),
                name
            ),
            name: name.clone(),
            kind,
            scope,
            target,
        };
        let mut operation = Operation {
            handle: handle.clone(),
            status: OperationStatus::Pending,
            errors: Vec::new(),
            progress: Some(0),
            inserted_at: Some(Utc::now()),
            ended_at: None,
        };
        if let Some(error) = state.scripted_failures.remove(&handle.target.name) {
            // Fails at completion without touching state
            operation.errors.push(error);
            state.operations.insert(
                name,
                PendingOperation {
                    operation,
                    polls: 0,
                    effect: None,
                },
            );
            return handle;
        }
        state.operations.insert(
            name,
            PendingOperation {
                operation,
                polls: 0,
                effect: Some(effect),
            },
        );
        handle
    }

    fn materialize(&self, state: &mut State, scope: &Scope, request: &ResourceRequest) -> Resource {
        let kind = request.kind();
        let self_link = self.self_link(kind, scope, request.name());
        let zone = match scope {
            Scope::Zone(zone) => zone.clone(),
            _ => String::new(),
        };
        match request {
            ResourceRequest::Network(r) => Resource::Network(Network {
                name: r.name.clone(),
                self_link,
                ipv4_range: Some(r.ipv4_range.clone()),
                gateway_ipv4: None,
                description: r.description.clone(),
            }),
            ResourceRequest::Firewall(r) => Resource::Firewall(Firewall {
                name: r.name.clone(),
                self_link,
                network: r.network.clone(),
                source_ranges: r.source_ranges.clone(),
                source_tags: r.source_tags.clone(),
                target_tags: r.target_tags.clone(),
                allowed: r.allowed.clone(),
            }),
            ResourceRequest::Disk(r) => Resource::Disk(Disk {
                name: r.name.clone(),
                self_link,
                zone,
                size_gb: r.size_gb,
                source_image: Some(r.source_image.clone()),
                status: Some("READY".to_string()),
            }),
            ResourceRequest::Instance(r) => {
                state.next_address += 1;
                let fingerprint = state.fingerprint();
                Resource::Instance(Instance {
                    name: r.name.clone(),
                    self_link,
                    zone,
                    machine_type: r.machine_type.clone(),
                    status: InstanceStatus::Running,
                    tags: Tags {
                        items: Vec::new(),
                        fingerprint: Some(fingerprint),
                    },
                    network_interfaces: vec![NetworkInterface {
                        network: r.network.clone(),
                        network_ip: Some(format!("10.0.0.{}", state.next_address + 1)),
                        nat_ip: r
                            .external_ip
                            .then(|| format!("203.0.113.{}", state.next_address)),
                    }],
                    disks: vec![AttachedDisk {
                        source: r.boot_disk.clone(),
                        boot: true,
                        auto_delete: true,
                    }],
                    metadata: r.metadata.clone(),
                })
            }
        }
    }

    fn apply(&self, state: &mut State, effect: Effect) -> std::result::Result<(), OperationError> {
        match effect {
            Effect::Create(resource) => {
                let k = key(resource.kind(), &resource.scope(), resource.name());
                if state.resources.contains_key(&k) {
                    return Err(OperationError::new(
                        ErrorCode::AlreadyExists,
                        format!("The resource '{}' already exists", resource.self_link()),
                    ));
                }
                if let Resource::Instance(instance) = &resource {
                    check_references(state, instance)?;
                }
                state.applied.push(Call::Insert {
                    kind: resource.kind(),
                    name: resource.name().to_string(),
                });
                state.resources.insert(k, resource);
                Ok(())
            }
            Effect::Delete(k) => {
                let Some(resource) = state.resources.get(&k).cloned() else {
                    return Err(not_found(&k));
                };
                check_not_in_use(state, &resource)?;
                state.resources.remove(&k);
                state.applied.push(Call::Delete {
                    kind: k.0,
                    name: k.2.clone(),
                });
                if let Resource::Instance(instance) = resource {
                    for disk in instance.disks.iter().filter(|d| d.auto_delete) {
                        let disk_key = key(
                            ResourceKind::Disk,
                            &Scope::zone(instance.zone.clone()),
                            name_from_link(&disk.source),
                        );
                        if state.resources.remove(&disk_key).is_some() {
                            state.applied.push(Call::Delete {
                                kind: ResourceKind::Disk,
                                name: disk_key.2.clone(),
                            });
                        }
                    }
                }
                Ok(())
            }
            Effect::SetTags(k, items) => {
                let fingerprint = state.fingerprint();
                match state.resources.get_mut(&k) {
                    Some(Resource::Instance(instance)) => {
                        instance.tags = Tags {
                            items: items.clone(),
                            fingerprint: Some(fingerprint.clone()),
                        };
                        state.applied.push(Call::SetTags {
                            instance: k.2.clone(),
                            items,
                            fingerprint: Some(fingerprint),
                        });
                        Ok(())
                    }
                    _ => Err(not_found(&k)),
                }
            }
        }
    }
}

fn not_found(k: &Key) -> OperationError {
    OperationError::new(
        ErrorCode::NotFound,
        format!("The resource '{}' of kind {} was not found", k.2, k.0),
    )
}

fn check_references(state: &State, instance: &Instance) -> std::result::Result<(), OperationError> {
    for nic in &instance.network_interfaces {
        let k = key(ResourceKind::Network, &Scope::Global, name_from_link(&nic.network));
        if !state.resources.contains_key(&k) {
            return Err(not_found(&k));
        }
    }
    for disk in &instance.disks {
        let k = key(
            ResourceKind::Disk,
            &Scope::zone(instance.zone.clone()),
            name_from_link(&disk.source),
        );
        if !state.resources.contains_key(&k) {
            return Err(not_found(&k));
        }
    }
    Ok(())
}

fn check_not_in_use(state: &State, resource: &Resource) -> std::result::Result<(), OperationError> {
    let in_use_by = state.resources.values().find(|other| match (resource, other) {
        (Resource::Network(net), Resource::Firewall(fw)) => {
            same_resource(&fw.network, &net.self_link)
        }
        (Resource::Network(net), Resource::Instance(inst)) => inst.is_on_network(&net.self_link),
        (Resource::Disk(disk), Resource::Instance(inst)) => inst
            .disks
            .iter()
            .any(|d| same_resource(&d.source, &disk.self_link)),
        _ => false,
    });
    match in_use_by {
        Some(other) => Err(OperationError::new(
            ErrorCode::ResourceInUse,
            format!(
                "The {} resource '{}' is already being used by '{}'",
                resource.kind(),
                resource.self_link(),
                other.self_link()
            ),
        )),
        None => Ok(()),
    }
}

#[async_trait]
impl ComputePlatform for MemoryPlatform {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
    ) -> Result<Option<Resource>> {
        let mut state = self.lock();
        state.calls.push(Call::Get {
            kind,
            name: name.to_string(),
        });
        Ok(state.resources.get(&key(kind, scope, name)).cloned())
    }

    async fn list(&self, kind: ResourceKind, filter: &ListFilter) -> Result<Vec<Resource>> {
        let mut state = self.lock();
        state.calls.push(Call::List { kind });
        Ok(state
            .resources
            .iter()
            .filter(|((k, _, _), resource)| *k == kind && filter.matches(resource))
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    async fn insert(&self, scope: &Scope, request: ResourceRequest) -> Result<OperationHandle> {
        let mut state = self.lock();
        state.calls.push(Call::Insert {
            kind: request.kind(),
            name: request.name().to_string(),
        });
        let resource = self.materialize(&mut state, scope, &request);
        if state.lost_insert_responses.remove(request.name()) {
            self.apply(&mut state, Effect::Create(resource))
                .map_err(|e| CloudError::api(e.code, e.message))?;
            return Err(CloudError::Transport(
                "connection reset after request was sent".to_string(),
            ));
        }
        let target = resource.to_ref();
        Ok(self.submit(
            &mut state,
            OperationKind::Insert,
            target,
            Effect::Create(resource),
        ))
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
    ) -> Result<OperationHandle> {
        let mut state = self.lock();
        state.calls.push(Call::Delete {
            kind,
            name: name.to_string(),
        });
        let k = key(kind, scope, name);
        let Some(resource) = state.resources.get(&k) else {
            let error = not_found(&k);
            return Err(CloudError::api(error.code, error.message));
        };
        let target = resource.to_ref();
        Ok(self.submit(&mut state, OperationKind::Delete, target, Effect::Delete(k)))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
        update: ResourceUpdate,
    ) -> Result<OperationHandle> {
        let mut state = self.lock();
        let ResourceUpdate::SetTags(tags) = update;
        state.calls.push(Call::SetTags {
            instance: name.to_string(),
            items: tags.items.clone(),
            fingerprint: tags.fingerprint.clone(),
        });

        let k = key(kind, scope, name);
        let current = match state.resources.get(&k) {
            Some(Resource::Instance(instance)) => instance.tags.fingerprint.clone(),
            _ => {
                let error = not_found(&k);
                return Err(CloudError::api(error.code, error.message));
            }
        };

        if state.tag_conflicts > 0 {
            state.tag_conflicts -= 1;
            let fingerprint = state.fingerprint();
            if let Some(Resource::Instance(instance)) = state.resources.get_mut(&k) {
                instance.tags.fingerprint = Some(fingerprint);
            }
            return Err(CloudError::api(
                ErrorCode::ConditionNotMet,
                "Supplied fingerprint does not match current metadata fingerprint.",
            ));
        }

        if tags.fingerprint != current {
            return Err(CloudError::api(
                ErrorCode::ConditionNotMet,
                "Supplied fingerprint does not match current metadata fingerprint.",
            ));
        }

        let target = state
            .resources
            .get(&k)
            .map(|r| r.to_ref())
            .ok_or_else(|| CloudError::ResourceNotFound(name.to_string()))?;
        Ok(self.submit(
            &mut state,
            OperationKind::Update,
            target,
            Effect::SetTags(k, tags.items),
        ))
    }

    async fn get_operation(&self, handle: &OperationHandle) -> Result<Operation> {
        let mut state = self.lock();
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(CloudError::Transport("connection reset by peer".to_string()));
        }

        let polls_until_done = self.polls_until_done;
        let (done_now, effect) = match state.operations.get_mut(&handle.name) {
            None => {
                return Err(CloudError::api(
                    ErrorCode::NotFound,
                    format!("The resource '{}' was not found", handle.self_link),
                ));
            }
            Some(pending) => {
                pending.polls += 1;
                if pending.operation.is_done() {
                    (false, None)
                } else if pending.polls >= polls_until_done {
                    pending.operation.status = OperationStatus::Done;
                    pending.operation.progress = Some(100);
                    pending.operation.ended_at = Some(Utc::now());
                    (true, pending.effect.take())
                } else {
                    pending.operation.status = if pending.polls == 1 {
                        OperationStatus::Pending
                    } else {
                        OperationStatus::Running
                    };
                    (false, None)
                }
            }
        };

        if done_now {
            if let Some(effect) = effect {
                if let Err(error) = self.apply(&mut state, effect) {
                    if let Some(pending) = state.operations.get_mut(&handle.name) {
                        pending.operation.errors.push(error);
                    }
                }
            }
        }

        state
            .operations
            .get(&handle.name)
            .map(|pending| pending.operation.clone())
            .ok_or_else(|| CloudError::Lost(handle.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::NewNetwork;

    async fn drive(platform: &MemoryPlatform, handle: &OperationHandle) -> Operation {
        loop {
            let op = platform.get_operation(handle).await.unwrap();
            if op.is_done() {
                return op;
            }
        }
    }

    #[tokio::test]
    async fn test_status_progression() {
        let platform = MemoryPlatform::new("p");
        let handle = platform
            .insert(
                &Scope::Global,
                NewNetwork {
                    name: "net".into(),
                    ipv4_range: "10.0.0.0/8".into(),
                    description: None,
                }
                .into(),
            )
            .await
            .unwrap();

        let mut observed = Vec::new();
        for _ in 0..3 {
            observed.push(platform.get_operation(&handle).await.unwrap().status);
        }
        assert_eq!(
            observed,
            vec![
                OperationStatus::Pending,
                OperationStatus::Running,
                OperationStatus::Done
            ]
        );
        assert!(platform.exists(ResourceKind::Network, &Scope::Global, "net"));
    }

    #[tokio::test]
    async fn test_network_in_use_by_firewall() {
        let platform = MemoryPlatform::new("p").with_polls_until_done(1);
        platform.seed_node("z", "n-1", "net", "g");
        let net_link = platform.self_link(ResourceKind::Network, &Scope::Global, "net");
        platform.seed(Resource::Firewall(Firewall {
            name: "net-port-22".into(),
            self_link: platform.self_link(ResourceKind::Firewall, &Scope::Global, "net-port-22"),
            network: net_link,
            source_ranges: vec![],
            source_tags: vec![],
            target_tags: vec![],
            allowed: vec![],
        }));

        let handle = platform
            .delete(ResourceKind::Network, &Scope::Global, "net")
            .await
            .unwrap();
        let op = drive(&platform, &handle).await;
        assert_eq!(op.primary_error().unwrap().code, ErrorCode::ResourceInUse);
    }

    #[tokio::test]
    async fn test_instance_delete_reclaims_auto_delete_disk() {
        let platform = MemoryPlatform::new("p").with_polls_until_done(1);
        platform.seed_node("z", "n-1", "net", "g");

        let handle = platform
            .delete(ResourceKind::Instance, &Scope::zone("z"), "n-1")
            .await
            .unwrap();
        let op = drive(&platform, &handle).await;
        assert!(op.errors.is_empty());
        assert!(!platform.exists(ResourceKind::Disk, &Scope::zone("z"), "n-1-boot"));

        let err = platform
            .delete(ResourceKind::Disk, &Scope::zone("z"), "n-1-boot")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_fingerprint_rejected() {
        let platform = MemoryPlatform::new("p");
        platform.seed_node("z", "n-1", "net", "g");

        let err = platform
            .update(
                ResourceKind::Instance,
                &Scope::zone("z"),
                "n-1",
                ResourceUpdate::SetTags(Tags {
                    items: vec!["web".into()],
                    fingerprint: Some("stale".into()),
                }),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
