//! Single-node teardown

use crate::compute::Compute;
use crate::error::Result;
use crate::naming::{self, METADATA_DELETE_BOOT_DISK};
use crate::resource::{Instance, ResourceKind, Scope, name_from_link};

pub struct TeardownCoordinator<'a> {
    compute: &'a Compute,
}

impl<'a> TeardownCoordinator<'a> {
    pub fn new(compute: &'a Compute) -> Self {
        Self { compute }
    }

    /// Delete the instance, then its boot disk
    ///
    /// Either one already being gone counts as success. Shared resources are
    /// left to the caller.
    pub async fn destroy(&self, instance: &Instance) -> Result<()> {
        let zone = Scope::zone(&instance.zone);

        tracing::info!("Deleting instance: {}/{}", instance.zone, instance.name);
        self.compute
            .delete_if_exists(ResourceKind::Instance, &zone, &instance.name)
            .await?;

        if instance.metadata.get(METADATA_DELETE_BOOT_DISK).map(String::as_str) == Some("false") {
            tracing::info!("Keeping boot disk of {}", instance.name);
            return Ok(());
        }

        let disk = boot_disk_name(instance);
        tracing::info!("Deleting boot disk: {}", disk);
        if !self
            .compute
            .delete_if_exists(ResourceKind::Disk, &zone, &disk)
            .await?
        {
            tracing::debug!("Boot disk {} was reclaimed with its instance", disk);
        }
        Ok(())
    }
}

fn boot_disk_name(instance: &Instance) -> String {
    instance
        .boot_disk()
        .map(|disk| name_from_link(&disk.source).to_string())
        .unwrap_or_else(|| naming::boot_disk_name(&instance.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, MemoryPlatform};
    use crate::resource::Resource;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_destroy_tolerates_auto_deleted_disk() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let instance = platform.seed_node("z", "web-1", "net", "web");
        let compute = Compute::new(platform.clone());

        TeardownCoordinator::new(&compute)
            .destroy(&instance)
            .await
            .unwrap();

        assert_eq!(
            platform.submitted(),
            vec![
                Call::Delete {
                    kind: ResourceKind::Instance,
                    name: "web-1".into()
                },
                Call::Delete {
                    kind: ResourceKind::Disk,
                    name: "web-1-boot".into()
                },
            ]
        );
        assert!(!platform.exists(ResourceKind::Disk, &Scope::zone("z"), "web-1-boot"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_deletes_disk_without_auto_delete() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let mut instance = platform.seed_node("z", "web-1", "net", "web");
        instance.disks[0].auto_delete = false;
        platform.seed(Resource::Instance(instance.clone()));
        let compute = Compute::new(platform.clone());

        TeardownCoordinator::new(&compute)
            .destroy(&instance)
            .await
            .unwrap();

        assert_eq!(
            platform.applied(),
            vec![
                Call::Delete {
                    kind: ResourceKind::Instance,
                    name: "web-1".into()
                },
                Call::Delete {
                    kind: ResourceKind::Disk,
                    name: "web-1-boot".into()
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_boot_disk_flag() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let mut instance = platform.seed_node("z", "web-1", "net", "web");
        instance.disks[0].auto_delete = false;
        instance
            .metadata
            .insert(METADATA_DELETE_BOOT_DISK.to_string(), "false".to_string());
        platform.seed(Resource::Instance(instance.clone()));
        let compute = Compute::new(platform.clone());

        TeardownCoordinator::new(&compute)
            .destroy(&instance)
            .await
            .unwrap();

        assert!(platform.exists(ResourceKind::Disk, &Scope::zone("z"), "web-1-boot"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_missing_instance_is_noop() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let instance = platform.seed_node("z", "web-1", "net", "web");
        platform.seed_node("z", "web-2", "net", "web");
        let compute = Compute::new(platform.clone());
        let teardown = TeardownCoordinator::new(&compute);

        teardown.destroy(&instance).await.unwrap();
        teardown.destroy(&instance).await.unwrap();

        assert!(platform.exists(ResourceKind::Instance, &Scope::zone("z"), "web-2"));
    }
}
