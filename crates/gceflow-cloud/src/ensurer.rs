//! Idempotent get-or-create for shared resources

use crate::compute::Compute;
use crate::error::Result;
use crate::request::ResourceRequest;
use crate::resource::{PlatformResource, Scope};

/// Get-or-create for resources shared by many nodes (networks, firewalls)
///
/// An existing resource is returned as the platform reports it and is never
/// reconciled against the request. Losing a creation race to a concurrent
/// caller counts as success.
pub struct ResourceEnsurer<'a> {
    compute: &'a Compute,
}

impl<'a> ResourceEnsurer<'a> {
    pub fn new(compute: &'a Compute) -> Self {
        Self { compute }
    }

    pub async fn ensure<R, F>(&self, scope: &Scope, name: &str, factory: F) -> Result<R>
    where
        R: PlatformResource,
        F: FnOnce() -> ResourceRequest,
    {
        if let Some(existing) = self.compute.fetch::<R>(scope, name).await? {
            tracing::debug!("{} {} already exists", R::KIND, name);
            return Ok(existing);
        }

        tracing::info!("Creating {}: {}", R::KIND, name);
        let created = async {
            let handle = self.compute.submit_insert(scope, factory()).await?;
            self.compute.await_done(&handle).await
        }
        .await;

        match created {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {
                tracing::info!(
                    "{} {} was created concurrently, using the existing one",
                    R::KIND,
                    name
                );
            }
            Err(e) => return Err(e),
        }

        self.compute.fetch_required(scope, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, MemoryPlatform};
    use crate::request::NewNetwork;
    use crate::resource::{Network, ResourceKind};
    use futures_util::future::join_all;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn network_request(name: &str) -> ResourceRequest {
        NewNetwork {
            name: name.to_string(),
            ipv4_range: "10.0.0.0/8".to_string(),
            description: None,
        }
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_resource_returned_unchanged() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.seed_node("z", "web-1", "net", "web");
        let compute = Compute::new(platform.clone());

        let factory_calls = AtomicU32::new(0);
        let net: Network = ResourceEnsurer::new(&compute)
            .ensure(&Scope::Global, "net", || {
                factory_calls.fetch_add(1, Ordering::SeqCst);
                network_request("net")
            })
            .await
            .unwrap();

        assert_eq!(net.name, "net");
        assert_eq!(factory_calls.load(Ordering::SeqCst), 0);
        assert!(platform.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_ensure_creates_once() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        let compute = Compute::new(platform.clone());
        let ensurer = ResourceEnsurer::new(&compute);

        let results: Vec<Result<Network>> = join_all(
            (0..4).map(|_| ensurer.ensure(&Scope::Global, "shared", || network_request("shared"))),
        )
        .await;

        let links: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().self_link)
            .collect();
        assert!(links.iter().all(|l| l == &links[0]));

        let applied_inserts = platform
            .applied()
            .into_iter()
            .filter(|c| matches!(c, Call::Insert { kind: ResourceKind::Network, .. }))
            .count();
        assert_eq!(applied_inserts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_failures_propagate() {
        let platform = Arc::new(MemoryPlatform::new("myproject"));
        platform.fail_operation_for(
            "net",
            crate::error::ErrorCode::QuotaExceeded,
            "Quota 'NETWORKS' exceeded",
        );
        let compute = Compute::new(platform.clone());

        let err = ResourceEnsurer::new(&compute)
            .ensure::<Network, _>(&Scope::Global, "net", || network_request("net"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(&crate::error::ErrorCode::QuotaExceeded));
    }
}
