//! Typed facade over a [`ComputePlatform`]
//!
//! Wraps submit → poll → fetch into single calls, with transport retries on
//! every platform round trip.

use crate::error::{CloudError, Result};
use crate::operation::OperationHandle;
use crate::platform::{ComputePlatform, ListFilter};
use crate::poller::OperationPoller;
use crate::request::{ResourceRequest, ResourceUpdate};
use crate::resource::{PlatformResource, ResourceKind, ResourceRef, Scope};
use crate::retry::{PollConfig, RetryConfig, with_retries};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct Compute {
    platform: Arc<dyn ComputePlatform>,
    retry: RetryConfig,
    poller: OperationPoller,
    timeout: Duration,
}

impl Compute {
    pub fn new(platform: Arc<dyn ComputePlatform>) -> Self {
        Self::with_config(platform, RetryConfig::default(), PollConfig::default())
    }

    pub fn with_config(
        platform: Arc<dyn ComputePlatform>,
        retry: RetryConfig,
        poll: PollConfig,
    ) -> Self {
        let timeout = poll.operation_timeout;
        let poller = OperationPoller::new(platform.clone(), poll, retry.clone());
        Self {
            platform,
            retry,
            poller,
            timeout,
        }
    }

    pub fn platform(&self) -> &Arc<dyn ComputePlatform> {
        &self.platform
    }

    pub fn poller(&self) -> &OperationPoller {
        &self.poller
    }

    pub fn operation_timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch<R: PlatformResource>(&self, scope: &Scope, name: &str) -> Result<Option<R>> {
        let resource = with_retries(&self.retry, "get", || {
            self.platform.get(R::KIND, scope, name)
        })
        .await?;
        resource.map(R::from_resource).transpose()
    }

    pub async fn fetch_required<R: PlatformResource>(&self, scope: &Scope, name: &str) -> Result<R> {
        self.fetch(scope, name)
            .await?
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{} {}", R::KIND, name)))
    }

    pub async fn list<R: PlatformResource>(&self, filter: &ListFilter) -> Result<Vec<R>> {
        let resources = with_retries(&self.retry, "list", || {
            self.platform.list(R::KIND, filter)
        })
        .await?;
        resources.into_iter().map(R::from_resource).collect()
    }

    pub async fn submit_insert(
        &self,
        scope: &Scope,
        request: ResourceRequest,
    ) -> Result<OperationHandle> {
        with_retries(&self.retry, "insert", || {
            self.platform.insert(scope, request.clone())
        })
        .await
    }

    pub async fn await_done(&self, handle: &OperationHandle) -> Result<ResourceRef> {
        self.poller.await_done(handle, self.timeout).await
    }

    /// Insert, wait for DONE, then return the resource as the platform sees it
    ///
    /// When the insert had to be resubmitted after a transport error, an
    /// ALREADY_EXISTS answer means an earlier attempt landed, and the existing
    /// resource is returned.
    pub async fn create<R: PlatformResource>(
        &self,
        scope: &Scope,
        request: ResourceRequest,
    ) -> Result<R> {
        if request.kind() != R::KIND {
            return Err(CloudError::UnexpectedResource {
                expected: R::KIND,
                actual: request.kind(),
            });
        }
        let name = request.name().to_string();

        let mut attempts = 0u32;
        let submitted = with_retries(&self.retry, "insert", || {
            attempts += 1;
            self.platform.insert(scope, request.clone())
        })
        .await;
        let outcome = match submitted {
            Ok(handle) => self.await_done(&handle).await.map(|_| ()),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_already_exists() && attempts > 1 => {
                tracing::warn!(
                    "{} {} already exists after {} insert attempts, using it",
                    R::KIND,
                    name,
                    attempts
                );
            }
            Err(e) => return Err(e),
        }
        self.fetch_required(scope, &name).await
    }

    /// Delete and wait for DONE
    pub async fn delete(&self, kind: ResourceKind, scope: &Scope, name: &str) -> Result<()> {
        let handle = with_retries(&self.retry, "delete", || {
            self.platform.delete(kind, scope, name)
        })
        .await?;
        self.await_done(&handle).await?;
        Ok(())
    }

    /// Delete, treating an already-absent resource as success
    ///
    /// Returns `false` when there was nothing to delete.
    pub async fn delete_if_exists(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
    ) -> Result<bool> {
        match self.delete(kind, scope, name).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::info!("{} {} already gone", kind, name);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Submit an in-place update and wait for DONE
    pub async fn update(
        &self,
        kind: ResourceKind,
        scope: &Scope,
        name: &str,
        update: ResourceUpdate,
    ) -> Result<ResourceRef> {
        let handle = with_retries(&self.retry, update.method(), || {
            self.platform.update(kind, scope, name, update.clone())
        })
        .await?;
        self.await_done(&handle).await
    }
}
