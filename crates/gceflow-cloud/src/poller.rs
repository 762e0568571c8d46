//! Operation completion polling
//!
//! Turns "submit request, get handle" into "resource is ready or definitively
//! failed". The poller never drives a transition; it only observes the
//! platform until DONE or until the caller's deadline passes.

use crate::error::{CloudError, Result};
use crate::operation::{Operation, OperationHandle};
use crate::platform::ComputePlatform;
use crate::resource::ResourceRef;
use crate::retry::{PollConfig, RetryConfig, with_retries};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[derive(Clone)]
pub struct OperationPoller {
    platform: Arc<dyn ComputePlatform>,
    poll: PollConfig,
    retry: RetryConfig,
}

impl OperationPoller {
    pub fn new(platform: Arc<dyn ComputePlatform>, poll: PollConfig, retry: RetryConfig) -> Self {
        Self {
            platform,
            poll,
            retry,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.poll
    }

    /// Wait until the operation is DONE, returning its target on success
    ///
    /// # Returns
    /// * `Ok(ResourceRef)` - DONE with an empty error list
    /// * `Err(OperationFailed)` - DONE carrying errors; the first one is reported
    /// * `Err(Timeout)` - deadline passed; the operation is left running
    /// * `Err(Lost)` - the operation record no longer exists
    /// * `Err(TransportFailure)` - fetch retries exhausted
    pub async fn await_done(
        &self,
        handle: &OperationHandle,
        timeout: Duration,
    ) -> Result<ResourceRef> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut poll: u32 = 0;

        loop {
            let operation = self.fetch(handle).await?;

            if operation.is_done() {
                if let Some(error) = operation.primary_error() {
                    tracing::debug!(
                        "Operation {} failed: [{}] {}",
                        handle,
                        error.code,
                        error.message
                    );
                    return Err(CloudError::OperationFailed {
                        operation: handle.name.clone(),
                        code: error.code.clone(),
                        message: error.message.clone(),
                    });
                }
                tracing::debug!("Operation {} done after {} polls", handle, poll + 1);
                return Ok(handle.target.clone());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CloudError::Timeout {
                    operation: handle.name.clone(),
                    waited: now - started,
                });
            }

            let interval = self.poll.interval_for_poll(poll).min(deadline - now);
            tracing::debug!(
                "Operation {} is {}, next poll in {:?}",
                handle,
                operation.status,
                interval
            );
            sleep(interval).await;
            poll += 1;
        }
    }

    async fn fetch(&self, handle: &OperationHandle) -> Result<Operation> {
        let result = with_retries(&self.retry, "get operation", || {
            self.platform.get_operation(handle)
        })
        .await;

        match result {
            Err(e) if e.is_not_found() => {
                tracing::warn!("Operation {} no longer exists on the platform", handle);
                Err(CloudError::Lost(handle.name.clone()))
            }
            other => other,
        }
    }
}
