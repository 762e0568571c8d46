//! Retry and polling configuration

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;

/// Retry configuration for transient transport failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff(
            self.initial_delay,
            self.max_delay,
            self.backoff_multiplier,
            attempt,
        )
    }
}

/// Operation polling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the second poll
    pub initial_interval: Duration,

    /// Upper bound on any single poll interval
    pub max_interval: Duration,

    pub multiplier: f64,

    /// Default deadline for one operation
    pub operation_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            multiplier: 1.5,
            operation_timeout: Duration::from_secs(600),
        }
    }
}

impl PollConfig {
    pub fn interval_for_poll(&self, poll: u32) -> Duration {
        backoff(self.initial_interval, self.max_interval, self.multiplier, poll)
    }
}

fn backoff(initial: Duration, max: Duration, multiplier: f64, attempt: u32) -> Duration {
    let millis = initial.as_millis() as f64 * multiplier.powi(attempt as i32);
    let capped = millis.min(max.as_millis() as f64);
    Duration::from_millis(capped as u64)
}

/// Run `call`, retrying transient transport errors with backoff
///
/// Non-transient errors are returned immediately. Exhausting the attempts
/// yields [`CloudError::TransportFailure`].
pub async fn with_retries<T, F, Fut>(config: &RetryConfig, what: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match call().await {
            Err(CloudError::Transport(message)) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(CloudError::TransportFailure {
                        attempts: attempt,
                        message,
                    });
                }
                let delay = config.delay_for_attempt(attempt - 1);
                tracing::debug!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    what,
                    message,
                    attempt,
                    max_attempts - 1,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}
