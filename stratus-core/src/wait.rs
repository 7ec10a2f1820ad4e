//! Polling for asynchronous cloud operations
//!
//! Cloud-side effects such as provisioning or bucket deletion complete
//! eventually. `wait_until` polls a condition with exponential backoff until it
//! holds, a permanent error is returned, or the timeout elapses.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;

use crate::provider::{ProviderError, ProviderResult};

/// Error returned by a polling condition.
///
/// `backoff::Error::Permanent` aborts polling immediately, `Transient` keeps
/// retrying until the timeout.
pub type PollError = backoff::Error<ProviderError>;

/// Wrap an error so polling stops at once
pub fn permanent(err: ProviderError) -> PollError {
    backoff::Error::permanent(err)
}

/// Wrap an error so polling continues
pub fn transient(err: ProviderError) -> PollError {
    backoff::Error::transient(err)
}

/// Backoff and timeout settings for a polling loop
#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(30),
            multiplier: 1.5,
            randomization_factor: 0.1,
            timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl WaitConfig {
    /// Poll at a constant interval
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
            randomization_factor: 0.0,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

enum Attempt {
    Pending,
    Failed(ProviderError),
    Aborted(ProviderError),
}

/// Poll `condition` until it returns `Ok(true)`.
///
/// `what` describes the awaited condition in log lines and the timeout error.
pub async fn wait_until<F, Fut>(what: &str, config: &WaitConfig, mut condition: F) -> ProviderResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, PollError>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(config.initial_interval)
        .with_max_interval(config.max_interval)
        .with_multiplier(config.multiplier)
        .with_randomization_factor(config.randomization_factor)
        .with_max_elapsed_time(Some(config.timeout))
        .build();

    let result = backoff::future::retry_notify(
        policy,
        || {
            let check = condition();
            async move {
                match check.await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(backoff::Error::transient(Attempt::Pending)),
                    Err(backoff::Error::Permanent(err)) => {
                        Err(backoff::Error::permanent(Attempt::Aborted(err)))
                    }
                    Err(backoff::Error::Transient { err, .. }) => {
                        Err(backoff::Error::transient(Attempt::Failed(err)))
                    }
                }
            }
        },
        |attempt: Attempt, next: Duration| match attempt {
            Attempt::Failed(err) => {
                log::debug!("waiting for {}: {} (retrying in {:?})", what, err, next)
            }
            _ => log::debug!("still waiting for {} (retrying in {:?})", what, next),
        },
    )
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(Attempt::Aborted(err)) => Err(err),
        Err(Attempt::Pending) => Err(ProviderError::timeout(format!(
            "timed out after {:?} waiting for {}",
            config.timeout, what
        ))),
        Err(Attempt::Failed(err)) => Err(ProviderError::timeout(format!(
            "timed out after {:?} waiting for {}: {}",
            config.timeout, what, err
        ))
        .with_cause(err)),
    }
}
