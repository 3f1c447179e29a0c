use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Factor to multiply delay by after each attempt
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::bounded(3, Duration::from_millis(25))
    }
}

impl RetryConfig {
    /// `retries` additional attempts after the first, doubling the delay each time.
    pub fn bounded(retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            initial_delay,
            max_delay: initial_delay.saturating_mul(8),
            backoff_factor: 2.0,
        }
    }
}

/// Retry policy for determining if an error is retryable
pub trait RetryPolicy<E> {
    fn is_retryable(&self, error: &E) -> bool;
}

/// Retries only on store lock contention and serialization failures.
pub struct ContentionPolicy;

impl RetryPolicy<ServiceError> for ContentionPolicy {
    fn is_retryable(&self, error: &ServiceError) -> bool {
        error.is_contention()
    }
}

/// Execute an async function with retries
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    policy: impl RetryPolicy<E>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!("Operation succeeded after {} attempts", attempts);
                }
                return Ok(result);
            }
            Err(error) => {
                if attempts >= config.max_attempts || !policy.is_retryable(&error) {
                    return Err(error);
                }

                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempts, error, delay
                );

                sleep(delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_factor)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

/// Runs a compare-and-set style write, retrying on contention and surfacing a
/// conflict once the attempts are spent.
pub async fn retry_on_contention<F, Fut, T>(
    config: &RetryConfig,
    what: &str,
    operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    match with_retry(config, ContentionPolicy, operation).await {
        Err(error) if error.is_contention() => {
            metrics::counter!("replenishment.contention_exhausted", 1);
            warn!(operation = what, error = %error, "giving up after store contention");
            Err(ServiceError::Conflict(format!(
                "{} could not complete because of concurrent writes; retry the request",
                what
            )))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbErr;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn locked() -> ServiceError {
        ServiceError::DatabaseError(DbErr::Custom("database is locked".into()))
    }

    #[tokio::test]
    async fn contention_is_retried_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let config = RetryConfig::bounded(3, Duration::from_millis(1));

        let result = retry_on_contention(&config, "test write", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(locked())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_contention_becomes_conflict() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let config = RetryConfig::bounded(2, Duration::from_millis(1));

        let result: Result<(), _> = retry_on_contention(&config, "test write", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(locked())
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let config = RetryConfig::bounded(3, Duration::from_millis(1));

        let result: Result<(), _> = retry_on_contention(&config, "test write", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::NotFound("RO-2603-0001".into()))
        })
        .await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
