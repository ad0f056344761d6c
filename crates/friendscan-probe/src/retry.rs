use friendscan_core::ProbeConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Sleeper;
use crate::error::RetryExhausted;

/// Failed attempts after which the delay still doubles. Later failures
/// reuse the last delay.
pub const BACKOFF_GROWTH_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.max_attempts, config.initial_retry_delay())
    }

    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let doublings = failed_attempt
            .saturating_sub(1)
            .min(BACKOFF_GROWTH_ATTEMPTS);
        self.initial_delay.saturating_mul(1 << doublings)
    }

    /// Longest single pause this policy can take.
    pub fn max_delay(&self) -> Duration {
        self.delay_after(BACKOFF_GROWTH_ATTEMPTS + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Failed attempts before the successful one
    pub retries: u32,
}

/// Run `f` until it succeeds or `policy.max_attempts` invocations have
/// failed. Each failure except the last is logged and followed by a pause
/// on `sleeper`.
pub async fn with_retry<T, E, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut f: F,
) -> Result<RetryOutcome<T>, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retrying");
                }
                return Ok(RetryOutcome {
                    value,
                    retries: attempt - 1,
                });
            }
            Err(error) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    "{} failed ({}), retrying in {:?}",
                    operation,
                    error,
                    delay
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingSleeper;
    use std::cell::Cell;

    #[derive(Debug, thiserror::Error)]
    #[error("flaky call #{0}")]
    struct Flaky(u32);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_delay_growth_is_capped() {
        let policy = RetryPolicy::new(10, secs(16));
        let delays: Vec<_> = (1..=5).map(|a| policy.delay_after(a)).collect();
        assert_eq!(delays, vec![secs(16), secs(32), secs(64), secs(64), secs(64)]);
        assert_eq!(policy.max_delay(), secs(64));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, secs(1)).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_immediate_success_never_sleeps() {
        let sleeper = RecordingSleeper::new();
        let outcome = with_retry("init", &RetryPolicy::new(4, secs(1)), &sleeper, || async {
            Ok::<_, Flaky>(7)
        })
        .await
        .unwrap();

        assert_eq!(outcome, RetryOutcome { value: 7, retries: 0 });
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0);
        let outcome = with_retry("addmember", &RetryPolicy::new(5, secs(1)), &sleeper, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n <= 3 {
                    Err(Flaky(n))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, 4);
        assert_eq!(outcome.retries, 3);
        assert_eq!(sleeper.sleeps(), vec![secs(1), secs(2), secs(4)]);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_last_error() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0);
        let err = with_retry("delmember", &RetryPolicy::new(4, secs(1)), &sleeper, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Err::<(), _>(Flaky(n)) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), 4);
        assert_eq!(err.operation, "delmember");
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last_error.0, 4);
        assert_eq!(sleeper.sleeps(), vec![secs(1), secs(2), secs(4)]);
        assert_eq!(
            err.to_string(),
            "delmember failed after 4 attempts: flaky call #4"
        );
    }
}
