use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration for calls to the generative model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_retries: u32,

    /// Backoff before the second attempt; doubles after every further failure
    #[serde(with = "millis")]
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Delay slept after failed attempt `attempt` (0-based): `initial_delay * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("Retry count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Outcome class of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Temporary rate or quota exhaustion, worth another attempt
    Retryable,
    Fatal,
}

/// Errors that know whether the executor may retry them
pub trait Classify {
    fn classify(&self) -> ErrorKind;
}

/// One try inside the retry loop
struct CallAttempt {
    index: u32,
    delay: Duration,
}

/// Run `call` under `policy`, sleeping with exponential backoff between
/// retryable failures.
///
/// Returns the first success, or the error of the attempt that ended the loop:
/// a fatal error straight away, or the last retryable one once attempts run out.
/// A zero `max_retries` is treated as a single attempt.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + std::fmt::Display,
{
    let attempts = policy.max_retries.max(1);
    let mut index = 0;

    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let is_last = index + 1 >= attempts;
        if err.classify() == ErrorKind::Fatal || is_last {
            debug!(
                "Giving up after attempt {}/{}: {}",
                index + 1,
                attempts,
                err
            );
            return Err(err);
        }

        let attempt = CallAttempt {
            index,
            delay: policy.delay_for(index),
        };
        warn!(
            "Rate limited on attempt {}/{}, retrying in {}ms: {}",
            attempt.index + 1,
            attempts,
            attempt.delay.as_millis(),
            err
        );
        tokio::time::sleep(attempt.delay).await;
        index += 1;
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum TestError {
        RateLimited(u32),
        Broken(&'static str),
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Classify for TestError {
        fn classify(&self) -> ErrorKind {
            match self {
                TestError::RateLimited(_) => ErrorKind::Retryable,
                TestError::Broken(_) => ErrorKind::Fatal,
            }
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(100))
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(5000));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(10000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40000));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(64) >= policy.delay_for(31));
    }

    #[test]
    fn test_validate_zero_retries() {
        let result = RetryPolicy::new(0, Duration::from_millis(10)).validate();
        assert!(result.unwrap_err().contains("at least 1"));
    }

    #[test]
    fn test_policy_serializes_millis() {
        let json = serde_json::to_value(RetryPolicy::default()).unwrap();
        assert_eq!(json["initial_delay"], 5000);

        let back: RetryPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, RetryPolicy::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_delays() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), TestError> = execute(&policy(4), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(TestError::RateLimited(n)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 100 + 200 + 400, no sleep after the final attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(700) && elapsed < Duration::from_millis(710));
        assert_eq!(result, Err(TestError::RateLimited(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), TestError> = execute(&policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Broken("bad request")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(1));
        assert_eq!(result, Err(TestError::Broken("bad request")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_stops_retrying() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = execute(&policy(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TestError::RateLimited(n))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(310));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_after_retryable_stops() {
        let calls = AtomicU32::new(0);

        let result: Result<(), TestError> = execute(&policy(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(TestError::RateLimited(n))
                } else {
                    Err(TestError::Broken("server exploded"))
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result, Err(TestError::Broken("server exploded")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<(), TestError> = execute(&policy(0), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(TestError::RateLimited(n)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Err(TestError::RateLimited(0)));
    }
}
