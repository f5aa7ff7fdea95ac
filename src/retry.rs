//! Bounded retry with a fixed inter-attempt delay.
//!
//! Every store round-trip goes through this one utility instead of ad hoc
//! loops at each call site. Only errors the caller classifies as transient
//! are retried; anything else fails fast.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy: attempt bound and fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// bound is exhausted. `is_transient` decides whether an error is worth
/// another attempt.
pub async fn retry<T, E, Fut, F, P>(
    policy: &RetryPolicy,
    op_name: &str,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("retry op={} succeeded on attempt {}", op_name, attempt);
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_attempts && is_transient(&err) => {
                warn!(
                    "retry op={} attempt {}/{} failed: {}",
                    op_name, attempt, policy.max_attempts, err
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    warn!(
                        "retry op={} gave up after {} attempts: {}",
                        op_name, attempt, err
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result: Result<i32, String> =
            retry(&fast_policy(), "op", |_| true, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_recovers_after_two_transient_failures() {
        let mut calls = 0;
        let result: Result<i32, String> = retry(&fast_policy(), "op", |_| true, || {
            calls += 1;
            let n = calls;
            async move {
                if n < 3 {
                    Err("connection reset".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempt_bound() {
        let mut calls = 0;
        let result: Result<i32, String> = retry(&fast_policy(), "op", |_| true, || {
            calls += 1;
            async { Err("still down".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_fast() {
        let mut calls = 0;
        let result: Result<i32, String> = retry(
            &fast_policy(),
            "op",
            |e: &String| e.contains("timeout"),
            || {
                calls += 1;
                async { Err("constraint violation".to_string()) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
