//! Bounded retry execution for idempotent backend calls.
//!
//! A call is re-issued sequentially with exponential backoff until it
//! succeeds, fails with an error the classifier marks fatal, or the
//! wall-clock budget runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use skyward_core::{AppError, AppResult, BackendFailure};

/// Outcome of classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The same call may succeed if re-issued later.
    Retryable,
    /// Re-issuing the call cannot help.
    Fatal,
}

/// Classifies backend failures: rate limiting, server errors and transport
/// failures are retryable, everything else is fatal.
#[must_use]
pub fn classify_backend_error(error: &AppError) -> RetryDecision {
    match error.backend().map(|backend| backend.failure()) {
        Some(BackendFailure::Transport) => RetryDecision::Retryable,
        Some(BackendFailure::Status(429 | 500..=599)) => RetryDecision::Retryable,
        Some(BackendFailure::Status(_) | BackendFailure::MalformedResponse) | None => {
            RetryDecision::Fatal
        }
    }
}

/// Wall-clock budget and backoff schedule of a retried call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time allowed across all attempts.
    pub timeout: Duration,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub backoff_multiplier: u32,
}

impl RetryPolicy {
    /// Creates a policy with the default backoff schedule.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        delay
            .saturating_mul(self.backoff_multiplier.max(1))
            .min(self.max_delay)
    }
}

/// Per-operation time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeouts {
    /// Budget for creating a resource and its initial grants.
    pub create: Duration,
    /// Budget for retried update calls.
    pub update: Duration,
    /// Budget for retried delete calls.
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(10 * 60),
            update: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(5 * 60),
        }
    }
}

/// Runs `call` until success, a fatal error, or expiry of the policy timeout.
pub async fn retry_until<T, F, Fut, C>(
    policy: &RetryPolicy,
    operation: &str,
    classify: C,
    mut call: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    C: Fn(&AppError) -> RetryDecision,
{
    let deadline = Instant::now() + policy.timeout;
    let mut delay = policy.initial_delay;
    let mut attempt = 0_u32;
    let mut last_error: Option<String> = None;

    loop {
        attempt = attempt.saturating_add(1);
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out(policy, operation, last_error));
        }

        let error = match tokio::time::timeout(remaining, call()).await {
            Ok(Ok(value)) => {
                debug!(operation, attempt, "retried call succeeded");
                return Ok(value);
            }
            Ok(Err(error)) => error,
            Err(_) => return Err(timed_out(policy, operation, last_error)),
        };

        if classify(&error) == RetryDecision::Fatal {
            return Err(error);
        }

        if Instant::now() + delay >= deadline {
            return Err(timed_out(policy, operation, Some(error.to_string())));
        }

        warn!(
            operation,
            attempt,
            error = %error,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retryable failure, backing off"
        );
        last_error = Some(error.to_string());
        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

fn timed_out(policy: &RetryPolicy, operation: &str, last_error: Option<String>) -> AppError {
    AppError::Timeout {
        operation: operation.to_owned(),
        timeout: policy.timeout,
        last_error,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use skyward_core::{AppError, BackendError};

    use super::{RetryDecision, RetryPolicy, classify_backend_error, retry_until};

    fn policy(timeout: Duration) -> RetryPolicy {
        RetryPolicy {
            timeout,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            backoff_multiplier: 2,
        }
    }

    #[test]
    fn classification_follows_status() {
        let retryable = [
            AppError::from(BackendError::status(429, "slow down")),
            AppError::from(BackendError::status(503, "unavailable")),
            AppError::from(BackendError::transport("connection reset")),
        ];
        for error in &retryable {
            assert_eq!(classify_backend_error(error), RetryDecision::Retryable);
        }

        let fatal = [
            AppError::from(BackendError::status(400, "bad request")),
            AppError::from(BackendError::status(404, "missing")),
            AppError::from(BackendError::malformed("not json")),
            AppError::Validation("bad".to_owned()),
        ];
        for error in &fatal {
            assert_eq!(classify_backend_error(error), RetryDecision::Fatal);
        }
    }

    #[test]
    fn classification_sees_through_context() {
        let error = AppError::from(BackendError::status(502, "bad gateway"))
            .with_context("updating agency");
        assert_eq!(classify_backend_error(&error), RetryDecision::Retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = retry_until(
            &policy(Duration::from_secs(5)),
            "update agency",
            classify_backend_error,
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AppError::from(BackendError::status(429, "slow down")))
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;

        assert!(matches!(result, Ok(7)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_stops_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), AppError> = retry_until(
            &policy(Duration::from_secs(5)),
            "delete agency",
            classify_backend_error,
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::from(BackendError::status(400, "bad request")))
                }
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Backend(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_reports_last_error() {
        let result: Result<(), AppError> = retry_until(
            &policy(Duration::from_millis(100)),
            "delete agency",
            classify_backend_error,
            || async { Err(AppError::from(BackendError::status(503, "unavailable"))) },
        )
        .await;

        match result {
            Err(AppError::Timeout {
                operation,
                last_error,
                ..
            }) => {
                assert_eq!(operation, "delete agency");
                assert_eq!(
                    last_error.as_deref(),
                    Some("backend error: unavailable")
                );
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_call_is_cut_off() {
        let result: Result<(), AppError> = retry_until(
            &policy(Duration::from_secs(1)),
            "update agency",
            classify_backend_error,
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::Timeout {
                last_error: None,
                ..
            })
        ));
    }
}
