//! Retry loop.

use super::config::RetryOptions;
use kairo_core::constants::OP_RETRY;
use kairo_core::unwind::capture_async;
use kairo_core::{PipelineError, Result, Thunk};
use std::future::Future;
use tokio::time::sleep;

/// Invoke a thunk until it succeeds or the attempt budget is spent.
///
/// A thunk that fails on every call is invoked exactly `max_attempts` times.
/// Errors rejected by the options' `retry_on` policy end the loop at once.
pub async fn retry<T>(thunk: &Thunk<T>, options: &RetryOptions) -> Result<T>
where
    T: Send + 'static,
{
    retry_fn(options, || thunk.invoke(())).await
}

/// Retry an async closure producing a `Result`
pub async fn retry_fn<F, Fut, T>(options: &RetryOptions, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match capture_async(OP_RETRY, operation()).await {
            Ok(outcome) => outcome,
            Err(panicked) => Err(panicked),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !options.should_retry(&error) {
                    tracing::debug!(attempt, error = %error, "error is not retryable");
                    return Err(give_up(error, attempt, false));
                }
                if attempt >= max_attempts {
                    return Err(give_up(error, attempt, true));
                }

                let delay = options.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "operation failed, retrying"
                );
                options.notify_retry(attempt, &error);
                sleep(delay).await;
            }
        }
    }
}

fn give_up(error: PipelineError, attempts: u32, retryable: bool) -> PipelineError {
    let message = if retryable {
        format!("failed after {attempts} attempt(s): {}", error.message)
    } else {
        format!("non-retryable failure on attempt {attempts}: {}", error.message)
    };
    PipelineError::new(OP_RETRY, message)
        .with_context("attempts", attempts)
        .with_context("retryable", retryable)
        .with_cause(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::config::RetryOn;
    use kairo_core::Operation;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> Thunk<&'static str> {
        Operation::async_fallible(move |()| {
            let calls = Arc::clone(&calls);
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call <= failures {
                    Err(PipelineError::new("fetch", format!("attempt {call} failed")))
                } else {
                    Ok("ok")
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let thunk = flaky(2, Arc::clone(&calls));

        let result = retry(&thunk, &RetryOptions::new(3)).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_is_called_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let thunk = flaky(u32::MAX, Arc::clone(&calls));

        let error = retry(&thunk, &RetryOptions::new(4)).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(error.operation, "retry");
        assert_eq!(error.context_value("attempts"), Some(&serde_json::json!(4)));
        assert_eq!(error.cause().map(|c| c.operation), Some("fetch".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let thunk = flaky(0, Arc::clone(&calls));

        assert!(retry(&thunk, &RetryOptions::new(5)).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let thunk = flaky(u32::MAX, Arc::clone(&calls));
        let options = RetryOptions::new(5)
            .with_retry_on(RetryOn::Operations(vec!["network".to_string()]));

        let error = retry(&thunk, &options).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(error.context_value("retryable"), Some(&serde_json::json!(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let thunk = flaky(2, Arc::clone(&calls));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let hook_seen = Arc::clone(&seen);
        let options = RetryOptions::new(3)
            .with_delay(Duration::from_millis(100))
            .on_retry(move |attempt, _| hook_seen.lock().push(attempt));

        let start = tokio::time::Instant::now();
        retry(&thunk, &options).await.unwrap();

        // 100ms after the first failure, 200ms after the second
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fn_counts_panics_as_failures() {
        let mut calls = 0;
        let result = retry_fn(&RetryOptions::new(2), || {
            calls += 1;
            let current = calls;
            async move {
                assert!(current > 1, "first call panics");
                Ok(current)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }
}
