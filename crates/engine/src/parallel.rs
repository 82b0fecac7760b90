//! Bounded concurrent execution of independent thunks.
//!
//! Thunks are grouped into batches of `max_concurrency`. Every thunk in a
//! batch is started together on the calling task and the whole batch is
//! awaited before the next one starts.

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use kairo_config::EngineConfig;
use kairo_core::constants::OP_PARALLEL;
use kairo_core::unwind::capture;
use kairo_core::{PipelineContext, PipelineError, Result, Thunk};
use tracing::Instrument;

/// Options for [`parallel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelOptions {
    /// Thunks per batch; `None` starts every thunk at once
    pub max_concurrency: Option<usize>,
    /// Return the first failure as soon as its batch completes
    pub fail_fast: bool,
    /// Keep a `None` placeholder for each failed thunk instead of dropping it
    pub collect_errors: bool,
    /// Report results by input position rather than completion order
    pub preserve_order: bool,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            fail_fast: false,
            collect_errors: false,
            preserve_order: true,
        }
    }
}

impl ParallelOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    #[must_use]
    pub fn collect_errors(mut self) -> Self {
        self.collect_errors = true;
        self
    }

    #[must_use]
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }
}

/// Run every thunk and gather the outcomes.
///
/// Successful thunks yield `Some(value)`. A failed thunk yields `None` when
/// `collect_errors` is set and is dropped otherwise. If every thunk fails the
/// call fails with an aggregate error listing each failure.
pub async fn parallel<T>(thunks: &[Thunk<T>], options: &ParallelOptions) -> Result<Vec<Option<T>>>
where
    T: Send + 'static,
{
    if thunks.is_empty() {
        return Ok(Vec::new());
    }

    let span = tracing::debug_span!(
        "parallel",
        thunks = thunks.len(),
        max_concurrency = ?options.max_concurrency
    );
    let outcomes = run_batches(thunks, options).instrument(span).await?;

    let failures: Vec<&PipelineError> = outcomes
        .iter()
        .filter_map(|(_, outcome)| outcome.as_ref().err())
        .collect();

    if failures.len() == outcomes.len() {
        let errors: Vec<PipelineError> = failures.into_iter().cloned().collect();
        return Err(all_failed(&errors));
    }

    Ok(outcomes
        .into_iter()
        .filter_map(|(index, outcome)| match outcome {
            Ok(value) => Some(Some(value)),
            Err(error) => {
                tracing::warn!(index, error = %error, "Parallel operation failed");
                options.collect_errors.then_some(None)
            }
        })
        .collect())
}

/// Run every thunk, then reduce the results with `combiner`
pub async fn parallel_with<T, R, F>(
    thunks: &[Thunk<T>],
    options: &ParallelOptions,
    combiner: F,
) -> Result<R>
where
    T: Send + 'static,
    F: FnOnce(&PipelineContext, Vec<Option<T>>) -> Result<R>,
{
    let context = PipelineContext::new()
        .with_metadata("thunks", thunks.len())
        .with_metadata("max_concurrency", options.max_concurrency);
    let results = parallel(thunks, options).await?;
    let context = context.trace(OP_PARALLEL);
    capture(OP_PARALLEL, || combiner(&context, results))?
}

async fn run_batches<T>(
    thunks: &[Thunk<T>],
    options: &ParallelOptions,
) -> Result<Vec<(usize, Result<T>)>>
where
    T: Send + 'static,
{
    let batch_size = options.max_concurrency.unwrap_or(thunks.len()).max(1);
    let mut outcomes = Vec::with_capacity(thunks.len());

    for (batch, chunk) in thunks.chunks(batch_size).enumerate() {
        let offset = batch * batch_size;
        let started = chunk
            .iter()
            .enumerate()
            .map(|(i, thunk)| async move { (offset + i, thunk.invoke(()).await) });

        let batch_outcomes: Vec<(usize, Result<T>)> = if options.preserve_order {
            join_all(started).await
        } else {
            started.collect::<FuturesUnordered<_>>().collect().await
        };

        if options.fail_fast {
            if let Some((index, error)) = first_failure(&batch_outcomes) {
                let settled = || outcomes.iter().chain(&batch_outcomes);
                if settled().all(|(_, outcome)| outcome.is_err()) {
                    let errors: Vec<PipelineError> = settled()
                        .filter_map(|(_, outcome)| outcome.as_ref().err().cloned())
                        .collect();
                    return Err(all_failed(&errors));
                }
                return Err(PipelineError::new(
                    OP_PARALLEL,
                    format!("Operation {index} failed: {}", error.message),
                )
                .with_context("index", index)
                .with_context("batch", batch)
                .with_cause(error.clone()));
            }
        }

        outcomes.extend(batch_outcomes);
    }

    Ok(outcomes)
}

fn all_failed(errors: &[PipelineError]) -> PipelineError {
    PipelineError::new(
        OP_PARALLEL,
        format!("All {} operations failed", errors.len()),
    )
    .with_errors("errors", errors)
}

fn first_failure<T>(outcomes: &[(usize, Result<T>)]) -> Option<(usize, &PipelineError)> {
    outcomes
        .iter()
        .find_map(|(index, outcome)| outcome.as_ref().err().map(|error| (*index, error)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairo_core::Operation;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    fn after(ms: u64, value: i32) -> Thunk<i32> {
        Operation::asynchronous(move |()| async move {
            sleep(Duration::from_millis(ms)).await;
            value
        })
    }

    fn failing(message: &'static str) -> Thunk<i32> {
        Operation::fallible(move |()| Err(PipelineError::new("thunk", message)))
    }

    #[tokio::test]
    async fn test_empty_is_ok() {
        let result = parallel::<i32>(&[], &ParallelOptions::default()).await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_concurrently_in_input_order() {
        let thunks = vec![after(30, 1), after(10, 2), after(20, 3)];
        let start = Instant::now();

        let result = parallel(&thunks, &ParallelOptions::default()).await.unwrap();

        assert_eq!(result, vec![Some(1), Some(2), Some(3)]);
        assert!(start.elapsed() < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order() {
        let thunks = vec![after(30, 1), after(10, 2), after(20, 3)];
        let options = ParallelOptions {
            preserve_order: false,
            ..ParallelOptions::default()
        };

        let result = parallel(&thunks, &options).await.unwrap();
        assert_eq!(result, vec![Some(2), Some(3), Some(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_bound_concurrency() {
        let thunks = vec![after(100, 1), after(100, 2), after(100, 3), after(100, 4)];
        let start = Instant::now();

        let options = ParallelOptions::default().max_concurrency(2);
        parallel(&thunks, &options).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_fail_fast_cites_failure() {
        let thunks = vec![after(0, 1), after(0, 2), failing("c broke")];
        let options = ParallelOptions::default().fail_fast();

        let error = parallel(&thunks, &options).await.unwrap_err();
        assert_eq!(error.message, "Operation 2 failed: c broke");
        assert_eq!(error.cause().unwrap().message, "c broke");
    }

    #[tokio::test]
    async fn test_placeholders_and_dropping() {
        let thunks = vec![after(0, 1), after(0, 2), failing("c broke")];

        let collected = parallel(&thunks, &ParallelOptions::default().collect_errors())
            .await
            .unwrap();
        assert_eq!(collected, vec![Some(1), Some(2), None]);

        let dropped = parallel(&thunks, &ParallelOptions::default()).await.unwrap();
        assert_eq!(dropped, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_all_failed_is_aggregate_error() {
        let thunks = vec![failing("a"), failing("b")];
        let error = parallel(&thunks, &ParallelOptions::default().collect_errors())
            .await
            .unwrap_err();

        assert_eq!(error.message, "All 2 operations failed");
        assert_eq!(error.nested_errors("errors").len(), 2);
    }

    #[tokio::test]
    async fn test_all_failed_under_fail_fast_is_aggregate_error() {
        let thunks = vec![failing("a broke"), failing("b broke")];
        let error = parallel(&thunks, &ParallelOptions::default().fail_fast())
            .await
            .unwrap_err();

        assert_eq!(error.message, "All 2 operations failed");
        let errors = error.nested_errors("errors");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].message, "b broke");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_finishes_batch_and_skips_later_batches() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let counted = |ms: u64, fails: bool| -> Thunk<i32> {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            Operation::async_fallible(move |()| {
                let started = Arc::clone(&started);
                let finished = Arc::clone(&finished);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    if fails {
                        return Err(PipelineError::new("thunk", "b broke"));
                    }
                    sleep(Duration::from_millis(ms)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                }
            })
        };
        let thunks = vec![
            counted(50, false),
            counted(0, true),
            counted(0, false),
            counted(0, false),
        ];
        let options = ParallelOptions::default().max_concurrency(2).fail_fast();

        let error = parallel(&thunks, &options).await.unwrap_err();

        assert_eq!(error.message, "Operation 1 failed: b broke");
        assert_eq!(error.context_value("batch"), Some(&serde_json::json!(0)));
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_keeps_placeholders() {
        let failing_after = Operation::async_fallible(|()| async {
            sleep(Duration::from_millis(20)).await;
            Err::<i32, _>(PipelineError::new("thunk", "late failure"))
        });
        let thunks = vec![after(30, 1), failing_after, after(10, 3)];
        let options = ParallelOptions {
            preserve_order: false,
            ..ParallelOptions::default().collect_errors()
        };

        let result = parallel(&thunks, &options).await.unwrap();
        assert_eq!(result, vec![Some(3), None, Some(1)]);
    }

    #[tokio::test]
    async fn test_combiner_receives_context() {
        let thunks = vec![after(0, 4), failing("x"), after(0, 6)];
        let options = ParallelOptions::default().collect_errors();

        let total = parallel_with(&thunks, &options, |context, results| {
            assert_eq!(context.metadata()["thunks"], 3);
            assert_eq!(context.trace_entries().len(), 1);
            Ok(results.into_iter().flatten().sum::<i32>())
        })
        .await
        .unwrap();

        assert_eq!(total, 10);
    }
}
