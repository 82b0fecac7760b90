use super::options::{Checkpoint, ReduceOptions};
use kairo_core::constants::OP_REDUCE;
use kairo_core::{require_items, IntoItems, Operation, PipelineError, Result};
use kairo_utils::logging::recovered_failure;
use std::fmt::Debug;
use tracing::Instrument;

/// Fold items into an accumulator with `reducer(accumulator, item)`.
///
/// Always sequential. Empty input returns `initial` unchanged.
pub async fn reduce<T, A>(
    input: impl IntoItems<T>,
    reducer: &Operation<(A, T), A>,
    initial: A,
    options: &ReduceOptions,
) -> Result<A>
where
    T: Debug + Send + 'static,
    A: Clone + Debug + Send + 'static,
{
    reduce_with_checkpoints(input, reducer, initial, options)
        .await
        .map(|(value, _)| value)
}

/// Like [`reduce`], also returning the checkpoints captured on the way.
///
/// Checkpoints are diagnostic snapshots; they are not a resume mechanism.
pub async fn reduce_with_checkpoints<T, A>(
    input: impl IntoItems<T>,
    reducer: &Operation<(A, T), A>,
    initial: A,
    options: &ReduceOptions,
) -> Result<(A, Vec<Checkpoint>)>
where
    T: Debug + Send + 'static,
    A: Clone + Debug + Send + 'static,
{
    let items = require_items(OP_REDUCE, input)?;
    if items.is_empty() {
        return Ok((initial, Vec::new()));
    }
    if options.mode.is_concurrent() {
        tracing::debug!("reduce is sequential; ignoring concurrent execution mode");
    }

    let span = tracing::debug_span!("reduce", items = items.len());
    fold(items, reducer, initial, options).instrument(span).await
}

async fn fold<T, A>(
    items: Vec<T>,
    reducer: &Operation<(A, T), A>,
    initial: A,
    options: &ReduceOptions,
) -> Result<(A, Vec<Checkpoint>)>
where
    T: Debug + Send + 'static,
    A: Clone + Debug + Send + 'static,
{
    let interval = options.checkpoint_interval.filter(|n| *n > 0);
    let mut checkpoints = Vec::new();
    let mut accumulator = initial;

    for (index, item) in items.into_iter().enumerate() {
        let item_debug = format!("{item:?}");
        match reducer.invoke((accumulator.clone(), item)).await {
            Ok(next) => accumulator = next,
            Err(error) if options.continue_on_error => {
                recovered_failure(OP_REDUCE, index, &error.message, "continue");
            }
            Err(error) => {
                return Err(PipelineError::new(
                    OP_REDUCE,
                    format!("Failed at index {index}: {}", error.message),
                )
                .with_context("index", index)
                .with_context("item", item_debug)
                .with_debug("accumulator", &accumulator)
                .with_context("checkpoints", &checkpoints)
                .with_cause(error));
            }
        }

        if let Some(every) = interval {
            if (index + 1) % every == 0 {
                checkpoints.push(Checkpoint {
                    index,
                    value: format!("{accumulator:?}"),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                });
            }
        }
    }

    Ok((accumulator, checkpoints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elementwise::ExecutionMode;
    use serde_json::json;

    fn sum() -> Operation<(i64, i64), i64> {
        Operation::sync(|(acc, x): (i64, i64)| acc + x)
    }

    fn checked_sum() -> Operation<(i64, i64), i64> {
        Operation::fallible(|(acc, x): (i64, i64)| {
            if x < 0 {
                Err(PipelineError::new("checked_sum", "negative item"))
            } else {
                Ok(acc + x)
            }
        })
    }

    #[tokio::test]
    async fn test_sum() {
        let total = reduce(vec![1, 2, 3, 4, 5], &sum(), 0, &ReduceOptions::default())
            .await
            .unwrap();
        assert_eq!(total, 15);
    }

    #[tokio::test]
    async fn test_empty_returns_initial() {
        let total = reduce(Vec::<i64>::new(), &sum(), 42, &ReduceOptions::default())
            .await
            .unwrap();
        assert_eq!(total, 42);
    }

    #[tokio::test]
    async fn test_concurrent_mode_is_still_ordered() {
        let concat = Operation::asynchronous(|(acc, s): (String, &'static str)| async move {
            format!("{acc}{s}")
        });
        let options = ReduceOptions {
            mode: ExecutionMode::concurrent(),
            ..ReduceOptions::default()
        };

        let joined = reduce(vec!["a", "b", "c"], &concat, String::new(), &options)
            .await
            .unwrap();
        assert_eq!(joined, "abc");
    }

    #[tokio::test]
    async fn test_failure_carries_accumulator_and_checkpoints() {
        let options = ReduceOptions::default().checkpoint_every(2);
        let error = reduce(vec![1, 2, 3, 4, -5, 6], &checked_sum(), 0, &options)
            .await
            .unwrap_err();

        assert_eq!(error.operation, "reduce");
        assert_eq!(error.context_value("index"), Some(&json!(4)));
        assert_eq!(error.context_value("accumulator"), Some(&json!("10")));

        let checkpoints: Vec<Checkpoint> =
            serde_json::from_value(error.context_value("checkpoints").unwrap().clone()).unwrap();
        let indices: Vec<_> = checkpoints.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(checkpoints[1].value, "10");
    }

    #[tokio::test]
    async fn test_continue_on_error_keeps_accumulator() {
        let options = ReduceOptions::default().continue_on_error();
        let total = reduce(vec![1, -2, 3], &checked_sum(), 0, &options)
            .await
            .unwrap();
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn test_reduce_with_checkpoints() {
        let options = ReduceOptions::default().checkpoint_every(3);
        let (total, checkpoints) =
            reduce_with_checkpoints((1..=7).collect::<Vec<i64>>(), &sum(), 0, &options)
                .await
                .unwrap();
        assert_eq!(total, 28);
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].value, "6");
    }
}
