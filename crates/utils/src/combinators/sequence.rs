//! Ordered execution of thunks

use kairo_core::constants::OP_SEQUENCE;
use kairo_core::{PipelineError, Result, Thunk};

/// Run thunks one after another, stopping at the first failure.
///
/// The error carries the failing thunk's `index` and the original `cause`.
pub async fn sequence<T>(thunks: &[Thunk<T>]) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    let mut values = Vec::with_capacity(thunks.len());
    for (index, thunk) in thunks.iter().enumerate() {
        match thunk.invoke(()).await {
            Ok(value) => values.push(value),
            Err(error) => {
                return Err(PipelineError::new(
                    OP_SEQUENCE,
                    format!("step {index} failed: {}", error.message),
                )
                .with_context("index", index)
                .with_context("completed", values.len())
                .with_cause(error));
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairo_core::Operation;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_in_order() {
        let thunks = vec![
            Operation::sync(|()| 1),
            Operation::asynchronous(|()| async { 2 }),
            Operation::fallible(|()| Ok(3)),
        ];
        assert_eq!(sequence(&thunks).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let later = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later);
        let thunks: Vec<Thunk<i32>> = vec![
            Operation::sync(|()| 1),
            Operation::fallible(|()| Err(PipelineError::new("load", "missing file"))),
            Operation::sync(move |()| {
                counter.fetch_add(1, Ordering::SeqCst);
                3
            }),
        ];

        let error = sequence(&thunks).await.unwrap_err();
        assert_eq!(error.message, "step 1 failed: missing file");
        assert_eq!(error.context_value("index"), Some(&serde_json::json!(1)));
        assert_eq!(error.cause().unwrap().operation, "load");
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }
}
