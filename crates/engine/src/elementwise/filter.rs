use super::options::{FilterErrorPolicy, FilterOptions};
use super::{drive, item_failure};
use kairo_core::constants::OP_FILTER;
use kairo_core::{require_items, IntoItems, Operation, Result};
use kairo_utils::logging::recovered_failure;
use std::fmt::Debug;
use tracing::Instrument;

/// Keep the items for which `predicate` holds, preserving relative order
pub async fn filter<T>(
    input: impl IntoItems<T>,
    predicate: &Operation<T, bool>,
    options: &FilterOptions,
) -> Result<Vec<T>>
where
    T: Clone + Debug + Send + 'static,
{
    let items = require_items(OP_FILTER, input)?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let span = tracing::debug_span!("filter", items = items.len(), mode = ?options.mode);

    let mut kept = Vec::new();
    drive(
        items,
        options.mode,
        |item| predicate.invoke(item),
        |index, item, outcome| {
            match outcome {
                Ok(true) => kept.push(item),
                Ok(false) => {}
                Err(error) => match options.on_error {
                    FilterErrorPolicy::Abort => {
                        return Err(item_failure(OP_FILTER, index, &item, error))
                    }
                    FilterErrorPolicy::Exclude => {
                        recovered_failure(OP_FILTER, index, &error.message, "exclude")
                    }
                },
            }
            Ok(())
        },
    )
    .instrument(span)
    .await?;

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairo_core::PipelineError;

    fn is_even_strict() -> Operation<i32, bool> {
        Operation::fallible(|x: i32| {
            if x < 0 {
                Err(PipelineError::new("is_even", "negative input"))
            } else {
                Ok(x % 2 == 0)
            }
        })
    }

    #[tokio::test]
    async fn test_keeps_matching_in_order() {
        let result = filter(vec![4, 1, 2, 7, 8], &is_even_strict(), &FilterOptions::default())
            .await
            .unwrap();
        assert_eq!(result, vec![4, 2, 8]);
    }

    #[tokio::test]
    async fn test_failing_predicate_aborts_by_default() {
        let error = filter(vec![2, -1, 4], &is_even_strict(), &FilterOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error.operation, "filter");
        assert_eq!(error.context_value("index"), Some(&serde_json::json!(1)));
    }

    #[tokio::test]
    async fn test_exclude_drops_failing_items() {
        let options = FilterOptions::default().exclude_errors().concurrent(2);
        let result = filter(vec![2, -1, 4, -6, 5], &is_even_strict(), &options)
            .await
            .unwrap();
        assert_eq!(result, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_panicking_predicate_is_a_failure() {
        let predicate = Operation::sync(|x: i32| {
            assert!(x != 3, "three is not allowed");
            true
        });
        let options = FilterOptions::default().exclude_errors();
        let result = filter(vec![1, 3, 5], &predicate, &options).await.unwrap();
        assert_eq!(result, vec![1, 5]);
    }
}
