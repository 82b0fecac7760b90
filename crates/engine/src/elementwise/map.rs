use super::options::{ItemErrorPolicy, MapOptions};
use super::{drive, item_failure};
use kairo_core::constants::OP_MAP;
use kairo_core::unwind::capture;
use kairo_core::{require_items, IntoItems, Operation, PipelineError, Result};
use kairo_utils::logging::recovered_failure;
use std::fmt::Debug;
use tracing::Instrument;

/// Apply `transform` to every item.
///
/// Output order always matches input order. The output is shorter than the
/// input only under [`ItemErrorPolicy::Skip`].
pub async fn map<T, U>(
    input: impl IntoItems<T>,
    transform: &Operation<T, U>,
    options: &MapOptions<T, U>,
) -> Result<Vec<U>>
where
    T: Clone + Debug + Send + 'static,
    U: Clone + Send + 'static,
{
    let items = require_items(OP_MAP, input)?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let span = tracing::debug_span!(
        "map",
        items = items.len(),
        mode = ?options.mode,
        on_error = options.on_error.name()
    );

    let mut output = Vec::with_capacity(items.len());
    drive(
        items,
        options.mode,
        |item| transform.invoke(item),
        |index, item, outcome| {
            if let Some(value) = settle(index, &item, outcome, &options.on_error)? {
                output.push(value);
            }
            Ok(())
        },
    )
    .instrument(span)
    .await?;

    Ok(output)
}

fn settle<T, U>(
    index: usize,
    item: &T,
    outcome: Result<U>,
    policy: &ItemErrorPolicy<T, U>,
) -> Result<Option<U>>
where
    T: Debug,
    U: Clone,
{
    let error = match outcome {
        Ok(value) => return Ok(Some(value)),
        Err(error) => error,
    };

    if !matches!(policy, ItemErrorPolicy::Abort) {
        recovered_failure(OP_MAP, index, &error.message, policy.name());
    }

    match policy {
        ItemErrorPolicy::Abort => Err(item_failure(OP_MAP, index, item, error)),
        ItemErrorPolicy::Substitute(value) => Ok(Some(value.clone())),
        ItemErrorPolicy::Fallback(fallback) => capture(OP_MAP, || fallback(&error, item, index))
            .map(Some)
            .map_err(|panicked| fallback_failed(index, item, error, panicked)),
        ItemErrorPolicy::Skip => Ok(None),
    }
}

fn fallback_failed<T: Debug>(
    index: usize,
    item: &T,
    original: PipelineError,
    panicked: PipelineError,
) -> PipelineError {
    item_failure(OP_MAP, index, item, original)
        .with_context("fallback_error", panicked.message)
}
