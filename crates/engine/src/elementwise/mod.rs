//! Per-item operations over sequences.
//!
//! Inputs are accepted through [`IntoItems`](kairo_core::IntoItems), so a
//! missing input and an input that is not a sequence fail with different
//! messages. Empty input always succeeds without invoking the callback.

mod filter;
mod map;
mod options;
mod reduce;

pub use filter::filter;
pub use map::map;
pub use options::{
    Checkpoint, ExecutionMode, FallbackFn, FilterErrorPolicy, FilterOptions, ItemErrorPolicy,
    MapOptions, ReduceOptions,
};
pub use reduce::{reduce, reduce_with_checkpoints};

use futures::future::join_all;
use kairo_core::{PipelineError, Result};
use std::fmt::Debug;
use std::future::Future;

/// Feed items through `invoke` according to `mode`, handing each outcome to
/// `settle` in input order.
///
/// `settle` returning `Err` stops processing; in concurrent mode the rest of
/// the current batch has already run but later batches are never started.
pub(crate) async fn drive<T, R, F, Fut, S>(
    items: Vec<T>,
    mode: ExecutionMode,
    mut invoke: F,
    mut settle: S,
) -> Result<()>
where
    T: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R>>,
    S: FnMut(usize, T, Result<R>) -> Result<()>,
{
    match mode {
        ExecutionMode::Sequential => {
            for (index, item) in items.into_iter().enumerate() {
                let outcome = invoke(item.clone()).await;
                settle(index, item, outcome)?;
            }
        }
        ExecutionMode::Concurrent { batch_size } => {
            let batch_size = batch_size.max(1);
            let mut index = 0;
            let mut remaining = items.into_iter().peekable();

            while remaining.peek().is_some() {
                let batch: Vec<T> = remaining.by_ref().take(batch_size).collect();
                tracing::debug!(start = index, size = batch.len(), "Starting batch");

                let outcomes = join_all(batch.iter().cloned().map(&mut invoke)).await;
                for (item, outcome) in batch.into_iter().zip(outcomes) {
                    settle(index, item, outcome)?;
                    index += 1;
                }
            }
        }
    }
    Ok(())
}

/// Error for an item whose callback failed and was not recovered
pub(crate) fn item_failure(
    operation: &str,
    index: usize,
    item: &impl Debug,
    cause: PipelineError,
) -> PipelineError {
    PipelineError::new(
        operation,
        format!("Failed at index {index}: {}", cause.message),
    )
    .with_context("index", index)
    .with_debug("item", item)
    .with_cause(cause)
}
