//! Option types for elementwise operations

use kairo_config::EngineConfig;
use kairo_core::constants::DEFAULT_BATCH_SIZE;
use kairo_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How items are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One item at a time, in order
    #[default]
    Sequential,
    /// Batches run one after another; items within a batch run concurrently
    Concurrent { batch_size: usize },
}

impl ExecutionMode {
    /// Concurrent mode with the default batch size
    pub fn concurrent() -> Self {
        Self::Concurrent {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Concurrent mode sized from configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::Concurrent {
            batch_size: config.batch_size,
        }
    }

    pub fn is_concurrent(&self) -> bool {
        matches!(self, Self::Concurrent { .. })
    }
}

/// Computes a replacement value from `(error, item, index)`
pub type FallbackFn<T, U> = dyn Fn(&PipelineError, &T, usize) -> U + Send + Sync;

/// What `map` does with an item whose transform failed
pub enum ItemErrorPolicy<T, U> {
    /// Stop and return the failure
    Abort,
    /// Use a fixed value in the failed item's place
    Substitute(U),
    /// Compute a value in the failed item's place
    Fallback(Arc<FallbackFn<T, U>>),
    /// Leave the failed item out of the output
    Skip,
}

impl<T, U: Clone> Clone for ItemErrorPolicy<T, U> {
    fn clone(&self) -> Self {
        match self {
            Self::Abort => Self::Abort,
            Self::Substitute(value) => Self::Substitute(value.clone()),
            Self::Fallback(f) => Self::Fallback(Arc::clone(f)),
            Self::Skip => Self::Skip,
        }
    }
}

impl<T, U> fmt::Debug for ItemErrorPolicy<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "Abort"),
            Self::Substitute(_) => write!(f, "Substitute(..)"),
            Self::Fallback(_) => write!(f, "Fallback(<fn>)"),
            Self::Skip => write!(f, "Skip"),
        }
    }
}

impl<T, U> ItemErrorPolicy<T, U> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Substitute(_) => "substitute",
            Self::Fallback(_) => "fallback",
            Self::Skip => "skip",
        }
    }
}

/// Options for [`map`](super::map)
#[derive(Debug, Clone)]
pub struct MapOptions<T, U> {
    pub mode: ExecutionMode,
    pub on_error: ItemErrorPolicy<T, U>,
}

impl<T, U> Default for MapOptions<T, U> {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            on_error: ItemErrorPolicy::Abort,
        }
    }
}

impl<T, U> MapOptions<T, U> {
    /// Concurrent batches sized from configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            mode: ExecutionMode::from_config(config),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn concurrent(mut self, batch_size: usize) -> Self {
        self.mode = ExecutionMode::Concurrent { batch_size };
        self
    }

    /// Substitute `value` for failed items and keep going
    #[must_use]
    pub fn substitute(mut self, value: U) -> Self {
        self.on_error = ItemErrorPolicy::Substitute(value);
        self
    }

    /// Compute a substitute for failed items and keep going
    #[must_use]
    pub fn fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineError, &T, usize) -> U + Send + Sync + 'static,
    {
        self.on_error = ItemErrorPolicy::Fallback(Arc::new(f));
        self
    }

    /// Drop failed items from the output and keep going
    #[must_use]
    pub fn skip_errors(mut self) -> Self {
        self.on_error = ItemErrorPolicy::Skip;
        self
    }
}

/// What `filter` does with an item whose predicate failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterErrorPolicy {
    #[default]
    Abort,
    /// Treat the item as rejected and keep going
    Exclude,
}

/// Options for [`filter`](super::filter)
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOptions {
    pub mode: ExecutionMode,
    pub on_error: FilterErrorPolicy,
}

impl FilterOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            mode: ExecutionMode::from_config(config),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn concurrent(mut self, batch_size: usize) -> Self {
        self.mode = ExecutionMode::Concurrent { batch_size };
        self
    }

    #[must_use]
    pub fn exclude_errors(mut self) -> Self {
        self.on_error = FilterErrorPolicy::Exclude;
        self
    }
}

/// Options for [`reduce`](super::reduce).
///
/// Reduction is always sequential; a concurrent `mode` is accepted and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReduceOptions {
    pub mode: ExecutionMode,
    /// Skip items whose reducer call failed, keeping the accumulator
    pub continue_on_error: bool,
    /// Snapshot the accumulator after every N items
    pub checkpoint_interval: Option<usize>,
}

impl ReduceOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            checkpoint_interval: config.checkpoint_interval,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    #[must_use]
    pub fn checkpoint_every(mut self, interval: usize) -> Self {
        self.checkpoint_interval = Some(interval);
        self
    }
}

/// Diagnostic snapshot of a reduction's accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Index of the last item folded into `value`
    pub index: usize,
    /// Debug rendering of the accumulator
    pub value: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}
