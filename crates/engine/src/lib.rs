//! Result-typed pipeline engine.
//!
//! Every public operation returns [`kairo_core::Result`]; panics raised by
//! caller-supplied callbacks are caught at the nearest operation boundary
//! and reported as [`PipelineError`]s.
//!
//! ## Key Components
//!
//! - **`elementwise`**: `map`, `filter` and `reduce` over item sequences,
//!   sequentially or in concurrent batches.
//! - **`compose`**: lazy [`Pipeline`]s and eager [`chain`].
//! - **`branch`**: single-selection [`branch_route`] and multi-bucket
//!   [`partition_by`].
//! - **`parallel`**: bounded concurrent execution of thunks.
//! - **`validate`**: schema and rule-list validation gates.
//!
//! Concurrency is cooperative: concurrent items and thunks are polled on the
//! calling task and never spawned onto other threads.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kairo_engine::prelude::*;
//!
//! # async fn example() -> kairo_core::Result<()> {
//! let doubled = map(vec![1, 2, 3], &Operation::sync(|x: i32| x * 2), &MapOptions::default()).await?;
//! assert_eq!(doubled, vec![2, 4, 6]);
//! # Ok(())
//! # }
//! ```

pub mod branch;
pub mod compose;
pub mod elementwise;
pub mod parallel;
pub mod validate;

pub use branch::{
    branch_route, branches, partition_by, BranchKey, BranchOptions, Branches, PartitionOptions,
    Predicates,
};
pub use compose::{chain, compose, ComposeOptions, Pipeline};
pub use elementwise::{
    filter, map, reduce, reduce_with_checkpoints, Checkpoint, ExecutionMode, FilterErrorPolicy,
    FilterOptions, ItemErrorPolicy, MapOptions, ReduceOptions,
};
pub use kairo_core::{PipelineContext, PipelineError, Result};
pub use parallel::{parallel, parallel_with, ParallelOptions};
pub use validate::{
    validate, RuleFailure, RuleMessage, Schema, SchemaError, ValidateOptions, ValidationRule,
    Validator,
};

/// Everything needed to build and run pipelines
pub mod prelude {
    pub use crate::branch::*;
    pub use crate::compose::*;
    pub use crate::elementwise::*;
    pub use crate::parallel::*;
    pub use crate::validate::*;
    pub use kairo_config::EngineConfig;
    pub use kairo_core::{Operation, PipelineContext, PipelineError, Result, Thunk};
}
