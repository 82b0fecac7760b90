//! Core primitives for the kairo pipeline engine.
//!
//! Every public operation in the workspace returns a [`Result`] whose error
//! side is the single [`PipelineError`] type. This crate defines that error,
//! the immutable [`PipelineContext`] execution trace, the tagged
//! [`Operation`] wrapper that lets sync, async and fallible callables be used
//! interchangeably, and the input shapes accepted by sequence operations.
//!
//! ## Key Components
//!
//! - **`errors`**: `PipelineError`, the `Result` alias and `ResultExt`.
//! - **`context`**: copy-on-trace execution context.
//! - **`operation`**: the four operation shapes and uniform invocation.
//! - **`unwind`**: panic capture at operation boundaries.
//! - **`items`**: conversion of caller input into item sequences.
//! - **`functional`**: typed composition helpers (`Pipe`, `curry`, `partial`).

pub mod constants;
pub mod context;
pub mod errors;
pub mod functional;
pub mod items;
pub mod operation;
pub mod unwind;

pub use self::{
    context::PipelineContext,
    errors::{PipelineError, Result, ResultExt},
    items::{require_items, InputShapeError, IntoItems},
    operation::{Operation, OperationKind, Thunk},
};
