//! Panic capture at operation boundaries.
//!
//! Caller-supplied callbacks may panic. Nothing in this workspace lets that
//! panic cross a public boundary: it is caught here and converted into a
//! [`PipelineError`] tagged with the operation that was running.

use crate::errors::{PipelineError, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

/// Run a closure, converting a panic into an error
pub fn capture<F, R>(operation: &str, f: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| PipelineError::from_panic(operation, payload))
}

/// Await a future, converting a panic during any poll into an error
pub async fn capture_async<Fut>(operation: &str, future: Fut) -> Result<Fut::Output>
where
    Fut: Future,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| PipelineError::from_panic(operation, payload))
}
