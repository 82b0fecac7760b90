//! Conditional execution and failure trapping

use futures::future::BoxFuture;
use futures::FutureExt;
use kairo_core::constants::{OP_GUARD, OP_TRAP};
use kairo_core::unwind::{capture, capture_async};
use kairo_core::{Operation, PipelineError, Result};
use std::future::Future;
use std::sync::Arc;

/// Apply `op` only when the predicate holds; otherwise pass the value through
pub fn when<T, P>(predicate: P, op: Operation<T>) -> Operation<T>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    let label = format!("when({})", op.name());
    Operation::async_fallible(move |value: T| {
        let op = op.clone();
        let apply = predicate(&value);
        async move {
            if apply {
                op.invoke(value).await
            } else {
                Ok(value)
            }
        }
    })
    .labeled(label)
}

/// Apply `op` only when the predicate does not hold
pub fn unless<T, P>(predicate: P, op: Operation<T>) -> Operation<T>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    when(move |value: &T| !predicate(value), op)
}

/// Admit values satisfying the predicate.
///
/// Rejected values produce an error whose message is exactly `message`.
pub fn guard<T, P>(predicate: P, message: impl Into<String>) -> Operation<T>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    let message: Arc<str> = Arc::from(message.into());
    Operation::fallible(move |value: T| {
        if predicate(&value) {
            Ok(value)
        } else {
            Err(PipelineError::new(OP_GUARD, message.as_ref()))
        }
    })
    .labeled(OP_GUARD)
}

/// Turn a function that may panic into one returning `Result`
pub fn trap<I, O, F>(f: F) -> impl Fn(I) -> Result<O> + Send + Sync
where
    F: Fn(I) -> O + Send + Sync,
{
    move |input| capture(OP_TRAP, || f(input))
}

/// Like [`trap`], for functions that already return `Result`
pub fn trap_result<I, O, F>(f: F) -> impl Fn(I) -> Result<O> + Send + Sync
where
    F: Fn(I) -> Result<O> + Send + Sync,
{
    move |input| capture(OP_TRAP, || f(input))?
}

/// Like [`trap`], for async functions
pub fn trap_async<I, O, F, Fut>(f: F) -> impl Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync
where
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    move |input| match capture(OP_TRAP, || f(input)) {
        Ok(future) => capture_async(OP_TRAP, future).boxed(),
        Err(error) => futures::future::ready(Err(error)).boxed(),
    }
}

/// Replace a failure of `op` with a value computed from the error
pub fn recover<I, O, H>(op: Operation<I, O>, handler: H) -> Operation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    H: Fn(PipelineError) -> O + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let label = format!("recover({})", op.name());
    Operation::async_fallible(move |input: I| {
        let op = op.clone();
        let handler = Arc::clone(&handler);
        async move {
            match op.invoke(input).await {
                Ok(value) => Ok(value),
                Err(error) => {
                    tracing::debug!(operation = %error.operation, error = %error, "recovering from failure");
                    capture(OP_TRAP, || handler(error))
                }
            }
        }
    })
    .labeled(label)
}

/// Run a side effect on the value and pass it through unchanged
pub fn tap<T, F>(f: F) -> Operation<T>
where
    T: Send + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    Operation::sync(move |value: T| {
        f(&value);
        value
    })
    .labeled("tap")
}
