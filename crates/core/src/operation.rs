//! Explicitly tagged operations.
//!
//! Callers declare up front which of the four shapes an operation has, so
//! nothing downstream ever has to guess whether a callable is asynchronous or
//! returns a `Result`. [`Operation::invoke`] is the single uniform entry
//! point: it awaits when needed, flattens fallible results and converts panics
//! into [`PipelineError`]s.

use crate::constants::UNLABELED_OPERATION;
use crate::errors::Result;
use crate::unwind::{capture, capture_async};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type SyncFn<I, O> = dyn Fn(I) -> O + Send + Sync;
type AsyncFn<I, O> = dyn Fn(I) -> BoxFuture<'static, O> + Send + Sync;

/// The four accepted operation shapes
pub enum OperationKind<I, O> {
    /// `I -> O`
    Sync(Arc<SyncFn<I, O>>),
    /// `I -> future of O`
    Async(Arc<AsyncFn<I, O>>),
    /// `I -> Result<O>`
    Fallible(Arc<SyncFn<I, Result<O>>>),
    /// `I -> future of Result<O>`
    AsyncFallible(Arc<AsyncFn<I, Result<O>>>),
}

impl<I, O> Clone for OperationKind<I, O> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(f) => Self::Sync(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
            Self::Fallible(f) => Self::Fallible(Arc::clone(f)),
            Self::AsyncFallible(f) => Self::AsyncFallible(Arc::clone(f)),
        }
    }
}

/// A unary step usable by every engine construct.
///
/// Cloning is cheap: the callable is shared behind an `Arc`.
pub struct Operation<I, O = I> {
    label: Option<Arc<str>>,
    kind: OperationKind<I, O>,
}

/// A zero-argument operation
pub type Thunk<T> = Operation<(), T>;

impl<I, O> Clone for Operation<I, O> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl<I, O> fmt::Debug for Operation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("label", &self.label())
            .field("shape", &self.shape())
            .finish()
    }
}

impl<I, O> Operation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Wrap a plain function
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        Self::from_kind(OperationKind::Sync(Arc::new(f)))
    }

    /// Wrap a function returning a future
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        Self::from_kind(OperationKind::Async(Arc::new(move |input: I| f(input).boxed())))
    }

    /// Wrap a function returning a `Result`
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
    {
        Self::from_kind(OperationKind::Fallible(Arc::new(f)))
    }

    /// Wrap a function returning a future of a `Result`
    pub fn async_fallible<F, Fut>(f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        Self::from_kind(OperationKind::AsyncFallible(Arc::new(move |input: I| {
            f(input).boxed()
        })))
    }

    /// Invoke the operation.
    ///
    /// Never panics: a panic inside the wrapped callable, or inside the future
    /// it returns, is reported as an `Err` tagged with this operation's label.
    pub async fn invoke(&self, input: I) -> Result<O> {
        let name = self.name();
        match &self.kind {
            OperationKind::Sync(f) => capture(name, || f(input)),
            OperationKind::Fallible(f) => capture(name, || f(input))?,
            OperationKind::Async(f) => {
                let future = capture(name, || f(input))?;
                capture_async(name, future).await
            }
            OperationKind::AsyncFallible(f) => {
                let future = capture(name, || f(input))?;
                capture_async(name, future).await?
            }
        }
    }
}

impl<I, O> Operation<I, O> {
    fn from_kind(kind: OperationKind<I, O>) -> Self {
        Self { label: None, kind }
    }

    /// Attach a label used in traces and error context
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(Arc::from(label.into()));
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The label, or a generic placeholder when none was given
    pub fn name(&self) -> &str {
        self.label().unwrap_or(UNLABELED_OPERATION)
    }

    pub fn kind(&self) -> &OperationKind<I, O> {
        &self.kind
    }

    pub fn is_async(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::Async(_) | OperationKind::AsyncFallible(_)
        )
    }

    pub fn is_fallible(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::Fallible(_) | OperationKind::AsyncFallible(_)
        )
    }

    fn shape(&self) -> &'static str {
        match self.kind {
            OperationKind::Sync(_) => "sync",
            OperationKind::Async(_) => "async",
            OperationKind::Fallible(_) => "fallible",
            OperationKind::AsyncFallible(_) => "async_fallible",
        }
    }
}
