//! Typed, traced composition for heterogeneous step chains.
//!
//! `compose`/`chain` in the engine thread one value of a single type through a
//! list of operations. When every step changes the type, `Pipe` gives the same
//! threading with full static typing, recording each named step in a
//! [`PipelineContext`].

use crate::context::PipelineContext;
use crate::errors::Result;
use std::fmt::Debug;
use std::future::Future;

/// A value travelling through a chain of steps, together with its trace
pub struct Pipe<T> {
    value: T,
    context: PipelineContext,
}

impl<T> Pipe<T> {
    /// Start a pipe with a fresh context
    pub fn new(value: T) -> Self {
        Self::with_context(value, PipelineContext::new())
    }

    /// Start a pipe continuing an existing context
    pub fn with_context(value: T, context: PipelineContext) -> Self {
        Self { value, context }
    }

    /// Apply an untraced function
    pub fn pipe<F, U>(self, f: F) -> Pipe<U>
    where
        F: FnOnce(T) -> U,
    {
        Pipe {
            value: f(self.value),
            context: self.context,
        }
    }

    /// Apply a named function and record it in the trace
    pub fn step<F, U>(self, name: &str, f: F) -> Pipe<U>
    where
        F: FnOnce(T) -> U,
    {
        let value = f(self.value);
        Pipe {
            value,
            context: self.context.trace(name),
        }
    }

    /// Apply a named fallible function.
    ///
    /// On failure the error gains the trace accumulated so far under `trace`.
    pub fn try_step<F, U>(self, name: &str, f: F) -> Result<Pipe<U>>
    where
        F: FnOnce(T) -> Result<U>,
    {
        let context = self.context;
        match f(self.value) {
            Ok(value) => Ok(Pipe {
                value,
                context: context.trace(name),
            }),
            Err(error) => Err(error
                .with_context("step", name)
                .with_context("trace", context.trace_entries())),
        }
    }

    /// Apply a named async function
    pub async fn step_async<F, Fut, U>(self, name: &str, f: F) -> Pipe<U>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = U>,
    {
        let value = f(self.value).await;
        Pipe {
            value,
            context: self.context.trace(name),
        }
    }

    /// Apply a named fallible async function
    pub async fn try_step_async<F, Fut, U>(self, name: &str, f: F) -> Result<Pipe<U>>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<U>>,
    {
        let context = self.context;
        match f(self.value).await {
            Ok(value) => Ok(Pipe {
                value,
                context: context.trace(name),
            }),
            Err(error) => Err(error
                .with_context("step", name)
                .with_context("trace", context.trace_entries())),
        }
    }

    /// Apply a function only if condition is true
    pub fn pipe_if<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(T) -> T,
    {
        if condition {
            self.pipe(f)
        } else {
            self
        }
    }

    /// Apply a side effect function without changing the value
    pub fn tap<F>(self, f: F) -> Self
    where
        F: FnOnce(&T),
    {
        f(&self.value);
        self
    }

    pub fn inner(&self) -> &T {
        &self.value
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Extract the wrapped value
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Extract the value and its trace
    pub fn into_parts(self) -> (T, PipelineContext) {
        (self.value, self.context)
    }
}

impl<T: Debug> Debug for Pipe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("value", &self.value)
            .field("trace", &self.context.trace_entries())
            .finish()
    }
}

impl<T> From<T> for Pipe<T> {
    fn from(value: T) -> Self {
        Pipe::new(value)
    }
}

/// Function composition operators
pub mod operators {
    /// Curry a two-argument function
    pub fn curry<A, B, C, F>(f: F) -> impl Fn(A) -> Box<dyn Fn(B) -> C + Send + Sync>
    where
        F: Fn(A, B) -> C + Clone + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        B: 'static,
        C: 'static,
    {
        move |a| {
            let f = f.clone();
            let curried: Box<dyn Fn(B) -> C + Send + Sync> = Box::new(move |b| f(a.clone(), b));
            curried
        }
    }

    /// Curry a three-argument function
    #[allow(clippy::type_complexity)]
    pub fn curry3<A, B, C, D, F>(
        f: F,
    ) -> impl Fn(A) -> Box<dyn Fn(B) -> Box<dyn Fn(C) -> D + Send + Sync> + Send + Sync>
    where
        F: Fn(A, B, C) -> D + Clone + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
        C: 'static,
        D: 'static,
    {
        move |a| {
            let f = f.clone();
            let curried: Box<dyn Fn(B) -> Box<dyn Fn(C) -> D + Send + Sync> + Send + Sync> =
                Box::new(move |b: B| -> Box<dyn Fn(C) -> D + Send + Sync> {
                    let f = f.clone();
                    let a = a.clone();
                    Box::new(move |c| f(a.clone(), b.clone(), c))
                });
            curried
        }
    }

    /// Fix the first argument of a two-argument function
    pub fn partial<A, B, C, F>(f: F, a: A) -> impl Fn(B) -> C
    where
        F: Fn(A, B) -> C,
        A: Clone,
    {
        move |b| f(a.clone(), b)
    }

    /// Fix the first two arguments of a three-argument function
    pub fn partial2<A, B, C, D, F>(f: F, a: A, b: B) -> impl Fn(C) -> D
    where
        F: Fn(A, B, C) -> D,
        A: Clone,
        B: Clone,
    {
        move |c| f(a.clone(), b.clone(), c)
    }
}

/// Traced pipeline macro: `pipeline!(value, "step" => f, ...)`
#[macro_export]
macro_rules! pipeline {
    ($value:expr) => {
        $crate::functional::composition::Pipe::new($value)
    };
    ($value:expr, $($name:expr => $func:expr),+ $(,)?) => {{
        let result = $crate::functional::composition::Pipe::new($value);
        $(
            let result = result.step($name, $func);
        )+
        result
    }};
}

/// Traced pipeline macro for fallible steps; evaluates to `Result<Pipe<_>>`
#[macro_export]
macro_rules! try_pipeline {
    ($value:expr) => {
        Ok::<_, $crate::errors::PipelineError>($crate::functional::composition::Pipe::new($value))
    };
    ($value:expr, $($name:expr => $func:expr),+ $(,)?) => {
        (|| {
            let result = $crate::functional::composition::Pipe::new($value);
            $(
                let result = result.try_step($name, $func)?;
            )+
            Ok::<_, $crate::errors::PipelineError>(result)
        })()
    };
}
