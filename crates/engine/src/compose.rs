//! Threading a single value through an ordered list of steps.
//!
//! [`compose`] builds a reusable [`Pipeline`] without running anything;
//! [`chain`] runs the steps immediately.

use kairo_core::constants::OP_COMPOSE;
use kairo_core::{Operation, PipelineContext, Result};
use kairo_utils::logging::operation_span;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::Instrument;

/// Options for [`compose`] and [`chain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Abort on the first failing step. When `false`, a failing step is
    /// logged and the value from before that step is carried forward.
    pub stop_on_error: bool,
    /// Record a snapshot of every intermediate value in error context
    pub capture_trace: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            capture_trace: false,
        }
    }
}

/// A reusable sequence of steps over values of type `T`
pub struct Pipeline<T> {
    steps: Arc<[Operation<T>]>,
    options: ComposeOptions,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            steps: Arc::clone(&self.steps),
            options: self.options,
        }
    }
}

impl<T> Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .field("options", &self.options)
            .finish()
    }
}

/// Build a pipeline. Nothing runs until the pipeline is invoked.
pub fn compose<T>(steps: Vec<Operation<T>>, options: ComposeOptions) -> Pipeline<T> {
    Pipeline {
        steps: steps.into(),
        options,
    }
}

/// Run `steps` against `data` immediately
pub async fn chain<T>(data: T, steps: Vec<Operation<T>>, options: ComposeOptions) -> Result<T>
where
    T: Clone + Debug + Send + 'static,
{
    compose(steps, options).run(data).await
}

impl<T> Pipeline<T> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn options(&self) -> ComposeOptions {
        self.options
    }

    fn step_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| step_name(step, index))
            .collect()
    }
}

impl<T> Pipeline<T>
where
    T: Clone + Debug + Send + 'static,
{
    /// Run the pipeline; an empty pipeline returns its input
    pub async fn run(&self, input: T) -> Result<T> {
        let (value, _, _) = self.execute(input, PipelineContext::new(), false).await?;
        Ok(value)
    }

    /// Run with an explicit context, returning it with one trace entry per step
    pub async fn run_traced(
        &self,
        input: T,
        context: PipelineContext,
    ) -> Result<(T, PipelineContext)> {
        let (value, context, _) = self.execute(input, context, false).await?;
        Ok((value, context))
    }

    /// Run and return the value produced by every step, in order
    pub async fn run_collect(&self, input: T) -> Result<Vec<T>> {
        let (_, _, collected) = self.execute(input, PipelineContext::new(), true).await?;
        Ok(collected)
    }

    /// Expose the pipeline as a single operation
    pub fn into_operation(self) -> Operation<T> {
        Operation::async_fallible(move |input: T| {
            let pipeline = self.clone();
            async move { pipeline.run(input).await }
        })
        .labeled(OP_COMPOSE)
    }

    async fn execute(
        &self,
        input: T,
        context: PipelineContext,
        collect: bool,
    ) -> Result<(T, PipelineContext, Vec<T>)> {
        let span = operation_span(OP_COMPOSE, context.operation_id());
        tracing::debug!(parent: &span, steps = self.steps.len(), "Starting pipeline");
        self.execute_steps(input, context, collect)
            .instrument(span)
            .await
    }

    async fn execute_steps(
        &self,
        input: T,
        mut context: PipelineContext,
        collect: bool,
    ) -> Result<(T, PipelineContext, Vec<T>)> {
        let ComposeOptions {
            stop_on_error,
            capture_trace,
        } = self.options;
        let mut current = input;
        let mut snapshots = Vec::new();
        let mut collected = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let name = step_name(step, index);
            let previous = (!stop_on_error).then(|| current.clone());

            match step.invoke(current).await {
                Ok(next) => current = next,
                Err(error) => match previous {
                    Some(previous) => {
                        tracing::warn!(
                            step = index,
                            step_name = %name,
                            error = %error,
                            "Step failed; continuing with previous value"
                        );
                        current = previous;
                    }
                    None => {
                        let mut error = error
                            .with_context("step", index)
                            .with_context("step_name", &name)
                            .with_context("trace", context.trace_entries());
                        if capture_trace {
                            error = error.with_context("intermediate_values", &snapshots);
                        }
                        return Err(error);
                    }
                },
            }

            if capture_trace {
                snapshots.push(format!("{current:?}"));
            }
            if collect {
                collected.push(current.clone());
            }
            context = context.trace(&name);
        }

        Ok((current, context, collected))
    }
}

impl<T> From<Pipeline<T>> for Operation<T>
where
    T: Clone + Debug + Send + 'static,
{
    fn from(pipeline: Pipeline<T>) -> Self {
        pipeline.into_operation()
    }
}

fn step_name<T>(step: &Operation<T>, index: usize) -> String {
    step.label()
        .map(str::to_string)
        .unwrap_or_else(|| format!("step-{index}"))
}
