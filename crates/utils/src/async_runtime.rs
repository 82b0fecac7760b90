use kairo_core::unwind::capture_async;
use kairo_core::{PipelineError, Result};
use std::future::Future;
use tokio::runtime::{Builder, Runtime};

const OP_RUNTIME: &str = "runtime";

/// Lazily created current-thread runtime for driving pipelines from sync code
pub struct AsyncRuntime {
    runtime: Option<Runtime>,
}

impl AsyncRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self { runtime: None }
    }

    fn get_or_create_runtime(&mut self) -> Result<&Runtime> {
        if self.runtime.is_none() {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| {
                    PipelineError::new(OP_RUNTIME, format!("failed to create tokio runtime: {e}"))
                })?;
            self.runtime = Some(runtime);
        }

        self.runtime.as_ref().ok_or_else(|| {
            PipelineError::new(OP_RUNTIME, "runtime unexpectedly missing after initialization")
        })
    }

    /// Drive a pipeline future to completion.
    ///
    /// A panic while polling the future is returned as an error.
    pub fn block_on<F, T>(&mut self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if Self::is_in_async_context() {
            return Err(nested_runtime_error());
        }
        let runtime = self.get_or_create_runtime()?;
        runtime.block_on(capture_async(OP_RUNTIME, future))?
    }

    /// Check if we're already in an async context
    #[must_use]
    pub fn is_in_async_context() -> bool {
        tokio::runtime::Handle::try_current().is_ok()
    }
}

impl Default for AsyncRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a pipeline future from synchronous code.
///
/// Refuses to nest inside an existing runtime instead of blocking it.
pub fn run_async<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    AsyncRuntime::new().block_on(future)
}

fn nested_runtime_error() -> PipelineError {
    PipelineError::new(
        OP_RUNTIME,
        "cannot use block_on from within an async runtime",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_async_from_sync_code() -> Result<()> {
        let result = run_async(async {
            tokio::task::yield_now().await;
            Ok("hello".to_string())
        })?;
        assert_eq!(result, "hello");
        Ok(())
    }

    #[test]
    fn test_runtime_is_reused() -> Result<()> {
        let mut runtime = AsyncRuntime::new();
        assert_eq!(runtime.block_on(async { Ok(1) })?, 1);
        assert_eq!(runtime.block_on(async { Ok(2) })?, 2);
        Ok(())
    }

    #[test]
    fn test_panicking_future_is_an_error() {
        let fail = true;
        let error = run_async(async move {
            tokio::task::yield_now().await;
            assert!(!fail, "pipeline blew up");
            Ok(0)
        })
        .unwrap_err();

        assert_eq!(error.operation, "runtime");
        assert_eq!(error.message, "pipeline blew up");

        // the runtime is still usable afterwards
        assert_eq!(run_async(async { Ok(3) }).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_nested_runtime_is_refused() {
        assert!(AsyncRuntime::is_in_async_context());
        let result = run_async(async { Ok("should fail".to_string()) });
        let error = result.unwrap_err();
        assert_eq!(error.operation, "runtime");
        assert!(error.message.contains("async runtime"));
    }
}
