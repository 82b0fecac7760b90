//! Extension traits for error handling

use super::types::{PipelineError, Result};
use std::fmt::Display;

/// Extension trait for lifting foreign results into pipeline results
pub trait ResultExt<T> {
    /// Tag the error with the operation that produced it
    fn context(self, operation: &str) -> Result<T>;

    /// Tag the error and prefix its message lazily
    fn with_context<F>(self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Display,
{
    fn context(self, operation: &str) -> Result<T> {
        self.map_err(|e| PipelineError::new(operation, e.to_string()))
    }

    fn with_context<F>(self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PipelineError::new(operation, format!("{}: {}", f(), e)))
    }
}
