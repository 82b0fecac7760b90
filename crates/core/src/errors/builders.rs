//! Builder methods for creating errors with context

use super::types::PipelineError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt::Debug;

impl PipelineError {
    /// Create an error tagged with the failing operation
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            context: Map::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an error that wraps an underlying cause
    #[must_use]
    pub fn wrap(
        operation: impl Into<String>,
        message: impl Into<String>,
        cause: PipelineError,
    ) -> Self {
        Self::new(operation, message).with_cause(cause)
    }

    /// Create an error from a panic payload caught at an operation boundary
    #[must_use]
    pub fn from_panic(operation: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        Self::new(operation, message).with_context("panicked", true)
    }

    /// Attach a serializable value to the diagnostic context.
    ///
    /// Values that fail to serialize are recorded as a descriptive string so
    /// that building an error can never itself fail.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| Value::String(format!("<unserializable: {e}>")));
        self.context.insert(key.into(), value);
        self
    }

    /// Attach the `Debug` rendering of a value to the diagnostic context
    #[must_use]
    pub fn with_debug(self, key: impl Into<String>, value: &impl Debug) -> Self {
        self.with_context(key, format!("{value:?}"))
    }

    /// Nest another error under the `cause` key
    #[must_use]
    pub fn with_cause(self, cause: PipelineError) -> Self {
        self.with_context("cause", cause)
    }

    /// Attach a list of errors under the given key
    #[must_use]
    pub fn with_errors(self, key: impl Into<String>, errors: &[PipelineError]) -> Self {
        self.with_context(key, errors)
    }

    /// Look up a context entry
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    /// Decode the nested cause, if one was attached with [`with_cause`](Self::with_cause)
    pub fn cause(&self) -> Option<PipelineError> {
        self.context
            .get("cause")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Decode a list of errors previously attached with [`with_errors`](Self::with_errors)
    pub fn nested_errors(&self, key: &str) -> Vec<PipelineError> {
        self.context
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_string()
    }
}
