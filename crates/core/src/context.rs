//! Immutable execution trace threaded through pipeline steps.

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Per-invocation execution context.
///
/// A context is created once per top-level call. Tracing a step never mutates
/// the receiver; it returns a new context with one more trace entry of the
/// form `"<step>@<elapsed>ms"`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    operation_id: String,
    start_time: chrono::DateTime<chrono::Utc>,
    #[serde(skip)]
    started: Instant,
    metadata: Map<String, Value>,
    trace: Vec<String>,
}

impl PipelineContext {
    /// Start a fresh context with a unique operation id
    pub fn new() -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            start_time: chrono::Utc::now(),
            started: Instant::now(),
            metadata: Map::new(),
            trace: Vec::new(),
        }
    }

    /// Return a copy with one additional metadata entry
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Serialize) -> Self {
        let mut next = self.clone();
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        next.metadata.insert(key.into(), value);
        next
    }

    /// Return a copy with `step` appended to the trace
    #[must_use]
    pub fn trace(&self, step: &str) -> Self {
        let mut next = self.clone();
        next.trace
            .push(format!("{step}@{}ms", self.started.elapsed().as_millis()));
        next
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn start_time(&self) -> chrono::DateTime<chrono::Utc> {
        self.start_time
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn trace_entries(&self) -> &[String] {
        &self.trace
    }

    /// Time elapsed since the context was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}
