//! Core error type definition

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The single failure payload returned by every pipeline operation.
///
/// Operations are told apart only by the `operation` tag; anything else a
/// caller might need to diagnose the failure (the offending item, its index,
/// an accumulator snapshot, nested causes) lives in the free-form `context`
/// map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{operation}: {message}")]
pub struct PipelineError {
    /// Name of the operation that produced the failure
    pub operation: String,
    /// Human readable description
    pub message: String,
    /// Diagnostic payload
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
}
