//! Input shapes accepted by sequence operations.
//!
//! Absent input and input that is not a sequence are different failures and
//! are reported with different messages.

use crate::errors::{PipelineError, Result};
use serde_json::Value;
use std::fmt;

/// Why caller input could not be turned into a list of items
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShapeError {
    /// No input was supplied
    Missing,
    /// Input was supplied but is not a sequence; carries the kind found
    NotSequence(&'static str),
}

impl fmt::Display for InputShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "Input is required"),
            Self::NotSequence(kind) => write!(f, "Input must be an array, got {kind}"),
        }
    }
}

/// Conversion of caller input into an owned list of items
pub trait IntoItems<T> {
    fn into_items(self) -> std::result::Result<Vec<T>, InputShapeError>;
}

impl<T> IntoItems<T> for Vec<T> {
    fn into_items(self) -> std::result::Result<Vec<T>, InputShapeError> {
        Ok(self)
    }
}

impl<T: Clone> IntoItems<T> for &[T] {
    fn into_items(self) -> std::result::Result<Vec<T>, InputShapeError> {
        Ok(self.to_vec())
    }
}

impl<T, const N: usize> IntoItems<T> for [T; N] {
    fn into_items(self) -> std::result::Result<Vec<T>, InputShapeError> {
        Ok(Vec::from(self))
    }
}

impl<T, S> IntoItems<T> for Option<S>
where
    S: IntoItems<T>,
{
    fn into_items(self) -> std::result::Result<Vec<T>, InputShapeError> {
        self.ok_or(InputShapeError::Missing)?.into_items()
    }
}

impl IntoItems<Value> for Value {
    fn into_items(self) -> std::result::Result<Vec<Value>, InputShapeError> {
        match self {
            Value::Array(items) => Ok(items),
            Value::Null => Err(InputShapeError::Missing),
            Value::Bool(_) => Err(InputShapeError::NotSequence("boolean")),
            Value::Number(_) => Err(InputShapeError::NotSequence("number")),
            Value::String(_) => Err(InputShapeError::NotSequence("string")),
            Value::Object(_) => Err(InputShapeError::NotSequence("object")),
        }
    }
}

/// Convert input into items, reporting shape problems against `operation`
pub fn require_items<T>(operation: &str, input: impl IntoItems<T>) -> Result<Vec<T>> {
    input.into_items().map_err(|shape| {
        let error = PipelineError::new(operation, shape.to_string());
        match shape {
            InputShapeError::Missing => error.with_context("reason", "missing"),
            InputShapeError::NotSequence(kind) => error
                .with_context("reason", "not_sequence")
                .with_context("received", kind),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_owned_and_borrowed_sequences() {
        assert_eq!(require_items("map", vec![1, 2]).unwrap(), vec![1, 2]);
        assert_eq!(require_items("map", &[1, 2][..]).unwrap(), vec![1, 2]);
        assert_eq!(require_items("map", [3, 4]).unwrap(), vec![3, 4]);
        assert_eq!(require_items("map", Some(vec![5])).unwrap(), vec![5]);
    }

    #[test]
    fn test_missing_and_non_sequence_differ() {
        let missing = require_items::<i32>("map", None::<Vec<i32>>).unwrap_err();
        assert_eq!(missing.message, "Input is required");

        let null = require_items("map", Value::Null).unwrap_err();
        assert_eq!(null.message, missing.message);

        let object = require_items("map", json!({"a": 1})).unwrap_err();
        assert_eq!(object.message, "Input must be an array, got object");
        assert_ne!(object.message, missing.message);
    }

    #[test]
    fn test_json_arrays_become_items() {
        let items = require_items("filter", json!([1, "two", null])).unwrap();
        assert_eq!(items.len(), 3);
    }
}
