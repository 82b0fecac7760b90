//! Helpers over lists of results

use kairo_core::constants::OP_COMBINE;
use kairo_core::{PipelineError, Result};

/// Collect every value, or fail listing every failing element.
///
/// The error's `errors` context holds each failure in order and
/// `failed_indices` holds their positions in `results`.
pub fn combine_results<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let total = results.len();
    let mut values = Vec::with_capacity(total);
    let mut failures = Vec::new();
    let mut failed_indices = Vec::new();

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(error) => {
                failed_indices.push(index);
                failures.push(error);
            }
        }
    }

    if failures.is_empty() {
        return Ok(values);
    }

    Err(PipelineError::new(
        OP_COMBINE,
        format!("{} of {} results failed", failures.len(), total),
    )
    .with_context("failed_indices", failed_indices)
    .with_errors("errors", &failures))
}

/// Values of the successful results, in order
pub fn extract_successful<T>(results: Vec<Result<T>>) -> Vec<T> {
    results.into_iter().filter_map(|r| r.ok()).collect()
}

/// Errors of the failed results, in order
pub fn extract_errors<T>(results: Vec<Result<T>>) -> Vec<PipelineError> {
    results.into_iter().filter_map(|r| r.err()).collect()
}

pub fn all_successful<T>(results: &[Result<T>]) -> bool {
    results.iter().all(|r| r.is_ok())
}

pub fn any_successful<T>(results: &[Result<T>]) -> bool {
    results.iter().any(|r| r.is_ok())
}
