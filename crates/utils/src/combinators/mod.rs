//! Combinators that build or adapt operations.
//!
//! - **`guards`**: `when`, `unless`, `guard`, `trap`, `tap`
//! - **`timing`**: `delay`, `timeout`, `debounce`, `throttle`, cancellation
//! - **`memoize`**: per-handle result caches
//! - **`results`**: helpers over lists of `Result`s
//! - **`sequence`**: ordered execution of thunks

pub mod guards;
pub mod memoize;
pub mod results;
pub mod sequence;
pub mod timing;

pub use guards::{guard, recover, tap, trap, trap_async, trap_result, unless, when};
pub use memoize::{memoize, memoize_bounded, memoize_by, Memoized};
pub use results::{
    all_successful, any_successful, combine_results, extract_errors, extract_successful,
};
pub use sequence::sequence;
pub use timing::{
    debounce, delay, delayed, throttle, timeout, timeout_with_token, with_timeout,
    CancellationSignal, Debounced, Throttled,
};

pub use kairo_core::functional::{curry, curry3, partial, partial2};
