//! Combinator utilities for kairo pipelines
//!
//! Stateless helpers that build or adapt operations (`guard`, `trap`, `tap`,
//! `when`), timing combinators (`delay`, `timeout`, `debounce`, `throttle`),
//! memoization, retry with backoff, and helpers over lists of results. All of
//! them report failure through `kairo_core::Result` rather than panicking.

pub mod async_runtime;
pub mod combinators;
pub mod logging;
pub mod resilience;

pub use async_runtime::*;
pub use combinators::*;
pub use resilience::*;
