//! Configuration for the kairo pipeline engine
//!
//! This crate holds the engine-wide defaults (batch sizes, concurrency
//! bounds, retry policy, memoization capacity) and loads them from JSON
//! files and `KAIRO_*` environment variables.

pub mod config;
pub mod loader;

pub use config::*;
pub use loader::*;
