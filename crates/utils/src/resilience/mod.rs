//! Retry with backoff for fallible operations.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use kairo_core::Operation;
//! use kairo_utils::resilience::{retry, RetryOptions};
//!
//! # async fn example() -> kairo_core::Result<String> {
//! let fetch = Operation::async_fallible(|()| async { Ok("payload".to_string()) });
//! let options = RetryOptions::new(5).with_delay(std::time::Duration::from_millis(50));
//! retry(&fetch, &options).await
//! # }
//! ```

pub mod config;
pub mod retry;

pub use config::{RetryOn, RetryOptions};
pub use retry::{retry, retry_fn};
