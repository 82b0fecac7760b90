//! Functional composition utilities
//!
//! Typed pipes with tracing, plus the small argument-shuffling combinators
//! (`curry` and `partial`) used to adapt callables into operations.

pub mod composition;

pub use composition::operators::{curry, curry3, partial, partial2};
pub use composition::Pipe;

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::composition::operators::*;
    pub use super::composition::Pipe;
    pub use crate::{pipeline, try_pipeline};
}
