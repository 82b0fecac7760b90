//! Error type and result extensions for pipeline operations

mod builders;
mod conversions;
mod extensions;
mod types;

pub use extensions::*;
pub use types::{PipelineError, Result};
