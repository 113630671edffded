//! swgkit Core Library
//!
//! This crate provides the error type and value types shared by the
//! swgkit codecs and tools.

pub mod error;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::types::*;
}
