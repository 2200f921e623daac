//! Shared helpers

pub mod error;
pub mod time;

pub use error::{ErrorResponse, TimelapseError, TimelapseResult};
