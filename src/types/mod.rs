//! Shared Types
//!
//! Crate-wide error types and result alias.

pub mod error;

pub use error::{MuseError, Result};
