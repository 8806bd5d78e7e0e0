//! Configuration
//!
//! Layered configuration (defaults → postmuse.toml → POSTMUSE_* env vars)
//! with post-load validation.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{ApiConfig, Config, LlmConfig, RetryConfig};
