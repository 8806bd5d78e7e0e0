//! Postmuse - Resilient Multi-Model Invoker
//!
//! A resilience layer for OpenAI-compatible chat-completion APIs: ordered
//! model fallback, retry with exponential backoff, raw-response shape
//! normalization, and structured validation of JSON payloads, including
//! recovery from malformed upstream proxy formats.
//!
//! ## Core Features
//!
//! - **Model Fallback**: ordered model list, primary first, degraded
//!   fallbacks after; retries bounded per model
//! - **Deterministic Backoff**: `min(base · multiplier^attempt, max_delay)`
//! - **Shape Normalization**: HTML pages, fragment arrays, bare strings, and
//!   structured completions classified once and handled exhaustively
//! - **Field Validation**: accumulated, field-level error messages with
//!   schema-specific deep checks
//! - **Streaming**: per-fragment sink delivery with the same retry policy
//!
//! ## Quick Start
//!
//! ```ignore
//! use postmuse::{ConfigLoader, Invoker};
//!
//! let config = ConfigLoader::load()?;
//! let invoker = Invoker::new(config);
//! let analysis = invoker.analyze(&prompt, &["rules", "tagStrategy"]).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: invocation orchestration, transport, validation
//! - [`config`]: layered configuration with validation
//! - [`types`]: unified error type and result alias

pub mod ai;
pub mod config;
pub mod constants;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{ApiConfig, Config, ConfigLoader, LlmConfig, RetryConfig};

// Error Types
pub use types::error::{MuseError, Result};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    ChatRequest,
    ChatTransport,
    // Orchestration
    Invoker,
    // Response handling
    RawResponse,
    // Retry
    RetryPolicy,
    RetryPolicyOverride,
    ValidationOutcome,
    // Validation
    validate_payload,
};
