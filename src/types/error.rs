//! Unified Error Type System
//!
//! Centralized error types for the entire crate, split along the line the
//! retry loop cares about:
//!
//! - **Terminal**: aborts the whole call, bypassing remaining retries and
//!   model fallbacks (`Config`, `HtmlResponse`, `Exhausted`)
//! - **Recoverable**: consumed by the retry/fallback loop and never surfaced
//!   to the caller unless exhaustion occurs (`Upstream`, `Validation`)
//!
//! Terminal errors additionally carry a short category label and a
//! remediation hint intended for display.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuseError {
    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream endpoint served a web page instead of API data.
    /// Retrying is provably useless; the base URL points at the wrong place.
    #[error("upstream returned an HTML page instead of an API response (model: {model})")]
    HtmlResponse { model: String },

    /// Transient upstream failure: network errors, error statuses,
    /// unusable or empty response bodies.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Parsed response failed schema validation.
    #[error("response validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    /// Every model/attempt combination failed.
    #[error(
        "all models failed after {attempts} attempts each: [{}]; last error: {last_error}",
        models.join(", ")
    )]
    Exhausted {
        models: Vec<String>,
        attempts: u32,
        last_error: String,
    },
}

impl MuseError {
    /// Create a configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a transient upstream error from a message.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Whether this error aborts the entire call. Terminal errors bypass all
    /// remaining retries and model fallbacks regardless of nesting depth.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::HtmlResponse { .. } | Self::Exhausted { .. }
        )
    }

    /// Short category label for display and log routing.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::HtmlResponse { .. } => "CONFIG",
            Self::Upstream(_) => "UPSTREAM",
            Self::Validation { .. } => "VALIDATION",
            Self::Exhausted { .. } => "EXHAUSTED",
        }
    }

    /// User-facing remediation hint. Only the errors that surface to callers
    /// (configuration and exhaustion) carry one.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some(
                "Set POSTMUSE_API_BASE and POSTMUSE_API_KEY (or [api] base/key in postmuse.toml) and retry.",
            ),
            Self::HtmlResponse { .. } => Some(
                "The configured endpoint served a web page; point api.base at the API root (e.g. https://host/v1).",
            ),
            Self::Exhausted { .. } => Some(
                "Every configured model failed; check upstream status or adjust llm.models, then retry.",
            ),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MuseError>;

// =============================================================================
// Tests
// =============================================================================
