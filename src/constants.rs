//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Model selection constants
pub mod llm {
    /// Default model list when `llm.models` is unset (comma-separated, primary first)
    pub const DEFAULT_MODELS: &str = "glm-4-flash,glm-4-air";

    /// Default sampling temperature for generation
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Model-name fragments whose families reject the JSON-object response format
    pub const JSON_MODE_INCOMPATIBLE: &[&str] = &["gemma", "deepseek-r1"];
}

/// Retry / backoff constants
pub mod retry {
    /// Default maximum retries per model (attempts = retries + 1)
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1_000;

    /// Maximum delay between retries (milliseconds)
    pub const MAX_DELAY_MS: u64 = 10_000;

    /// Backoff multiplier
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Maximum characters of an upstream body quoted in error messages
    pub const MAX_BODY_SNIPPET_CHARS: usize = 300;
}
