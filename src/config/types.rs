//! Configuration Types
//!
//! All configuration structures with sensible defaults.

use serde::{Deserialize, Serialize};

use crate::constants::{llm as llm_constants, network, retry as retry_constants};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream API endpoint settings
    pub api: ApiConfig,

    /// Model selection and generation settings
    pub llm: LlmConfig,

    /// Retry / backoff settings
    pub retry: RetryConfig,
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `MuseError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(crate::types::MuseError::config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(crate::types::MuseError::config(
                "api.timeout_secs must be greater than 0",
            ));
        }

        if self.retry.multiplier < 1.0 {
            return Err(crate::types::MuseError::config(format!(
                "retry.multiplier must be at least 1.0, got {}",
                self.retry.multiplier
            )));
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(crate::types::MuseError::config(format!(
                "retry.max_delay_ms ({}) must not be below retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            )));
        }

        Ok(())
    }
}

// =============================================================================
// API Configuration
// =============================================================================

/// Upstream endpoint configuration
///
/// Note: the API key is handled securely - it is never serialized back out
/// and is redacted in debug output. The transport converts it to
/// SecretString internally for runtime protection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL (e.g. `https://host/v1`). Required at first use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// API key. Required at first use. Never serialized back out.
    #[serde(skip_serializing)]
    pub key: Option<String>,

    /// Request timeout in seconds, enforced by the HTTP client
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base", &self.base)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base: None,
            key: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Comma-separated model list, primary first; fallbacks follow in order
    pub models: String,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Verbose diagnostic logging of raw upstream payloads.
    /// Never alters control flow or validation outcomes.
    pub debug: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            models: llm_constants::DEFAULT_MODELS.to_string(),
            temperature: llm_constants::DEFAULT_TEMPERATURE,
            debug: false,
        }
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retries per model (attempts = retries + 1)
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    pub base_delay_ms: u64,

    /// Maximum delay between retries (milliseconds)
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::DEFAULT_MAX_RETRIES,
            base_delay_ms: retry_constants::BASE_DELAY_MS,
            max_delay_ms: retry_constants::MAX_DELAY_MS,
            multiplier: retry_constants::BACKOFF_MULTIPLIER,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.models, llm_constants::DEFAULT_MODELS);
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.api.base.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_temperature_range() {
        let mut config = Config::default();
        config.llm.temperature = 2.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_retry_bounds() {
        let mut config = Config::default();
        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_delay_ms = 10;
        config.retry.base_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let config = ApiConfig {
            base: Some("https://api.example.com/v1".into()),
            key: Some("sk-sensitive".into()),
            timeout_secs: 60,
        };
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("sk-sensitive"));
    }
}
