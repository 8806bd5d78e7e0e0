//! Model List Resolution
//!
//! Parses the configured comma-separated model list into an ordered,
//! non-empty sequence. The first entry is the primary model; the rest are
//! degraded fallbacks, tried strictly in order.

use crate::constants::llm as llm_constants;
use crate::types::{MuseError, Result};

/// Resolve the ordered model list from a comma-separated configuration value.
///
/// Falls back to [`llm_constants::DEFAULT_MODELS`] when the value is unset or
/// blank. Entries are trimmed and empty entries dropped. A list that resolves
/// to nothing is a configuration error.
pub fn resolve_models(configured: &str) -> Result<Vec<String>> {
    let raw = if configured.trim().is_empty() {
        llm_constants::DEFAULT_MODELS
    } else {
        configured
    };

    let models: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect();

    if models.is_empty() {
        return Err(MuseError::config(format!(
            "llm.models resolved to an empty list from {:?}",
            raw
        )));
    }

    Ok(models)
}

/// Whether a model family accepts the JSON-object response format.
pub fn supports_json_mode(model: &str) -> bool {
    let lower = model.to_ascii_lowercase();
    !llm_constants::JSON_MODE_INCOMPATIBLE
        .iter()
        .any(|fragment| lower.contains(fragment))
}
