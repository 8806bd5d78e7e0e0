//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Project config (postmuse.toml)
//! 3. Environment variables (POSTMUSE_* prefix; the first underscore
//!    separates section from field, so POSTMUSE_API_KEY -> api.key and
//!    POSTMUSE_RETRY_MAX_RETRIES -> retry.max_retries)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::types::{MuseError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → project file → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // Splitting on every underscore would break fields like
        // retry.max_retries; only the first underscore is the section
        // separator.
        figment = figment.merge(
            Env::prefixed("POSTMUSE_")
                .map(|key| key.as_str().replacen('_', ".", 1).into())
                .lowercase(true),
        );

        let config: Config = figment
            .extract()
            .map_err(|e| MuseError::config(format!("configuration error: {}", e)))?;

        // Validate configuration after loading
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| MuseError::config(format!("configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from("postmuse.toml")
    }

    /// Render the effective configuration as TOML. The API key is never
    /// serialized, so the output is safe to display.
    pub fn render(config: &Config) -> Result<String> {
        toml::to_string_pretty(config).map_err(|e| MuseError::config(e.to_string()))
    }
}
