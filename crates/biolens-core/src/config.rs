//! Runtime configuration.
//!
//! Layering, lowest to highest: built-in defaults, an optional TOML file,
//! environment variables. The CLI applies its own flags on top.
//!
//! ```toml
//! [model]
//! model = "gemini-3-pro"
//!
//! [resilience]
//! max_retries = 2
//! attempt_timeout_ms = 10000
//!
//! [pipeline]
//! concurrent_intake = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::GenerationConfig;
use crate::resilience::ResiliencePolicy;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_MAX_RETRIES: &str = "BIOLENS_MAX_RETRIES";
pub const ENV_TIMEOUT_SECS: &str = "BIOLENS_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Model endpoint settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// Read from the environment rather than the config file in practice.
    pub api_key: Option<String>,
    pub generation: GenerationConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-3-pro".to_string(),
            api_key: None,
            generation: GenerationConfig::default(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the image and audio stages concurrently. Reasoning still waits
    /// for both, and the trace keeps image before audio.
    pub concurrent_intake: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BiolensConfig {
    pub model: ModelConfig,
    pub resilience: ResiliencePolicy,
    pub pipeline: PipelineConfig,
}

impl BiolensConfig {
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Defaults, then `path` if given, then the environment. Validated.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.is_empty()) {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.model.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model.model = model;
        }
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            self.resilience.max_retries = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_MAX_RETRIES,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            self.resilience.attempt_timeout_ms = secs.saturating_mul(1_000);
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.resilience.validate()?;
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model.model must not be empty".into()));
        }
        let base_url = &self.model.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "model.base_url must be an http(s) URL, got {base_url:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let c = BiolensConfig::default();
        assert_eq!(c.model.model, "gemini-3-pro");
        assert_eq!(c.resilience.max_retries, 3);
        assert!(!c.pipeline.concurrent_intake);
        c.validate().unwrap();
    }

    #[test]
    fn test_toml_sections_merge_with_defaults() {
        let c = BiolensConfig::from_toml_str(
            r#"
            [resilience]
            max_retries = 1

            [pipeline]
            concurrent_intake = true
            "#,
        )
        .unwrap();
        assert_eq!(c.resilience.max_retries, 1);
        assert_eq!(c.resilience.failure_threshold, 3);
        assert!(c.pipeline.concurrent_intake);
        assert_eq!(c.model.generation.top_k, 40);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut c = BiolensConfig::from_toml_str("[model]\nmodel = \"from-file\"").unwrap();
        c.apply_env(env(&[
            (ENV_MODEL, "from-env"),
            (ENV_API_KEY, "secret"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(c.model.model, "from-env");
        assert_eq!(c.model.api_key.as_deref(), Some("secret"));
        assert_eq!(c.resilience.attempt_timeout_ms, 5_000);
    }

    #[test]
    fn test_bad_env_number_is_reported() {
        let mut c = BiolensConfig::default();
        let err = c
            .apply_env(env(&[(ENV_MAX_RETRIES, "three")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: ENV_MAX_RETRIES,
                ..
            }
        ));
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let c = ModelConfig {
            api_key: Some("top-secret".into()),
            ..ModelConfig::default()
        };
        assert!(!format!("{c:?}").contains("top-secret"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("biolens.toml");
        std::fs::write(&path, "[resilience]\ncooldown_ms = 5000\n").unwrap();
        let c = BiolensConfig::load(Some(&path)).unwrap();
        assert_eq!(c.resilience.cooldown_ms, 5_000);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut c = BiolensConfig::default();
        c.model.base_url = "ftp://nope".into();
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }
}
