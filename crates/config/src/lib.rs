//! Configuration loading and validation for braidline.
//!
//! Loads configuration from a TOML file with `BRAIDLINE_*` environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which wire encoding the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Discrete typed event frames (`event:` / `data:`).
    Sse,
    /// In-band tag-delimited text.
    Tagged,
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Sse
    }
}

/// Stream multiplexer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub encoding: Encoding,
}

/// The root configuration for the response pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model name sent to the chat-completion backend.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per model response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Agent loop iteration budget.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Stream multiplexer settings.
    #[serde(default)]
    pub stream: StreamConfig,
}

fn default_model() -> String {
    "deepseek-chat".into()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_iterations() -> u32 {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            max_iterations: default_max_iterations(),
            stream: StreamConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file, apply environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `BRAIDLINE_*` environment variable overrides.
    fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("BRAIDLINE_MODEL") {
            self.model = model;
        }
        if let Ok(temp) = std::env::var("BRAIDLINE_TEMPERATURE")
            && let Ok(parsed) = temp.parse()
        {
            self.temperature = parsed;
        }
        if let Ok(iters) = std::env::var("BRAIDLINE_MAX_ITERATIONS")
            && let Ok(parsed) = iters.parse()
        {
            self.max_iterations = parsed;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} out of range [0, 2]",
                self.temperature
            )));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
