//! # World Configuration
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! seed = 42              # omit for an entropy-seeded id generator
//! entity_capacity = 4096
//! system_capacity = 16
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid TOML for [`WorldConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_entity_capacity() -> usize {
    256
}

fn default_system_capacity() -> usize {
    16
}

/// Construction parameters of a [`World`](crate::ecs::World).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorldConfig {
    /// Seed of the entity id generator. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Initial capacity of the entity map.
    #[serde(default = "default_entity_capacity")]
    pub entity_capacity: usize,
    /// Initial capacity of the system registry.
    #[serde(default = "default_system_capacity")]
    pub system_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: None,
            entity_capacity: default_entity_capacity(),
            system_capacity: default_system_capacity(),
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "world config loaded");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when `entity_capacity` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_capacity == 0 {
            return Err(ConfigError::Invalid(
                "entity_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
