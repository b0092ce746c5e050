use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::BridgeConfig;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Engine '{0}' is not available in this build")]
    EngineUnavailable(String),
}

/// Loads and validates [`BridgeConfig`] from JSON
pub struct ConfigStore;

impl ConfigStore {
    /// Parse a config from a JSON string
    pub fn from_json_str(json: &str) -> Result<BridgeConfig, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Read a config file
    pub fn load(path: &Path) -> Result<BridgeConfig, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Read `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(BridgeConfig::default()),
        }
    }

    fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
        if !config.engine.is_available() {
            let name = serde_json::to_string(&config.engine)?;
            return Err(ConfigError::EngineUnavailable(
                name.trim_matches('"').to_string(),
            ));
        }
        Ok(())
    }
}
