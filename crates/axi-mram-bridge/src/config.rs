//! Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("timeout_budget must be at least one cycle")]
    ZeroTimeoutBudget,
}

/// Fixed parameters of a bridge instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Consecutive busy cycles tolerated in a device wait.
    pub timeout_budget: u32,
    /// Cycles between programming a read address and sampling the word.
    pub read_latency: u32,
    /// Inter-beat write delay fed to the bridge when nothing overrides it.
    pub default_write_delay: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_budget: 1024,
            read_latency: 2,
            default_write_delay: 2,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_budget == 0 {
            return Err(ConfigError::ZeroTimeoutBudget);
        }
        Ok(())
    }
}
