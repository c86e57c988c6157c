//! JSON scenario files: device timing, fault injection and a transaction
//! script for the runner.

use std::path::Path;

use mram_device::MramConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::master::{Dispatch, Transaction};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cannot read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("r_ready_period must be at least 1")]
    ZeroReadyPeriod,
}

/// A word placed in the device before the first tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preload {
    pub address: u32,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub device: MramConfig,
    /// Overrides the bridge's default inter-beat write delay.
    pub write_delay: Option<u32>,
    pub dispatch: Dispatch,
    /// RREADY is high one cycle in this many.
    pub r_ready_period: u32,
    /// Device busy from the first tick.
    pub stuck: bool,
    /// Device wedges after this many accesses.
    pub stall_after: Option<usize>,
    pub preload: Vec<Preload>,
    pub transactions: Vec<Transaction>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            device: MramConfig::default(),
            write_delay: None,
            dispatch: Dispatch::Serial,
            r_ready_period: 1,
            stuck: false,
            stall_after: None,
            preload: Vec::new(),
            transactions: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_json::from_str(text)?;
        if scenario.r_ready_period == 0 {
            return Err(ScenarioError::ZeroReadyPeriod);
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }
}
