//! Simulation configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::Tick;

/// When a peer relays a marker it received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardPolicy {
    /// Relay on origination, on the marker that starts the epoch at a peer,
    /// and on every later close that leaves channels open. Receivers discard
    /// the extra copies.
    #[default]
    EveryClose,
    /// Relay once per peer per epoch: on origination or on the first marker
    FirstReceipt,
}

/// Configuration for the simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Delay used by topology builders when none is given per edge
    pub default_delay: Tick,
    /// Starting balance for peers created by topology builders
    pub initial_balance: i64,
    /// Marker relay rule
    pub forward_policy: ForwardPolicy,
    /// Stop `run_until_idle` once the clock would advance more than this many
    /// ticks within one call (None = no limit)
    pub max_ticks: Option<Tick>,
    /// Log every event at trace level as it is appended
    pub trace_events: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            default_delay: 1,
            initial_balance: 100,
            forward_policy: ForwardPolicy::EveryClose,
            max_ticks: None,
            trace_events: false,
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SimError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    pub fn with_forward_policy(mut self, policy: ForwardPolicy) -> Self {
        self.forward_policy = policy;
        self
    }
}
