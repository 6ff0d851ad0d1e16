//! Bot behaviour and spawn settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the coordinator reacts to repeated notifications about a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpawnPolicy {
    /// Every qualifying notification spawns a fresh batch
    Reactive,
    /// At most one batch per room opening
    Deduplicated,
}

impl fmt::Display for SpawnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnPolicy::Reactive => write!(f, "reactive"),
            SpawnPolicy::Deduplicated => write!(f, "deduplicated"),
        }
    }
}

impl FromStr for SpawnPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reactive" => Ok(SpawnPolicy::Reactive),
            "deduplicated" | "dedup" => Ok(SpawnPolicy::Deduplicated),
            other => Err(format!("unknown spawn policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Nicknames are this prefix followed by the sequence id
    pub nickname_prefix: String,
    /// Send position updates reliably
    pub reliable_position: bool,
    /// Issue a round-trip probe on every observer notification
    pub probe_on_notify: bool,
    pub spawn_policy: SpawnPolicy,
    /// Upper bound on bots per batch, 0 for no limit
    pub max_bots_per_batch: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            nickname_prefix: "Player_".to_string(),
            reliable_position: false,
            probe_on_notify: true,
            spawn_policy: SpawnPolicy::Deduplicated,
            max_bots_per_batch: 0,
        }
    }
}

impl BotSettings {
    /// Batch size for a room with `free_capacity` open seats
    pub fn batch_size(&self, free_capacity: usize) -> usize {
        if self.max_bots_per_batch == 0 {
            free_capacity
        } else {
            free_capacity.min(self.max_bots_per_batch)
        }
    }
}
