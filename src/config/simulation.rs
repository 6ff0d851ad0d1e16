//! Loopback simulation settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A room the simulation host creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedRoom {
    pub name: String,
    pub max_players: u8,
    /// Host players already sitting in seats `1..=seated`
    pub seated: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub enabled: bool,
    /// How long to run, 0 for until interrupted
    pub run_seconds: u64,
    /// Delay before the host starts role selection and voting
    pub kickoff_delay_ms: u64,
    /// Period of lobby stats broadcasts, 0 to publish once
    pub lobby_stats_interval_ms: u64,
    pub rooms: Vec<SimulatedRoom>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            run_seconds: 0,
            kickoff_delay_ms: 2000,
            lobby_stats_interval_ms: 1000,
            rooms: vec![SimulatedRoom {
                name: "sim-room-1".to_string(),
                max_players: 4,
                seated: 2,
            }],
        }
    }
}

impl SimulationSettings {
    pub fn run_duration(&self) -> Option<Duration> {
        (self.run_seconds > 0).then(|| Duration::from_secs(self.run_seconds))
    }

    pub fn kickoff_delay(&self) -> Duration {
        Duration::from_millis(self.kickoff_delay_ms)
    }

    pub fn lobby_stats_interval(&self) -> Option<Duration> {
        (self.lobby_stats_interval_ms > 0)
            .then(|| Duration::from_millis(self.lobby_stats_interval_ms))
    }
}
