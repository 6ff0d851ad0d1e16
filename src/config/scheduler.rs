//! Per-session scheduler timing

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tick quantum and the four timer intervals, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_quantum_ms: u64,
    pub dispatch_interval_ms: u64,
    pub flush_interval_ms: u64,
    pub idle_interval_ms: u64,
    pub notify_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_quantum_ms: 10,
            dispatch_interval_ms: 10,
            flush_interval_ms: 50,
            idle_interval_ms: 500,
            notify_interval_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_quantum(&self) -> Duration {
        Duration::from_millis(self.tick_quantum_ms)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(self.notify_interval_ms)
    }
}
