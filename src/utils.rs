//! Utility functions for the bot swarm

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Generate a new unique id for a spawn batch
pub fn generate_batch_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Next delay of an exponential backoff, capped at `max`
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Format a duration as fractional milliseconds for log lines
pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
