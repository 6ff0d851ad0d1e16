//! Round-trip probe
//!
//! One probe may be outstanding. Starting another before the echo arrives
//! restarts the timer and the first measurement is lost.

use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone)]
pub struct RoundTripProbe {
    started: Option<Instant>,
    last_rtt: Option<Duration>,
    received_count_me: u64,
    overwritten: u64,
}

impl RoundTripProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing; returns true if an outstanding probe was discarded
    pub fn start(&mut self, now: Instant) -> bool {
        let discarded = self.started.replace(now).is_some();
        if discarded {
            self.overwritten += 1;
        }
        discarded
    }

    /// Record a received probe event. Only an echo of our own probe stops
    /// the timer; every probe event is counted.
    pub fn on_count_me(&mut self, from_local: bool, now: Instant) -> Option<Duration> {
        self.received_count_me += 1;
        if !from_local {
            return None;
        }

        let started = self.started.take()?;
        let rtt = now.saturating_duration_since(started);
        self.last_rtt = Some(rtt);
        Some(rtt)
    }

    pub fn is_outstanding(&self) -> bool {
        self.started.is_some()
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    pub fn received_count_me(&self) -> u64 {
        self.received_count_me
    }

    /// Probes discarded by a newer probe
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_records_rtt() {
        let mut probe = RoundTripProbe::new();
        let t0 = Instant::now();
        probe.start(t0);

        let rtt = probe.on_count_me(true, t0 + Duration::from_millis(30));
        assert_eq!(rtt, Some(Duration::from_millis(30)));
        assert_eq!(probe.last_rtt(), Some(Duration::from_millis(30)));
        assert!(!probe.is_outstanding());
    }

    #[test]
    fn test_second_probe_discards_first() {
        let mut probe = RoundTripProbe::new();
        let t0 = Instant::now();
        assert!(!probe.start(t0));
        assert!(probe.start(t0 + Duration::from_millis(100)));

        // The echo of the first probe is measured against the second start
        let rtt = probe.on_count_me(true, t0 + Duration::from_millis(120));
        assert_eq!(rtt, Some(Duration::from_millis(20)));
        assert_eq!(probe.overwritten(), 1);

        // The second echo finds no timer running
        assert_eq!(probe.on_count_me(true, t0 + Duration::from_millis(130)), None);
        assert_eq!(probe.last_rtt(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_foreign_probes_are_only_counted() {
        let mut probe = RoundTripProbe::new();
        let t0 = Instant::now();
        probe.start(t0);

        assert_eq!(probe.on_count_me(false, t0), None);
        assert!(probe.is_outstanding());
        assert_eq!(probe.received_count_me(), 1);
    }
}
