//! Per-session cooperative loop
//!
//! Every tick checks four independent timers against a monotonic clock.
//! Each timer fires once its own interval has elapsed since it last fired;
//! a slow handler delays the next tick but never overlaps with it.

use crate::config::SchedulerConfig;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::trace;

/// Interval timer polled from the loop
#[derive(Debug, Clone)]
pub struct Timer {
    interval: Duration,
    last_fired: Instant,
}

impl Timer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_fired: now,
        }
    }

    /// Fire if the interval has elapsed, restarting the interval from `now`
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_fired) >= self.interval {
            self.last_fired = now;
            true
        } else {
            false
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// The four periodic actions a scheduled client exposes
pub trait ScheduledClient {
    /// Pump every currently available incoming notification
    fn dispatch_incoming(&mut self);

    /// Transmit everything queued since the last flush
    fn flush_outgoing(&mut self);

    /// Local periodic action, e.g. moving the player
    fn idle_action(&mut self);

    /// Report to the registered observer, if any
    fn notify_observer(&mut self);
}

/// Which timers fired during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: bool,
    pub flushed: bool,
    pub idled: bool,
    pub notified: bool,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    quantum: Duration,
    dispatch: Timer,
    flush: Timer,
    idle: Timer,
    notify: Timer,
    ticks: u64,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig, now: Instant) -> Self {
        Self {
            quantum: config.tick_quantum(),
            dispatch: Timer::new(config.dispatch_interval(), now),
            flush: Timer::new(config.flush_interval(), now),
            idle: Timer::new(config.idle_interval(), now),
            notify: Timer::new(config.notify_interval(), now),
            ticks: 0,
        }
    }

    /// Run one pass over the timers, in dispatch, flush, idle, notify order
    pub fn tick<C: ScheduledClient + ?Sized>(&mut self, now: Instant, client: &mut C) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport::default();

        if self.dispatch.poll(now) {
            client.dispatch_incoming();
            report.dispatched = true;
        }
        if self.flush.poll(now) {
            client.flush_outgoing();
            report.flushed = true;
        }
        if self.idle.poll(now) {
            client.idle_action();
            report.idled = true;
        }
        if self.notify.poll(now) {
            client.notify_observer();
            report.notified = true;
        }

        report
    }

    /// Tick forever, sleeping one quantum between ticks
    pub async fn run<C: ScheduledClient + Send + ?Sized>(mut self, client: &mut C) {
        loop {
            let report = self.tick(Instant::now(), client);
            trace!("tick {} {:?}", self.ticks, report);
            sleep(self.quantum).await;
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn quantum(&self) -> Duration {
        self.quantum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        dispatched: u32,
        flushed: u32,
        idled: u32,
        notified: u32,
    }

    impl ScheduledClient for Counting {
        fn dispatch_incoming(&mut self) {
            self.dispatched += 1;
        }
        fn flush_outgoing(&mut self) {
            self.flushed += 1;
        }
        fn idle_action(&mut self) {
            self.idled += 1;
        }
        fn notify_observer(&mut self) {
            self.notified += 1;
        }
    }

    #[test]
    fn test_timer_fires_after_interval() {
        let t0 = Instant::now();
        let mut timer = Timer::new(Duration::from_millis(50), t0);

        assert!(!timer.poll(t0 + Duration::from_millis(49)));
        assert!(timer.poll(t0 + Duration::from_millis(50)));
        // Restarted from the firing instant
        assert!(!timer.poll(t0 + Duration::from_millis(60)));
        assert!(timer.poll(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn test_timers_are_independent() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(&SchedulerConfig::default(), t0);
        let mut client = Counting::default();

        // One simulated second in 10 ms steps
        for step in 1..=100u64 {
            scheduler.tick(t0 + Duration::from_millis(step * 10), &mut client);
        }

        assert_eq!(client.dispatched, 100);
        assert_eq!(client.flushed, 20);
        assert_eq!(client.idled, 2);
        assert_eq!(client.notified, 1);
        assert_eq!(scheduler.ticks(), 100);
    }

    #[test]
    fn test_late_tick_fires_each_timer_once() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(&SchedulerConfig::default(), t0);
        let mut client = Counting::default();

        let report = scheduler.tick(t0 + Duration::from_secs(5), &mut client);
        assert_eq!(
            report,
            TickReport {
                dispatched: true,
                flushed: true,
                idled: true,
                notified: true,
            }
        );
        assert_eq!(client.idled, 1);
    }

    #[tokio::test]
    async fn test_run_keeps_ticking() {
        let config = SchedulerConfig {
            tick_quantum_ms: 1,
            dispatch_interval_ms: 1,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(&config, Instant::now());
        let mut client = Counting::default();

        let _ = tokio::time::timeout(Duration::from_millis(30), scheduler.run(&mut client)).await;
        assert!(client.dispatched > 1);
    }
}
