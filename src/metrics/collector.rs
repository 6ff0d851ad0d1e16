//! Metrics collection using Prometheus
//!
//! Metrics are grouped by the component that records them: the service
//! itself, bot sessions, seat/role/turn allocation and the lobby coordinator.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the bot swarm
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    session_metrics: SessionMetrics,
    allocation_metrics: AllocationMetrics,
    coordinator_metrics: CoordinatorMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Per-session traffic and lifecycle metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Sessions whose scheduler is running
    pub sessions_active: IntGauge,

    pub sessions_started_total: IntCounter,

    /// Bots that never managed to connect
    pub connect_failures_total: IntCounter,

    pub events_received_total: IntCounterVec,

    pub events_sent_total: IntCounterVec,

    /// Handler failures caught at the dispatch boundary
    pub handler_errors_total: IntCounterVec,

    pub round_trip_seconds: Histogram,

    /// Probes discarded because a newer probe was issued
    pub probes_overwritten_total: IntCounter,
}

/// Seat, role and turn-token metrics
#[derive(Clone)]
pub struct AllocationMetrics {
    pub seat_pools_published_total: IntCounter,

    /// Bots whose sequence id lies beyond the published pool
    pub seat_pool_exhausted_total: IntCounter,

    pub seats_claimed_total: IntCounter,

    pub roles_claimed_total: IntCounter,

    pub tokens_forwarded_total: IntCounter,

    /// Token chains that ended for lack of eligible actors
    pub token_chains_ended_total: IntCounter,

    pub voting_ended_sent_total: IntCounter,
}

/// Lobby coordinator metrics
#[derive(Clone)]
pub struct CoordinatorMetrics {
    /// Directory notifications by kind
    pub notifications_total: IntCounterVec,

    pub batches_spawned_total: IntCounter,

    pub bots_spawned_total: IntCounter,

    pub duplicates_skipped_total: IntCounter,

    pub rooms_known: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let allocation_metrics = AllocationMetrics::new(&registry)?;
        let coordinator_metrics = CoordinatorMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            session_metrics,
            allocation_metrics,
            coordinator_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn allocation(&self) -> &AllocationMetrics {
        &self.allocation_metrics
    }

    pub fn coordinator(&self) -> &CoordinatorMetrics {
        &self.coordinator_metrics
    }

    pub fn record_session_started(&self) {
        self.session_metrics.sessions_started_total.inc();
        self.session_metrics.sessions_active.inc();
    }

    pub fn record_session_stopped(&self) {
        self.session_metrics.sessions_active.dec();
    }

    pub fn record_connect_failure(&self) {
        self.session_metrics.connect_failures_total.inc();
    }

    pub fn record_event_received(&self, event: &str) {
        self.session_metrics
            .events_received_total
            .with_label_values(&[event])
            .inc();
    }

    pub fn record_event_sent(&self, event: &str) {
        self.session_metrics
            .events_sent_total
            .with_label_values(&[event])
            .inc();
    }

    pub fn record_handler_error(&self, event: &str) {
        self.session_metrics
            .handler_errors_total
            .with_label_values(&[event])
            .inc();
    }

    pub fn record_round_trip(&self, rtt: Duration) {
        self.session_metrics
            .round_trip_seconds
            .observe(rtt.as_secs_f64());
    }

    pub fn record_probe_overwritten(&self) {
        self.session_metrics.probes_overwritten_total.inc();
    }

    pub fn record_seat_pool_published(&self) {
        self.allocation_metrics.seat_pools_published_total.inc();
    }

    pub fn record_seat_pool_exhausted(&self) {
        self.allocation_metrics.seat_pool_exhausted_total.inc();
    }

    pub fn record_seat_claimed(&self) {
        self.allocation_metrics.seats_claimed_total.inc();
    }

    pub fn record_role_claimed(&self) {
        self.allocation_metrics.roles_claimed_total.inc();
    }

    pub fn record_token_forwarded(&self) {
        self.allocation_metrics.tokens_forwarded_total.inc();
    }

    pub fn record_token_chain_ended(&self) {
        self.allocation_metrics.token_chains_ended_total.inc();
    }

    pub fn record_voting_ended(&self) {
        self.allocation_metrics.voting_ended_sent_total.inc();
    }

    pub fn record_notification(&self, kind: &str) {
        self.coordinator_metrics
            .notifications_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn record_batch_spawned(&self, size: usize) {
        self.coordinator_metrics.batches_spawned_total.inc();
        self.coordinator_metrics
            .bots_spawned_total
            .inc_by(size as u64);
    }

    pub fn record_duplicate_skipped(&self) {
        self.coordinator_metrics.duplicates_skipped_total.inc();
    }

    pub fn set_rooms_known(&self, count: usize) {
        self.coordinator_metrics.rooms_known.set(count as i64);
    }

    pub fn set_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("room_swarm_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "room_swarm_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("room_swarm_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_active = IntGauge::new(
            "room_swarm_sessions_active",
            "Bot sessions currently running",
        )?;
        registry.register(Box::new(sessions_active.clone()))?;

        let sessions_started_total = IntCounter::new(
            "room_swarm_sessions_started_total",
            "Total bot sessions started",
        )?;
        registry.register(Box::new(sessions_started_total.clone()))?;

        let connect_failures_total = IntCounter::new(
            "room_swarm_connect_failures_total",
            "Bots that exhausted their connection attempts",
        )?;
        registry.register(Box::new(connect_failures_total.clone()))?;

        let events_received_total = IntCounterVec::new(
            Opts::new("room_swarm_events_received_total", "Events dispatched"),
            &["event"],
        )?;
        registry.register(Box::new(events_received_total.clone()))?;

        let events_sent_total = IntCounterVec::new(
            Opts::new("room_swarm_events_sent_total", "Events raised"),
            &["event"],
        )?;
        registry.register(Box::new(events_sent_total.clone()))?;

        let handler_errors_total = IntCounterVec::new(
            Opts::new(
                "room_swarm_handler_errors_total",
                "Event handler failures caught at dispatch",
            ),
            &["event"],
        )?;
        registry.register(Box::new(handler_errors_total.clone()))?;

        let round_trip_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "room_swarm_round_trip_seconds",
                "Round-trip time of probe events",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(round_trip_seconds.clone()))?;

        let probes_overwritten_total = IntCounter::new(
            "room_swarm_probes_overwritten_total",
            "Probes discarded by a newer probe",
        )?;
        registry.register(Box::new(probes_overwritten_total.clone()))?;

        Ok(Self {
            sessions_active,
            sessions_started_total,
            connect_failures_total,
            events_received_total,
            events_sent_total,
            handler_errors_total,
            round_trip_seconds,
            probes_overwritten_total,
        })
    }
}

impl AllocationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let seat_pools_published_total = IntCounter::new(
            "room_swarm_seat_pools_published_total",
            "Seat pools published by the first joining bot of a batch",
        )?;
        registry.register(Box::new(seat_pools_published_total.clone()))?;

        let seat_pool_exhausted_total = IntCounter::new(
            "room_swarm_seat_pool_exhausted_total",
            "Bots left without a seat in the published pool",
        )?;
        registry.register(Box::new(seat_pool_exhausted_total.clone()))?;

        let seats_claimed_total =
            IntCounter::new("room_swarm_seats_claimed_total", "Take-seat events raised")?;
        registry.register(Box::new(seats_claimed_total.clone()))?;

        let roles_claimed_total = IntCounter::new(
            "room_swarm_roles_claimed_total",
            "Choose-role events raised",
        )?;
        registry.register(Box::new(roles_claimed_total.clone()))?;

        let tokens_forwarded_total = IntCounter::new(
            "room_swarm_tokens_forwarded_total",
            "Turn tokens forwarded to another actor",
        )?;
        registry.register(Box::new(tokens_forwarded_total.clone()))?;

        let token_chains_ended_total = IntCounter::new(
            "room_swarm_token_chains_ended_total",
            "Turn token chains that ran out of eligible actors",
        )?;
        registry.register(Box::new(token_chains_ended_total.clone()))?;

        let voting_ended_sent_total = IntCounter::new(
            "room_swarm_voting_ended_sent_total",
            "Voting-ended events raised",
        )?;
        registry.register(Box::new(voting_ended_sent_total.clone()))?;

        Ok(Self {
            seat_pools_published_total,
            seat_pool_exhausted_total,
            seats_claimed_total,
            roles_claimed_total,
            tokens_forwarded_total,
            token_chains_ended_total,
            voting_ended_sent_total,
        })
    }
}

impl CoordinatorMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let notifications_total = IntCounterVec::new(
            Opts::new(
                "room_swarm_directory_notifications_total",
                "Directory notifications seen by the coordinator",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let batches_spawned_total = IntCounter::new(
            "room_swarm_batches_spawned_total",
            "Bot batches spawned",
        )?;
        registry.register(Box::new(batches_spawned_total.clone()))?;

        let bots_spawned_total =
            IntCounter::new("room_swarm_bots_spawned_total", "Bots spawned")?;
        registry.register(Box::new(bots_spawned_total.clone()))?;

        let duplicates_skipped_total = IntCounter::new(
            "room_swarm_duplicates_skipped_total",
            "Notifications ignored because the opening was already filled",
        )?;
        registry.register(Box::new(duplicates_skipped_total.clone()))?;

        let rooms_known = IntGauge::new("room_swarm_rooms_known", "Rooms in the directory")?;
        registry.register(Box::new(rooms_known.clone()))?;

        Ok(Self {
            notifications_total,
            batches_spawned_total,
            bots_spawned_total,
            duplicates_skipped_total,
            rooms_known,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _session = collector.session();
        let _allocation = collector.allocation();
        let _coordinator = collector.coordinator();
    }

    #[test]
    fn test_session_counters() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_session_started();
        collector.record_session_started();
        collector.record_session_stopped();
        assert_eq!(collector.session().sessions_active.get(), 1);
        assert_eq!(collector.session().sessions_started_total.get(), 2);

        collector.record_event_sent("take_seat");
        collector.record_event_sent("take_seat");
        assert_eq!(
            collector
                .session()
                .events_sent_total
                .with_label_values(&["take_seat"])
                .get(),
            2
        );

        collector.record_round_trip(Duration::from_millis(12));
        assert_eq!(collector.session().round_trip_seconds.get_sample_count(), 1);
    }

    #[test]
    fn test_coordinator_counters() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_batch_spawned(3);
        collector.record_batch_spawned(2);
        collector.record_duplicate_skipped();
        collector.set_rooms_known(4);

        assert_eq!(collector.coordinator().batches_spawned_total.get(), 2);
        assert_eq!(collector.coordinator().bots_spawned_total.get(), 5);
        assert_eq!(collector.coordinator().duplicates_skipped_total.get(), 1);
        assert_eq!(collector.coordinator().rooms_known.get(), 4);
    }

    #[test]
    fn test_separate_registries_do_not_clash() {
        let first = MetricsCollector::new();
        let second = MetricsCollector::new();
        assert!(first.is_ok() && second.is_ok());
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
