//! Lobby coordinator
//!
//! The coordinator sits in the lobby on its own connection, keeps the room
//! directory current and spawns one batch of bot sessions for every open
//! room with free seats. All sessions of a batch share one
//! `RoomSharedState` and get sequence ids `0..batch_size`.

use crate::bot::{
    BotAssignment, BotSession, RoomSharedState, ScheduledClient, SessionObserver, SessionSettings,
};
use crate::client::{
    connect_with_retry, ConnectRequest, GameClient, Incoming, RetryPolicy, ServiceConnector,
};
use crate::config::{BotSettings, ConnectionSettings, SchedulerConfig, SpawnPolicy};
use crate::error::{Result, SwarmError};
use crate::lobby::directory::RoomDirectory;
use crate::metrics::MetricsCollector;
use crate::types::{ClientState, RoomInfo};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Statistics about coordinator operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorStats {
    /// Directory notifications handled
    pub notifications: u64,
    /// Batches spawned so far
    pub batches_spawned: u64,
    /// Sessions handed to the launcher
    pub bots_spawned: u64,
    /// Notifications ignored because the room already had its batch
    pub duplicates_skipped: u64,
    /// Sessions the launcher refused
    pub launch_failures: u64,
    /// Rooms currently in the directory
    pub rooms_known: usize,
    pub last_batch_at: Option<DateTime<Utc>>,
}

/// Starts a bot session for an assignment
#[cfg_attr(test, mockall::automock)]
pub trait SessionLauncher: Send + Sync {
    fn launch(&self, assignment: BotAssignment) -> Result<()>;
}

/// Runs every session on its own tokio task
pub struct TaskLauncher {
    connector: Arc<dyn ServiceConnector>,
    connection: ConnectionSettings,
    scheduler: SchedulerConfig,
    session_settings: SessionSettings,
    metrics: Arc<MetricsCollector>,
    observer: Option<Arc<dyn SessionObserver>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskLauncher {
    pub fn new(
        connector: Arc<dyn ServiceConnector>,
        connection: ConnectionSettings,
        scheduler: SchedulerConfig,
        bots: &BotSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            connector,
            connection,
            scheduler,
            session_settings: SessionSettings::from(bots),
            metrics,
            observer: None,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Session tasks that have not finished
    pub fn active_tasks(&self) -> usize {
        self.handles
            .lock()
            .map(|handles| handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Abort every session task
    pub fn shutdown(&self) {
        match self.handles.lock() {
            Ok(mut handles) => {
                info!("Aborting {} bot session task(s)", handles.len());
                for handle in handles.drain(..) {
                    handle.abort();
                }
            }
            Err(_) => error!("Session handle list is poisoned, tasks left running"),
        }
    }
}

/// Counts a session as active for as long as its task is alive
struct ActiveSession(Arc<MetricsCollector>);

impl ActiveSession {
    fn start(metrics: Arc<MetricsCollector>) -> Self {
        metrics.record_session_started();
        Self(metrics)
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.record_session_stopped();
    }
}

impl SessionLauncher for TaskLauncher {
    fn launch(&self, assignment: BotAssignment) -> Result<()> {
        let request = ConnectRequest {
            address: self.connection.address.clone(),
            app_id: self.connection.app_id.clone(),
            app_version: self.connection.app_version.clone(),
            nickname: format!(
                "{}{}",
                self.session_settings.nickname_prefix, assignment.sequence_id
            ),
        };
        let policy: RetryPolicy = self.connection.retry_policy();
        let connector = self.connector.clone();
        let scheduler = self.scheduler.clone();
        let settings = self.session_settings.clone();
        let metrics = self.metrics.clone();
        let observer = self.observer.clone();
        let span = info_span!(
            "bot",
            room = %assignment.room_name,
            seq = assignment.sequence_id
        );

        let handle = tokio::spawn(
            async move {
                let timer = metrics.start_timer();
                let client = match connect_with_retry(connector.as_ref(), &request, &policy).await {
                    Ok(client) => {
                        debug!("{} connected in {:?}", request.nickname, timer.stop());
                        client
                    }
                    Err(e) => {
                        metrics.record_connect_failure();
                        error!("Failed to connect {}: {:#}", request.nickname, e);
                        return;
                    }
                };

                let _active = ActiveSession::start(metrics.clone());
                let mut session = BotSession::new(client, assignment, settings, metrics);
                if let Some(observer) = observer {
                    session = session.with_observer(observer);
                }
                session.run(&scheduler).await;
            }
            .instrument(span),
        );

        self.handles
            .lock()
            .map_err(|_| SwarmError::InternalError {
                message: "Failed to acquire session handle lock".to_string(),
            })?
            .push(handle);
        Ok(())
    }
}

/// Lobby coordinator
pub struct LobbyCoordinator {
    client: Box<dyn GameClient>,
    settings: BotSettings,
    launcher: Arc<dyn SessionLauncher>,
    directory: RoomDirectory,
    /// Rooms whose current opening already received a batch
    served: HashSet<String>,
    metrics: Arc<MetricsCollector>,
    stats: Arc<RwLock<CoordinatorStats>>,
}

impl LobbyCoordinator {
    pub fn new(
        client: Box<dyn GameClient>,
        settings: BotSettings,
        launcher: Arc<dyn SessionLauncher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        info!("Lobby coordinator using {} spawn policy", settings.spawn_policy);
        Self {
            client,
            settings,
            launcher,
            directory: RoomDirectory::new(),
            served: HashSet::new(),
            metrics,
            stats: Arc::new(RwLock::new(CoordinatorStats::default())),
        }
    }

    /// Publish statistics into an existing handle
    pub fn with_stats(mut self, stats: Arc<RwLock<CoordinatorStats>>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn state(&self) -> ClientState {
        self.client.state()
    }

    /// Handle one notification from the lobby connection
    pub fn handle_incoming(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::StatusChanged(ClientState::ConnectedToMaster) => {
                if let Err(e) = self.client.join_lobby() {
                    error!("Coordinator failed to join the lobby: {:#}", e);
                }
            }
            Incoming::StatusChanged(state) => {
                info!("Coordinator status changed to {}", state);
            }
            Incoming::RoomListUpdate(update) => {
                self.metrics.record_notification("room_list");
                self.directory.apply_update(&update);
                for info in &update {
                    self.evaluate(info);
                }
                self.finish_notification();
            }
            Incoming::LobbyStats(snapshot) => {
                self.metrics.record_notification("lobby_stats");
                self.directory.replace_all(&snapshot);
                self.served
                    .retain(|name| snapshot.iter().any(|info| &info.name == name && !info.removed));
                for info in &snapshot {
                    self.evaluate(info);
                }
                self.finish_notification();
            }
            Incoming::Event(raw) => {
                debug!("Coordinator ignores event {}", raw.code);
            }
            Incoming::JoinFailed { room, reason } => {
                warn!("Coordinator could not join {}: {}", room, reason);
            }
            Incoming::Disconnected { cause } => {
                error!("{} caused a disconnect of the lobby coordinator", cause);
            }
        }
    }

    fn finish_notification(&mut self) {
        let rooms_known = self.directory.len();
        self.metrics.set_rooms_known(rooms_known);
        if let Ok(mut stats) = self.stats.write() {
            stats.notifications += 1;
            stats.rooms_known = rooms_known;
        }
    }

    fn evaluate(&mut self, info: &RoomInfo) {
        if !info.accepts_bots() {
            // A full, closed or removed room may open again later
            if self.served.remove(&info.name) {
                debug!("Room {} is no longer open, eligible again later", info.name);
            }
            return;
        }

        if self.settings.spawn_policy == SpawnPolicy::Deduplicated && self.served.contains(&info.name) {
            debug!("Room {} already has its batch", info.name);
            self.metrics.record_duplicate_skipped();
            if let Ok(mut stats) = self.stats.write() {
                stats.duplicates_skipped += 1;
            }
            return;
        }

        let batch_size = self.settings.batch_size(info.free_capacity());
        if batch_size == 0 {
            return;
        }
        self.spawn_batch(&info.name, batch_size);
    }

    fn spawn_batch(&mut self, room_name: &str, batch_size: usize) {
        let shared = Arc::new(RoomSharedState::new(room_name, batch_size));
        info!(
            "Spawning {} bot(s) for room {} (batch {})",
            batch_size,
            room_name,
            shared.batch_id()
        );

        let mut launched = 0;
        let mut failures = 0;
        for sequence_id in 0..batch_size {
            let assignment = BotAssignment {
                room_name: room_name.to_string(),
                sequence_id,
                shared: shared.clone(),
            };
            match self.launcher.launch(assignment) {
                Ok(()) => launched += 1,
                Err(e) => {
                    failures += 1;
                    warn!("Failed to launch bot {} for {}: {:#}", sequence_id, room_name, e);
                }
            }
        }

        self.served.insert(room_name.to_string());
        self.metrics.record_batch_spawned(launched);
        if let Ok(mut stats) = self.stats.write() {
            stats.batches_spawned += 1;
            stats.bots_spawned += launched as u64;
            stats.launch_failures += failures;
            stats.last_batch_at = Some(current_timestamp());
        }
    }
}

impl ScheduledClient for LobbyCoordinator {
    fn dispatch_incoming(&mut self) {
        while let Some(incoming) = self.client.poll_incoming() {
            self.handle_incoming(incoming);
        }
    }

    fn flush_outgoing(&mut self) {
        if let Err(e) = self.client.flush_outgoing() {
            warn!("Coordinator failed to flush: {:#}", e);
        }
    }

    fn idle_action(&mut self) {}

    fn notify_observer(&mut self) {
        debug!(
            "Coordinator knows {} room(s), {} served",
            self.directory.len(),
            self.served.len()
        );
    }
}
