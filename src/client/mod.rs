//! Connection handle seam towards the remote game service
//!
//! A `GameClient` is owned by exactly one session and is only ever pumped
//! from that session's loop. Callbacks are surfaced as `Incoming` values
//! drained one at a time by `poll_incoming`, in delivery order.

pub mod loopback;

use crate::error::{Result, SwarmError};
use crate::protocol::{OutgoingEvent, RawEvent};
use crate::types::{ActorId, ClientState, PropertyMap, Room, RoomInfo, RoomOptions};
use crate::utils::next_backoff;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub use loopback::{LoopbackClient, LoopbackConnector, LoopbackHub};

/// Notification produced while pumping the connection
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    StatusChanged(ClientState),
    Event(RawEvent),
    /// Changed directory entries; removed rooms carry `removed = true`
    RoomListUpdate(Vec<RoomInfo>),
    /// Full directory snapshot
    LobbyStats(Vec<RoomInfo>),
    JoinFailed { room: String, reason: String },
    Disconnected { cause: String },
}

/// Connection handle to the game service
pub trait GameClient: Send {
    fn state(&self) -> ClientState;

    /// Actor number inside the current room, if joined
    fn local_actor_id(&self) -> Option<ActorId>;

    fn join_lobby(&mut self) -> Result<()>;

    fn create_room(&mut self, name: &str, options: RoomOptions) -> Result<()>;

    /// Fails immediately unless the client sits in the lobby; the outcome of
    /// an accepted request arrives later through `poll_incoming`
    fn join_room(&mut self, name: &str) -> Result<()>;

    fn leave_room(&mut self) -> Result<()>;

    fn set_room_properties(&mut self, properties: PropertyMap) -> Result<()>;

    fn set_actor_properties(&mut self, actor_id: ActorId, properties: PropertyMap) -> Result<()>;

    /// Queue an event; nothing is sent before `flush_outgoing`
    fn raise_event(&mut self, event: OutgoingEvent) -> Result<()>;

    fn poll_incoming(&mut self) -> Option<Incoming>;

    fn flush_outgoing(&mut self) -> Result<()>;

    /// Snapshot of the current room as seen by this client
    fn current_room(&self) -> Option<Room>;
}

/// What a client presents when connecting
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    pub address: String,
    pub app_id: String,
    pub app_version: String,
    pub nickname: String,
}

/// Opens connections to the game service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn GameClient>>;
}

/// Bounded exponential backoff for connection attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

/// Attempt to connect, backing off exponentially between failures
pub async fn connect_with_retry(
    connector: &dyn ServiceConnector,
    request: &ConnectRequest,
    policy: &RetryPolicy,
) -> Result<Box<dyn GameClient>> {
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;
        match connector.connect(request).await {
            Ok(client) => {
                info!(
                    "Connected {} to {} after {} attempt(s)",
                    request.nickname, request.address, attempt
                );
                return Ok(client);
            }
            Err(e) => {
                if attempt >= policy.max_attempts.max(1) {
                    error!(
                        "Giving up connecting {} after {} attempts",
                        request.nickname, attempt
                    );
                    return Err(SwarmError::ConnectionFailed {
                        message: format!("Max attempts exceeded: {}", e),
                    }
                    .into());
                }

                warn!(
                    "Connection attempt {} for {} failed: {}. Retrying in {:?}",
                    attempt, request.nickname, e, delay
                );
                sleep(delay).await;
                delay = next_backoff(delay, policy.max_delay);
                debug!("Next backoff delay {:?}", delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn request() -> ConnectRequest {
        ConnectRequest {
            address: "loopback".to_string(),
            app_id: "test".to_string(),
            app_version: "1.0".to_string(),
            nickname: "Player_0".to_string(),
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let hub = LoopbackHub::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut connector = MockServiceConnector::new();
        connector.expect_connect().times(3).returning(move |req| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(anyhow::anyhow!("refused"))
            } else {
                Ok(Box::new(hub.register_client(&req.nickname)) as Box<dyn GameClient>)
            }
        });

        let client = connect_with_retry(&connector, &request(), &fast_policy(5))
            .await
            .unwrap();
        assert_eq!(client.state(), ClientState::ConnectedToMaster);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let mut connector = MockServiceConnector::new();
        connector
            .expect_connect()
            .times(3)
            .returning(|_| Err(anyhow::anyhow!("refused")));

        let result = connect_with_retry(&connector, &request(), &fast_policy(3)).await;
        let err = result.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<SwarmError>(),
            Some(SwarmError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let mut connector = MockServiceConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("refused")));

        assert!(connect_with_retry(&connector, &request(), &fast_policy(0))
            .await
            .is_err());
    }
}
