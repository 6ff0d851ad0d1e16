//! Bot sessions and the pure decisions they make
//!
//! A session is one synthetic player: it connects, waits for the lobby,
//! joins its assigned room and then answers the seat/role/turn control
//! protocol. Seat and role choices, the turn token ring and the round-trip
//! probe live in their own modules so they can be exercised without a
//! connection.

pub mod allocation;
pub mod observer;
pub mod player;
pub mod probe;
pub mod rotation;
pub mod scheduler;
pub mod session;

// Re-export commonly used types
pub use allocation::{RoomSharedState, SeatPoolAccess};
pub use observer::{SessionObserver, SessionSnapshot, SwarmRegistry, SwarmSummary};
pub use player::{LocalPlayer, Player};
pub use probe::RoundTripProbe;
pub use scheduler::{ScheduledClient, Scheduler, TickReport, Timer};
pub use session::{BotAssignment, BotSession, SessionSettings};
