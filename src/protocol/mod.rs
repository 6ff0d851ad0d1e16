//! Game control protocol spoken between bots
//!
//! The service relays events without interpreting them; this module owns
//! the byte codes, the payload shapes and the `gameState` room property.

pub mod codes;
pub mod events;
pub mod game_state;

pub use codes::EventCode;
pub use events::{
    ActorUpdate, BotEvent, OutgoingEvent, PlayerInfoPayload, PlayerMovePayload, RawEvent,
    RoleChange, SeatChange, TurnUpdate, ACTION_AUTHING, ACTION_VOTING,
};
pub use game_state::GameState;
