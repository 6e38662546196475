//! Game Logic Module
//!
//! The deterministic match core. Everything in here is pure state
//! transformation; the network and session layers never reach into
//! these rules directly.
//!
//! - `state`: match, participant, and card-instance state
//! - `actions`: the action union and target references
//! - `engine`: `initialize` and `apply`, the authoritative state machine
//! - `bot`: the scripted-opponent heuristic

pub mod actions;
pub mod bot;
pub mod engine;
pub mod state;

pub use actions::{Action, TargetRef};
pub use engine::{apply, concede, initialize, EngineError, ParticipantSetup};
pub use state::{
    CardInstance, InstanceId, MatchId, MatchState, OpponentKind, ParticipantId, ParticipantState,
    Slot,
};

/// Hero starting (and maximum) health.
pub const STARTING_HEALTH: i32 = 30;

/// Maximum mana a participant can ever refill to.
pub const MANA_CEILING: u32 = 10;

/// Maximum cards held in hand; draws beyond this burn the card.
pub const HAND_CAPACITY: usize = 10;

/// Maximum minions on one board.
pub const BOARD_CAPACITY: usize = 7;

/// Opening hand size for the side that moves first.
pub const FIRST_MOVER_OPENING_HAND: usize = 3;

/// Opening hand size for the side that moves second.
pub const SECOND_MOVER_OPENING_HAND: usize = 4;

/// Cards per constructed deck.
pub const DECK_SIZE: usize = 8;
