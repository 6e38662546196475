//! # TeleCards Match Server
//!
//! Authoritative server for a turn-based, two-player card battle. The
//! server owns every game-affecting decision; clients only render state
//! and submit intent.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TELECARDS SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  catalog/        - Immutable card definitions                │
//! │  ├── mod.rs      - Card pool and lookup                      │
//! │  └── effects.rs  - On-play effect registry                   │
//! │                                                              │
//! │  game/           - Deterministic match core (no I/O)         │
//! │  ├── state.rs    - Match and participant state               │
//! │  ├── actions.rs  - Action union, target references           │
//! │  ├── engine.rs   - initialize / apply state machine          │
//! │  └── bot.rs      - Scripted-opponent heuristic               │
//! │                                                              │
//! │  store/          - Player record interface + memory impl     │
//! │  session/        - One running match per owner task          │
//! │  │                 (timers, broadcasts, finalization)        │
//! │  lobby/          - Matchmaking queue, challenge broker       │
//! │  network/        - WebSocket boundary (non-deterministic)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Each match session is a single-owner tokio task: inbound actions,
//! timer firings, and scripted-opponent wake-ups for one match are
//! strictly serialized through its command channel. The matchmaking
//! queue and the challenge broker are each one lock-guarded registry.
//! Sessions never share mutable state with each other.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod game;
pub mod lobby;
pub mod network;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use catalog::{CardCatalog, CardDefinition};
pub use game::{Action, MatchState, ParticipantId, ParticipantState};
pub use lobby::{ChallengeBroker, MatchmakingQueue};
pub use network::{GameServer, ServerConfig};
pub use session::{MatchSession, SessionConfig, SessionHandle};
pub use store::{MemoryStore, PlayerStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
