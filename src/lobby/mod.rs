//! Pre-Match Coordination
//!
//! The two flows that produce a pair of participants for a new match
//! session: the rating-based matchmaking queue and the direct friend
//! challenge broker. Both are explicit owned registries injected with
//! their collaborators, never process-wide singletons.

pub mod challenge;
pub mod matchmaking;

pub use challenge::{Challenge, ChallengeBroker, ChallengeId, ChallengeStatus};
pub use matchmaking::{MatchmakingQueue, QueueEntry};

use std::sync::Arc;

use crate::session::SeatInfo;

/// Callback that builds and launches a match session for two seats.
///
/// Injected into the queue's pairing handler and the challenge broker so
/// they stay testable without a network stack.
pub type SessionSpawner = Arc<dyn Fn(SeatInfo, SeatInfo) + Send + Sync>;
