//! Player Actions
//!
//! The tagged union of everything a participant can ask the engine to do,
//! plus target references with their reserved hero sentinels.

use serde::{Deserialize, Serialize};

use crate::game::state::InstanceId;

/// Wire sentinel for the defending side's hero.
pub const OPPONENT_HERO_TARGET: &str = "opponent_hero";

/// Wire sentinel for the acting side's own hero.
pub const OWN_HERO_TARGET: &str = "player_hero";

/// What an attack or targeted card is aimed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TargetRef {
    /// The defending participant's hero.
    OpponentHero,
    /// The acting participant's own hero (always an illegal attack target).
    OwnHero,
    /// A minion instance on a board.
    Minion(InstanceId),
}

impl From<TargetRef> for String {
    fn from(target: TargetRef) -> String {
        match target {
            TargetRef::OpponentHero => OPPONENT_HERO_TARGET.to_string(),
            TargetRef::OwnHero => OWN_HERO_TARGET.to_string(),
            TargetRef::Minion(id) => id.to_string(),
        }
    }
}

/// Failure to parse a target reference off the wire.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid target reference: {0}")]
pub struct InvalidTarget(String);

impl TryFrom<String> for TargetRef {
    type Error = InvalidTarget;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            OPPONENT_HERO_TARGET => Ok(TargetRef::OpponentHero),
            OWN_HERO_TARGET => Ok(TargetRef::OwnHero),
            other => uuid::Uuid::parse_str(other)
                .map(|u| TargetRef::Minion(InstanceId::from_uuid(u)))
                .map_err(|_| InvalidTarget(s.clone())),
        }
    }
}

/// A participant's intended action for the current turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Play a card from hand.
    PlayCard {
        /// Hand instance to play.
        card: InstanceId,
        /// Optional board position for minions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
        /// Optional target for spells and targeted effects.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TargetRef>,
    },
    /// Attack with a board minion.
    Attack {
        /// Attacking instance on the acting board.
        attacker: InstanceId,
        /// Minion instance or hero sentinel on the defending side.
        target: TargetRef,
    },
    /// End the turn, handing control to the other participant.
    EndTurn,
}
