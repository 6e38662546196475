//! Post-Match Progression
//!
//! Experience, level-ups, per-level rewards, and rating deltas applied to
//! the player store when a match finalizes. Wins against the scripted
//! opponent pay reduced experience and never move rating.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::game::ParticipantId;
use crate::store::{PlayerPatch, PlayerStore};

/// Experience for beating another human.
pub const XP_PER_WIN: u32 = 30;
/// Experience for beating the scripted opponent.
pub const XP_PER_SCRIPTED_WIN: u32 = 15;
/// Experience for losing to another human.
pub const XP_PER_LOSS: u32 = 10;
/// Experience for losing to the scripted opponent.
pub const XP_PER_SCRIPTED_LOSS: u32 = 5;
/// Rating delta for a win against a human.
pub const RATING_DELTA_WIN: i32 = 15;
/// Rating delta for a loss against a human.
pub const RATING_DELTA_LOSS: i32 = -10;

/// Cumulative experience required to reach each level.
const LEVEL_XP_THRESHOLDS: &[(u32, u32)] = &[
    (1, 0),
    (2, 100),
    (3, 250),
    (4, 500),
    (5, 1000),
    (6, 1750),
    (7, 2800),
    (8, 4200),
    (9, 6000),
    (10, 8500),
];

fn threshold_for(level: u32) -> Option<u32> {
    LEVEL_XP_THRESHOLDS
        .iter()
        .find(|(l, _)| *l == level)
        .map(|(_, xp)| *xp)
}

/// A reward granted by crossing a level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reward {
    /// Soft currency.
    Coins {
        /// Amount granted.
        amount: u32,
    },
    /// A specific catalog card.
    SpecificCard {
        /// Card id granted.
        card_id: String,
    },
    /// Crafting dust.
    Dust {
        /// Amount granted.
        amount: u32,
    },
}

/// Rewards granted when a level is reached.
fn rewards_for_level(level: u32) -> Vec<Reward> {
    match level {
        2 => vec![Reward::Coins { amount: 100 }],
        3 => vec![Reward::SpecificCard {
            card_id: "c001".to_string(),
        }],
        4 => vec![Reward::Coins { amount: 200 }],
        5 => vec![
            Reward::SpecificCard {
                card_id: "r001".to_string(),
            },
            Reward::Coins { amount: 150 },
        ],
        _ => Vec::new(),
    }
}

/// Progression notice pushed to a participant after finalization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressionUpdate {
    /// New experience total.
    pub xp: u32,
    /// New level.
    pub new_level: u32,
    /// Experience required for the following level.
    pub xp_to_next_level: u32,
    /// New rating.
    pub rating: u32,
    /// Rewards granted by levels crossed in this update.
    pub rewards_granted: Vec<Reward>,
}

/// Settle one human participant's post-match progression.
///
/// Fetches the record, applies experience and any number of crossed level
/// thresholds (each crossed level grants its rewards immediately), applies
/// the rating delta floored at zero, persists everything, and returns the
/// notice to push to the participant.
pub fn settle_participant(
    store: &dyn PlayerStore,
    id: &ParticipantId,
    won: bool,
    versus_scripted: bool,
) -> ProgressionUpdate {
    let mut record = store.get(id);

    let xp_gained = match (won, versus_scripted) {
        (true, false) => XP_PER_WIN,
        (true, true) => XP_PER_SCRIPTED_WIN,
        (false, false) => XP_PER_LOSS,
        (false, true) => XP_PER_SCRIPTED_LOSS,
    };
    let rating_delta = if versus_scripted {
        0
    } else if won {
        RATING_DELTA_WIN
    } else {
        RATING_DELTA_LOSS
    };

    record.xp += xp_gained;

    let mut granted = Vec::new();
    while let Some(next) = threshold_for(record.level + 1) {
        if record.xp < next {
            break;
        }
        record.level += 1;
        for reward in rewards_for_level(record.level) {
            match &reward {
                Reward::Coins { amount } => record.coins += amount,
                Reward::Dust { amount } => record.dust += amount,
                Reward::SpecificCard { card_id } => {
                    if !record.owned_card_ids.contains(card_id) {
                        record.owned_card_ids.push(card_id.clone());
                    }
                }
            }
            granted.push(reward);
        }
    }

    record.xp_to_next_level = threshold_for(record.level + 1).unwrap_or(record.xp);
    record.rating = record.rating.saturating_add_signed(rating_delta);

    store.update(
        id,
        PlayerPatch {
            level: Some(record.level),
            xp: Some(record.xp),
            xp_to_next_level: Some(record.xp_to_next_level),
            rating: Some(record.rating),
            coins: Some(record.coins),
            dust: Some(record.dust),
            owned_card_ids: Some(record.owned_card_ids.clone()),
            ..Default::default()
        },
    );

    info!(
        participant = %id,
        won,
        versus_scripted,
        xp_gained,
        level = record.level,
        rating = record.rating,
        "settled post-match progression"
    );

    ProgressionUpdate {
        xp: record.xp,
        new_level: record.level,
        xp_to_next_level: record.xp_to_next_level,
        rating: record.rating,
        rewards_granted: granted,
    }
}
