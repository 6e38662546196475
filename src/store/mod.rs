//! Player Store
//!
//! The external collaborator holding persistent player records. The match
//! core only depends on the [`PlayerStore`] trait; [`MemoryStore`] is the
//! in-process reference implementation used by the server binary and the
//! test suite. Reads are read-your-writes; concurrent updates to the same
//! participant serialize on the store's lock, last writer wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CardCatalog;
use crate::game::ParticipantId;

/// Rating granted to brand-new records.
pub const INITIAL_RATING: u32 = 1000;

/// A constructed deck in a player record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deck {
    /// Deck identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Catalog card ids, in deck order.
    pub card_ids: Vec<String>,
    /// Whether this is the deck used for matches.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Persistent state of one player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Avatar reference, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Progression level, starting at 1.
    pub level: u32,
    /// Lifetime experience.
    pub xp: u32,
    /// Experience required for the next level.
    pub xp_to_next_level: u32,
    /// Matchmaking rating.
    pub rating: u32,
    /// Soft currency balance.
    pub coins: u32,
    /// Crafting dust balance.
    pub dust: u32,
    /// Owned catalog card ids.
    pub owned_card_ids: Vec<String>,
    /// Constructed decks.
    pub decks: Vec<Deck>,
}

impl PlayerRecord {
    /// The deck flagged active, if any.
    pub fn active_deck(&self) -> Option<&Deck> {
        self.decks.iter().find(|d| d.is_active)
    }
}

/// Partial update applied to a record; `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct PlayerPatch {
    /// New level.
    pub level: Option<u32>,
    /// New experience total.
    pub xp: Option<u32>,
    /// New next-level threshold.
    pub xp_to_next_level: Option<u32>,
    /// New rating.
    pub rating: Option<u32>,
    /// New coin balance.
    pub coins: Option<u32>,
    /// New dust balance.
    pub dust: Option<u32>,
    /// Replacement owned-card list.
    pub owned_card_ids: Option<Vec<String>>,
    /// Replacement deck list.
    pub decks: Option<Vec<Deck>>,
}

/// Interface the match core uses to read and update player records.
pub trait PlayerStore: Send + Sync {
    /// Fetch a record, creating a starter record on first access.
    fn get(&self, id: &ParticipantId) -> PlayerRecord;

    /// Apply a partial update. Returns the updated record, or `None` when
    /// no record exists for the id.
    fn update(&self, id: &ParticipantId, patch: PlayerPatch) -> Option<PlayerRecord>;
}

/// In-memory store backed by a mutex-guarded map.
pub struct MemoryStore {
    catalog: Arc<CardCatalog>,
    players: Mutex<HashMap<ParticipantId, PlayerRecord>>,
}

impl MemoryStore {
    /// Build an empty store that seeds starter records from the catalog.
    pub fn new(catalog: Arc<CardCatalog>) -> Self {
        Self {
            catalog,
            players: Mutex::new(HashMap::new()),
        }
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<ParticipantId, PlayerRecord>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn starter_record(&self, id: &ParticipantId) -> PlayerRecord {
        let starter_cards = self.catalog.starter_deck();
        let now = Utc::now();
        let deck = Deck {
            id: format!("deck_{id}_1"),
            name: "Starter Deck".to_string(),
            card_ids: starter_cards.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let short: String = id.as_str().chars().take(5).collect();
        PlayerRecord {
            id: id.clone(),
            name: format!("Player {short}"),
            avatar_url: None,
            level: 1,
            xp: 0,
            xp_to_next_level: 100,
            rating: INITIAL_RATING,
            coins: 0,
            dust: 0,
            owned_card_ids: starter_cards,
            decks: vec![deck],
        }
    }
}

impl PlayerStore for MemoryStore {
    fn get(&self, id: &ParticipantId) -> PlayerRecord {
        let mut players = self.locked();
        players
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(participant = %id, "creating starter record");
                self.starter_record(id)
            })
            .clone()
    }

    fn update(&self, id: &ParticipantId, patch: PlayerPatch) -> Option<PlayerRecord> {
        let mut players = self.locked();
        let record = players.get_mut(id)?;
        if let Some(level) = patch.level {
            record.level = level;
        }
        if let Some(xp) = patch.xp {
            record.xp = xp;
        }
        if let Some(threshold) = patch.xp_to_next_level {
            record.xp_to_next_level = threshold;
        }
        if let Some(rating) = patch.rating {
            record.rating = rating;
        }
        if let Some(coins) = patch.coins {
            record.coins = coins;
        }
        if let Some(dust) = patch.dust {
            record.dust = dust;
        }
        if let Some(owned) = patch.owned_card_ids {
            record.owned_card_ids = owned;
        }
        if let Some(decks) = patch.decks {
            record.decks = decks;
        }
        Some(record.clone())
    }
}
