//! Match State Definitions
//!
//! All state types for a running match. Everything here is plain data:
//! no I/O, no timers. The engine (`game::engine`) is the only writer.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{AbilityKind, CardDefinition};
use crate::game::HAND_CAPACITY;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Persistent participant identifier.
///
/// Participants are identified by opaque strings minted outside the server
/// (an account id, or a generated id for scripted opponents).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier of one card copy in a hand or on a board.
///
/// A new one is minted on every zone transition; instance ids never
/// survive a move between zones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Mint a fresh instance id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an already-parsed UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique match identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(Uuid);

impl MatchId {
    /// Mint a fresh match id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// SLOTS
// =============================================================================

/// Which of the two fixed participant slots. Slot A always holds the
/// first mover for the lifetime of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// First mover.
    A,
    /// Second mover.
    B,
}

impl Slot {
    /// The opposite slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    /// Array index for this slot.
    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// What kind of opponent slot B holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentKind {
    /// Two humans.
    Human,
    /// One human versus the scripted opponent.
    Scripted,
}

// =============================================================================
// CARD INSTANCE
// =============================================================================

/// A concrete copy of a card definition in a hand or on a board.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardInstance {
    /// Unique per-copy identifier.
    pub instance_id: InstanceId,
    /// The immutable definition this copy was minted from.
    pub definition: Arc<CardDefinition>,
    /// Attack value (minions only). Starts from the definition; buffs
    /// modify the instance, never the definition.
    pub attack: Option<i32>,
    /// Current health (minions only).
    pub current_health: Option<i32>,
    /// Maximum health (minions only).
    pub max_health: Option<i32>,
    /// Whether this copy has entered play.
    pub in_play: bool,
    /// Whether this copy has already attacked this turn.
    pub exhausted: bool,
}

impl CardInstance {
    /// Mint a fresh instance of a definition with full health.
    pub fn from_definition(definition: &Arc<CardDefinition>) -> Self {
        Self {
            instance_id: InstanceId::fresh(),
            definition: Arc::clone(definition),
            attack: definition.attack,
            current_health: definition.health,
            max_health: definition.health,
            in_play: false,
            exhausted: false,
        }
    }

    /// Catalog id of the underlying definition.
    pub fn card_id(&self) -> &str {
        &self.definition.id
    }

    /// Display name of the underlying definition.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Mana cost.
    pub fn cost(&self) -> u32 {
        self.definition.cost
    }

    /// Attack value, if this is a minion.
    pub fn attack(&self) -> Option<i32> {
        self.attack
    }

    /// Minions carry an attack value; everything else resolves as a spell.
    pub fn is_minion(&self) -> bool {
        self.definition.attack.is_some()
    }

    /// Whether the instance carries a given ability.
    pub fn has_ability(&self, kind: AbilityKind) -> bool {
        self.definition.has_ability(kind)
    }

    /// A minion is alive while its current health is positive.
    pub fn is_alive(&self) -> bool {
        self.current_health.is_some_and(|h| h > 0)
    }
}

// =============================================================================
// PARTICIPANT STATE
// =============================================================================

/// Outcome of drawing one card.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// A card moved from deck to hand.
    Drew,
    /// The hand was at capacity; the drawn card was discarded.
    Burned,
    /// The deck was empty; the participant took this much burnout damage.
    Burnout(u32),
}

/// One side of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantState {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Avatar reference, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Current hero health.
    pub health: i32,
    /// Maximum hero health.
    pub max_health: i32,
    /// Mana available this turn.
    pub mana: u32,
    /// Mana refilled at the start of each of this participant's turns.
    pub max_mana: u32,
    /// Remaining deck, in draw order.
    pub deck: Vec<Arc<CardDefinition>>,
    /// Cards in hand, in order.
    pub hand: Vec<CardInstance>,
    /// Minions on the board, in order.
    pub board: Vec<CardInstance>,
    /// Escalating empty-deck draw damage counter. Never decreases.
    pub burnout: u32,
}

impl ParticipantState {
    /// Build a participant with full health and an empty hand.
    pub fn new(
        id: ParticipantId,
        name: String,
        avatar_url: Option<String>,
        deck: Vec<Arc<CardDefinition>>,
    ) -> Self {
        Self {
            id,
            name,
            avatar_url,
            health: crate::game::STARTING_HEALTH,
            max_health: crate::game::STARTING_HEALTH,
            mana: 0,
            max_mana: 0,
            deck,
            hand: Vec::new(),
            board: Vec::new(),
            burnout: 0,
        }
    }

    /// Draw one card from the top of the deck.
    ///
    /// A full hand burns the drawn card instead of exceeding the cap.
    /// An empty deck inflicts burnout damage that escalates 1, 2, 3, ...
    /// on every empty draw for the rest of the match.
    pub fn draw_card(&mut self) -> DrawOutcome {
        if self.hand.len() >= HAND_CAPACITY {
            if !self.deck.is_empty() {
                self.deck.remove(0);
            }
            return DrawOutcome::Burned;
        }
        if self.deck.is_empty() {
            self.burnout += 1;
            self.health -= self.burnout as i32;
            return DrawOutcome::Burnout(self.burnout);
        }
        let definition = self.deck.remove(0);
        self.hand.push(CardInstance::from_definition(&definition));
        DrawOutcome::Drew
    }

    /// Position of a card in hand by instance id.
    pub fn hand_index(&self, instance: InstanceId) -> Option<usize> {
        self.hand.iter().position(|c| c.instance_id == instance)
    }

    /// Look up a board minion by instance id.
    pub fn board_card(&self, instance: InstanceId) -> Option<&CardInstance> {
        self.board.iter().find(|c| c.instance_id == instance)
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Full authoritative state of one match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Match identifier.
    pub match_id: MatchId,
    /// The two sides. Index 0 is slot A (the first mover) for the whole match.
    pub participants: [ParticipantState; 2],
    /// Id of the participant whose turn it is.
    pub current_turn: ParticipantId,
    /// Advances once per full round, when control returns to slot A.
    pub turn_number: u32,
    /// Append-only human-readable event log.
    pub log: Vec<String>,
    /// Once set, no further action mutates health, mana, hand, board, or turn.
    pub is_game_over: bool,
    /// Winner, set together with `is_game_over` when a hero falls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<ParticipantId>,
    /// Whether slot B is scripted.
    pub opponent_kind: OpponentKind,
}

impl MatchState {
    /// Slot holding the given participant id.
    pub fn slot_of(&self, id: &ParticipantId) -> Option<Slot> {
        if self.participants[0].id == *id {
            Some(Slot::A)
        } else if self.participants[1].id == *id {
            Some(Slot::B)
        } else {
            None
        }
    }

    /// Slot of the participant whose turn it is.
    pub fn acting_slot(&self) -> Slot {
        if self.participants[0].id == self.current_turn {
            Slot::A
        } else {
            Slot::B
        }
    }

    /// The participant in a slot.
    pub fn participant(&self, slot: Slot) -> &ParticipantState {
        &self.participants[slot.index()]
    }

    /// Mutable access to the participant in a slot.
    pub fn participant_mut(&mut self, slot: Slot) -> &mut ParticipantState {
        &mut self.participants[slot.index()]
    }

    /// Append a line to the match log.
    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }
}

/// Split the participant pair into (acting, other) mutable references.
pub fn split_slots(
    participants: &mut [ParticipantState; 2],
    acting: Slot,
) -> (&mut ParticipantState, &mut ParticipantState) {
    let [a, b] = participants;
    match acting {
        Slot::A => (a, b),
        Slot::B => (b, a),
    }
}
