//! Card Catalog
//!
//! The immutable lookup table of card definitions consumed read-only by the
//! match engine, plus the registry of on-play effects
//! ([`effects::EffectRegistry`]). Built once at startup; safe for
//! unsynchronized concurrent reads afterwards.

pub mod effects;

pub use effects::{EffectContext, EffectRegistry, OnPlayEffect};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Card rarity tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rarity {
    /// Baseline cards.
    Common,
    /// Uncommon cards.
    Rare,
    /// Strong cards.
    Epic,
    /// The headliners.
    Legendary,
}

/// Ability tags carried by card definitions.
///
/// Only tags, not behavior: `Charge` and `OnPlay` are interpreted by the
/// engine, `Taunt` by the scripted-opponent targeting heuristic, and the
/// rest are carried as data for clients. `LastBreath` secondary effects
/// are an extension point the board sweep does not yet dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbilityKind {
    /// Attacks should be directed at this minion while it defends.
    Taunt,
    /// May attack the turn it enters play.
    Charge,
    /// Negates the first instance of damage.
    DivineShield,
    /// Cannot be targeted until it attacks.
    Stealth,
    /// Triggers a registered effect when played from hand.
    OnPlay,
    /// Triggers a registered effect when destroyed.
    LastBreath,
}

/// Immutable definition of one card. Shared by reference, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardDefinition {
    /// Catalog identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Mana cost.
    pub cost: u32,
    /// Attack value. Absent for non-minion ("spell") cards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack: Option<i32>,
    /// Health value. Absent for non-minion cards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Ability tags.
    pub abilities: Vec<AbilityKind>,
    /// Flavor grouping ("Trader", "Scammer", ...).
    pub card_type: String,
}

impl CardDefinition {
    /// Minions carry an attack value; everything else is a spell.
    pub fn is_minion(&self) -> bool {
        self.attack.is_some()
    }

    /// Whether the definition carries a given ability tag.
    pub fn has_ability(&self, kind: AbilityKind) -> bool {
        self.abilities.contains(&kind)
    }
}

fn minion(
    id: &str,
    name: &str,
    cost: u32,
    attack: i32,
    health: i32,
    rarity: Rarity,
    abilities: &[AbilityKind],
    card_type: &str,
) -> CardDefinition {
    CardDefinition {
        id: id.to_string(),
        name: name.to_string(),
        cost,
        attack: Some(attack),
        health: Some(health),
        rarity,
        abilities: abilities.to_vec(),
        card_type: card_type.to_string(),
    }
}

fn spell(id: &str, name: &str, cost: u32, rarity: Rarity) -> CardDefinition {
    CardDefinition {
        id: id.to_string(),
        name: name.to_string(),
        cost,
        attack: None,
        health: None,
        rarity,
        abilities: vec![AbilityKind::OnPlay],
        card_type: "Spell".to_string(),
    }
}

/// Lookup table from card id to its definition, plus the effect registry.
pub struct CardCatalog {
    cards: HashMap<String, Arc<CardDefinition>>,
    effects: EffectRegistry,
}

impl CardCatalog {
    /// Build a catalog from explicit definitions and effects.
    pub fn new(definitions: Vec<CardDefinition>, effects: EffectRegistry) -> Self {
        let cards = definitions
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();
        Self { cards, effects }
    }

    /// The standard card pool with its standard effects.
    pub fn standard() -> Self {
        use AbilityKind::*;
        use Rarity::*;

        let pool = vec![
            minion("c001", "Noob Trader", 1, 1, 2, Common, &[], "Trader"),
            minion("c002", "Shill Bot", 2, 2, 1, Common, &[], "Bot"),
            minion("c003", "Doge Pup", 1, 1, 1, Common, &[], "Meme Coin"),
            minion("c004", "DeFi Degenerate", 3, 3, 3, Common, &[], "DeFi User"),
            minion("c005", "Chad Influencer", 2, 2, 2, Common, &[], "Influencer"),
            minion("c006", "Keyboard Warrior", 1, 1, 1, Common, &[Taunt], "DeFi User"),
            minion("c007", "NFT Bro", 3, 3, 2, Common, &[], "Investor"),
            minion("c008", "Liquidity Farmer", 2, 1, 3, Common, &[], "DeFi User"),
            minion("r001", "Diamond Hands Holder", 4, 2, 6, Rare, &[Taunt], "Investor"),
            minion("r002", "FOMO Buyer", 2, 3, 2, Rare, &[Charge], "Trader"),
            minion("r003", "Community Mod", 3, 1, 4, Rare, &[DivineShield], "Community Mod"),
            minion("r004", "Tapping Hamster", 3, 2, 2, Rare, &[OnPlay], "Crypto Critter"),
            minion("r005", "Telegram Channel Admin", 4, 3, 3, Rare, &[Stealth], "Community Mod"),
            minion("r009", "Concerned Citizen", 3, 1, 5, Rare, &[Taunt], "Community Mod"),
            minion("e001", "Smooth Scammer", 5, 4, 4, Epic, &[OnPlay], "Scammer"),
            minion("e002", "Rug Pull Rugrat", 4, 2, 1, Epic, &[LastBreath], "Scammer"),
            minion("l001", "Sleepy Joe King", 7, 6, 8, Legendary, &[Taunt], "Figurehead"),
            minion("l002", "Elongated Muskrat", 8, 7, 7, Legendary, &[Charge], "Visionary"),
            minion("l003", "Pavel Turov", 6, 5, 5, Legendary, &[OnPlay], "Founder"),
            spell("s001", "Flash Crash", 1, Common),
            spell("s002", "Pump It", 2, Rare),
        ];

        Self::new(pool, EffectRegistry::standard())
    }

    /// Look up a definition by card id.
    pub fn get(&self, id: &str) -> Option<&Arc<CardDefinition>> {
        self.cards.get(id)
    }

    /// The on-play effect registry.
    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    /// Card ids of the starter deck granted to new records and used by the
    /// scripted opponent.
    pub fn starter_deck(&self) -> Vec<String> {
        ["c001", "c002", "c003", "c004", "c005", "c006", "c007", "c008"]
            .iter()
            .filter(|id| self.cards.contains_key(**id))
            .map(|id| id.to_string())
            .collect()
    }

    /// Number of definitions in the catalog.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
