//! On-Play Effect Registry
//!
//! Card-specific effects keyed by `(ability tag, card id)` instead of being
//! hardcoded into the engine's dispatch. Each effect is a pure mutation of
//! the match state for the acting side; the engine looks effects up and runs
//! them after the played card has resolved into its zone.

use std::collections::HashMap;

use crate::catalog::{AbilityKind, CardCatalog};
use crate::game::actions::TargetRef;
use crate::game::engine::draw_and_log;
use crate::game::state::{CardInstance, MatchState, Slot};
use crate::game::BOARD_CAPACITY;

/// Everything an effect may consult besides the match state.
pub struct EffectContext<'a> {
    /// The catalog, for effects that mint new instances.
    pub catalog: &'a CardCatalog,
    /// The played instance that triggered the effect.
    pub source: &'a CardInstance,
    /// Optional target submitted with the action.
    pub target: Option<&'a TargetRef>,
}

/// A card-specific effect: a pure transformation of the match state.
pub type OnPlayEffect = fn(&EffectContext<'_>, &mut MatchState, Slot);

/// Registry mapping `(ability tag, card id)` to an effect function.
pub struct EffectRegistry {
    entries: HashMap<(AbilityKind, String), OnPlayEffect>,
}

impl EffectRegistry {
    /// An empty registry (cards with effect tags simply fizzle).
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The effects of the standard card pool.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(AbilityKind::OnPlay, "r004", frantic_draw);
        registry.register(AbilityKind::OnPlay, "e001", summon_shill_bot);
        registry.register(AbilityKind::OnPlay, "l003", founders_rally);
        registry.register(AbilityKind::OnPlay, "s001", flash_crash);
        registry.register(AbilityKind::OnPlay, "s002", pump_it);
        registry
    }

    /// Register an effect for a card.
    pub fn register(&mut self, kind: AbilityKind, card_id: &str, effect: OnPlayEffect) {
        self.entries.insert((kind, card_id.to_string()), effect);
    }

    /// Effect triggered when the given card is played, if any.
    pub fn on_play(&self, card_id: &str) -> Option<OnPlayEffect> {
        self.entries
            .get(&(AbilityKind::OnPlay, card_id.to_string()))
            .copied()
    }
}

/// Tapping Hamster: draw 2 cards.
fn frantic_draw(_ctx: &EffectContext<'_>, state: &mut MatchState, acting: Slot) {
    for _ in 0..2 {
        draw_and_log(state, acting);
    }
}

/// Smooth Scammer: summon a Shill Bot, if there is room.
fn summon_shill_bot(ctx: &EffectContext<'_>, state: &mut MatchState, acting: Slot) {
    let Some(definition) = ctx.catalog.get("c002") else {
        return;
    };
    let actor = state.participant_mut(acting);
    if actor.board.len() >= BOARD_CAPACITY {
        return;
    }
    let mut summoned = CardInstance::from_definition(definition);
    summoned.in_play = true;
    summoned.exhausted = true;
    let line = format!("{} summoned a {}.", ctx.source.name(), summoned.name());
    actor.board.push(summoned);
    state.push_log(line);
}

/// Pavel Turov: give your other minions +1/+1.
fn founders_rally(ctx: &EffectContext<'_>, state: &mut MatchState, acting: Slot) {
    let source_id = ctx.source.instance_id;
    let actor = state.participant_mut(acting);
    let mut buffed = 0;
    for minion in actor
        .board
        .iter_mut()
        .filter(|m| m.instance_id != source_id)
    {
        minion.attack = minion.attack.map(|a| a + 1);
        minion.current_health = minion.current_health.map(|h| h + 1);
        minion.max_health = minion.max_health.map(|h| h + 1);
        buffed += 1;
    }
    if buffed > 0 {
        state.push_log(format!(
            "{} rallied {buffed} other friendly minion(s) with +1/+1.",
            ctx.source.name()
        ));
    }
}

/// Flash Crash: deal 2 damage to the enemy hero.
fn flash_crash(ctx: &EffectContext<'_>, state: &mut MatchState, acting: Slot) {
    let foe = state.participant_mut(acting.other());
    foe.health -= 2;
    let line = format!("{} dealt 2 damage to {}.", ctx.source.name(), foe.name);
    state.push_log(line);
}

/// Pump It: give a targeted friendly minion +2/+2.
fn pump_it(ctx: &EffectContext<'_>, state: &mut MatchState, acting: Slot) {
    let Some(TargetRef::Minion(target_id)) = ctx.target else {
        state.push_log(format!("{} fizzled with no target.", ctx.source.name()));
        return;
    };
    let actor = state.participant_mut(acting);
    let Some(minion) = actor
        .board
        .iter_mut()
        .find(|m| m.instance_id == *target_id && m.is_alive())
    else {
        let line = format!("{} fizzled: target not found.", ctx.source.name());
        state.push_log(line);
        return;
    };
    minion.attack = minion.attack.map(|a| a + 2);
    minion.current_health = minion.current_health.map(|h| h + 2);
    minion.max_health = minion.max_health.map(|h| h + 2);
    let line = format!("{} pumped {} by +2/+2.", ctx.source.name(), minion.name());
    state.push_log(line);
}
