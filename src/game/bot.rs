//! Scripted Opponent
//!
//! A fixed heuristic, deterministic given the state. It is a baseline
//! opponent, not a solver: play the most expensive affordable card, then
//! attack with the first ready minion, then pass.

use crate::catalog::AbilityKind;
use crate::game::actions::{Action, TargetRef};
use crate::game::state::MatchState;
use crate::game::BOARD_CAPACITY;

/// Choose the scripted opponent's next action for the current state.
///
/// Priority order:
/// 1. the highest-cost affordable card whose type fits the remaining
///    board space;
/// 2. an attack with the first minion that has not attacked yet, aimed at
///    a taunt defender if one stands, else any enemy minion, else the
///    enemy hero;
/// 3. end the turn.
pub fn choose_action(state: &MatchState) -> Action {
    let acting = state.acting_slot();
    let me = state.participant(acting);
    let foe = state.participant(acting.other());

    let mut playable: Vec<_> = me
        .hand
        .iter()
        .filter(|c| c.cost() <= me.mana && (!c.is_minion() || me.board.len() < BOARD_CAPACITY))
        .collect();
    playable.sort_by(|a, b| b.cost().cmp(&a.cost()));
    if let Some(card) = playable.first() {
        return Action::PlayCard {
            card: card.instance_id,
            position: None,
            target: None,
        };
    }

    let ready_attacker = me
        .board
        .iter()
        .find(|m| !m.exhausted && m.attack().unwrap_or(0) > 0 && m.is_alive());
    if let Some(attacker) = ready_attacker {
        let taunt = foe
            .board
            .iter()
            .find(|m| m.has_ability(AbilityKind::Taunt) && m.is_alive());
        let target = if let Some(taunt) = taunt {
            TargetRef::Minion(taunt.instance_id)
        } else if let Some(any) = foe.board.iter().find(|m| m.is_alive()) {
            TargetRef::Minion(any.instance_id)
        } else {
            TargetRef::OpponentHero
        };
        return Action::Attack {
            attacker: attacker.instance_id,
            target,
        };
    }

    Action::EndTurn
}
