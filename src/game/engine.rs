//! Match State Machine
//!
//! The deterministic rules core: `initialize` builds the opening state and
//! `apply` advances it by one action. No I/O and no timers; randomness comes
//! in through the caller's RNG at initialization only.
//!
//! `apply` is total. An illegal action appends an explanatory line to the
//! match log and leaves the rest of the state untouched. The exclusive
//! `&mut` borrow guarantees successive states can never alias, which is the
//! observable contract clients rely on.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::{AbilityKind, CardCatalog, EffectContext};
use crate::game::actions::{Action, TargetRef};
use crate::game::state::{
    split_slots, CardInstance, DrawOutcome, InstanceId, MatchId, MatchState, OpponentKind,
    ParticipantId, ParticipantState, Slot,
};
use crate::game::{
    BOARD_CAPACITY, FIRST_MOVER_OPENING_HAND, MANA_CEILING, SECOND_MOVER_OPENING_HAND,
};

/// Initialization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Neither submitted deck resolved to a single known card.
    #[error("neither deck resolved to any usable cards")]
    NoUsableCards,
}

/// What a participant brings into `initialize`.
#[derive(Clone, Debug)]
pub struct ParticipantSetup {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Avatar reference, if any.
    pub avatar_url: Option<String>,
    /// Submitted deck as catalog card ids.
    pub deck_card_ids: Vec<String>,
}

/// Build the opening state of a match.
///
/// Deck card ids are resolved against the catalog (unknown ids are silently
/// dropped) and each deck is shuffled independently with an unbiased
/// permutation. The first mover opens with a smaller hand and 1 mana; the
/// second mover opens with an extra card and no mana until their first turn
/// begins.
pub fn initialize<R: Rng + ?Sized>(
    catalog: &CardCatalog,
    first: ParticipantSetup,
    second: ParticipantSetup,
    opponent_kind: OpponentKind,
    rng: &mut R,
) -> Result<MatchState, EngineError> {
    let mut deck_a = resolve_deck(catalog, &first.deck_card_ids);
    let mut deck_b = resolve_deck(catalog, &second.deck_card_ids);
    if deck_a.is_empty() && deck_b.is_empty() {
        return Err(EngineError::NoUsableCards);
    }
    deck_a.shuffle(rng);
    deck_b.shuffle(rng);

    let mut a = ParticipantState::new(first.id, first.name, first.avatar_url, deck_a);
    let mut b = ParticipantState::new(second.id, second.name, second.avatar_url, deck_b);

    for _ in 0..FIRST_MOVER_OPENING_HAND {
        if !a.deck.is_empty() {
            a.draw_card();
        }
    }
    for _ in 0..SECOND_MOVER_OPENING_HAND {
        if !b.deck.is_empty() {
            b.draw_card();
        }
    }

    a.max_mana = 1;
    a.mana = 1;

    let log = vec![format!(
        "Match started! {} vs {}. {} goes first.",
        a.name, b.name, a.name
    )];

    Ok(MatchState {
        match_id: MatchId::fresh(),
        current_turn: a.id.clone(),
        participants: [a, b],
        turn_number: 1,
        log,
        is_game_over: false,
        winner: None,
        opponent_kind,
    })
}

fn resolve_deck(
    catalog: &CardCatalog,
    card_ids: &[String],
) -> Vec<std::sync::Arc<crate::catalog::CardDefinition>> {
    card_ids
        .iter()
        .filter_map(|id| catalog.get(id).cloned())
        .collect()
}

/// Apply one action for the participant whose turn it is.
///
/// Total: never fails. Illegal actions log and leave the state unchanged;
/// after the match is over every action is rejected the same way.
pub fn apply(catalog: &CardCatalog, state: &mut MatchState, action: Action) {
    if state.is_game_over {
        state.push_log("Action attempted after the match ended.");
        return;
    }
    let acting = state.acting_slot();
    match action {
        Action::PlayCard {
            card,
            position,
            target,
        } => play_card(catalog, state, acting, card, position, target),
        Action::Attack { attacker, target } => attack(state, acting, attacker, target),
        Action::EndTurn => end_turn(state, acting),
    }
    check_winner(state);
}

/// Forfeit on behalf of a participant (disconnect, resignation).
///
/// Session-facing: not reachable through `apply` because it is not a
/// turn action. No-op once the match is already over.
pub fn concede(state: &mut MatchState, loser: &ParticipantId, reason: &str) {
    if state.is_game_over {
        return;
    }
    let Some(slot) = state.slot_of(loser) else {
        return;
    };
    let winner = slot.other();
    state.is_game_over = true;
    state.winner = Some(state.participants[winner.index()].id.clone());
    let line = format!(
        "{} forfeits ({reason}). {} wins by default.",
        state.participants[slot.index()].name,
        state.participants[winner.index()].name
    );
    state.push_log(line);
}

fn play_card(
    catalog: &CardCatalog,
    state: &mut MatchState,
    acting: Slot,
    card: InstanceId,
    position: Option<usize>,
    target: Option<TargetRef>,
) {
    let played = {
        let (actor, _) = split_slots(&mut state.participants, acting);
        let Some(index) = actor.hand_index(card) else {
            state
                .log
                .push(format!("{} tried to play a card that is not in hand.", actor.name));
            return;
        };
        let cost = actor.hand[index].cost();
        if actor.mana < cost {
            state.log.push(format!(
                "{} does not have enough mana for {} (needs {cost}, has {}).",
                actor.name,
                actor.hand[index].name(),
                actor.mana
            ));
            return;
        }
        let is_minion = actor.hand[index].is_minion();
        if is_minion && actor.board.len() >= BOARD_CAPACITY {
            state.log.push(format!(
                "{}'s board is full, cannot play {}.",
                actor.name,
                actor.hand[index].name()
            ));
            return;
        }

        actor.mana -= cost;
        let hand_copy = actor.hand.remove(index);
        // Fresh instance for the new zone; the hand copy's identity ends here.
        let mut played = CardInstance::from_definition(&hand_copy.definition);
        played.in_play = true;
        played.exhausted = !played.has_ability(AbilityKind::Charge);

        if is_minion {
            let at = position.unwrap_or(actor.board.len()).min(actor.board.len());
            state
                .log
                .push(format!("{} played minion {}.", actor.name, played.name()));
            actor.board.insert(at, played.clone());
        } else {
            state
                .log
                .push(format!("{} cast {}.", actor.name, played.name()));
        }
        played
    };

    if played.has_ability(AbilityKind::OnPlay) {
        if let Some(effect) = catalog.effects().on_play(played.card_id()) {
            let ctx = EffectContext {
                catalog,
                source: &played,
                target: target.as_ref(),
            };
            effect(&ctx, state, acting);
        }
    }
}

fn attack(state: &mut MatchState, acting: Slot, attacker_id: InstanceId, target: TargetRef) {
    let (actor, defender) = split_slots(&mut state.participants, acting);
    let actor_name = actor.name.clone();

    let Some(attacker) = actor
        .board
        .iter_mut()
        .find(|m| m.instance_id == attacker_id)
    else {
        state.log.push(format!(
            "{actor_name} tried to attack with a minion that is not on the board."
        ));
        return;
    };
    if attacker.exhausted || !attacker.is_alive() || attacker.attack().unwrap_or(0) <= 0 {
        state.log.push(format!(
            "{actor_name} tried to attack with an invalid or exhausted minion: {}.",
            attacker.name()
        ));
        return;
    }
    let power = attacker.attack().unwrap_or(0);

    match target {
        TargetRef::OwnHero => {
            state
                .log
                .push(format!("{actor_name} cannot attack their own hero."));
            return;
        }
        TargetRef::OpponentHero => {
            state.log.push(format!(
                "{actor_name}'s {} (Atk: {power}) attacks {}.",
                attacker.name(),
                defender.name
            ));
            defender.health -= power;
            attacker.exhausted = true;
        }
        TargetRef::Minion(target_id) => {
            let Some(target_minion) = defender
                .board
                .iter_mut()
                .find(|m| m.instance_id == target_id && m.is_alive())
            else {
                state
                    .log
                    .push(format!("{actor_name}'s target was not found or is invalid."));
                return;
            };
            state.log.push(format!(
                "{actor_name}'s {} (Atk: {power}) attacks {}.",
                attacker.name(),
                target_minion.name()
            ));
            target_minion.current_health = target_minion.current_health.map(|h| h - power);
            // Single-exchange retaliation, only from a survivor that can hit back.
            let retaliation = target_minion.attack().unwrap_or(0);
            if retaliation > 0 && target_minion.is_alive() {
                attacker.current_health = attacker.current_health.map(|h| h - retaliation);
                state.log.push(format!(
                    "{} retaliates for {retaliation} damage.",
                    target_minion.name()
                ));
            }
            attacker.exhausted = true;
        }
    }

    sweep_board(defender, &mut state.log);
    sweep_board(actor, &mut state.log);
}

fn sweep_board(participant: &mut ParticipantState, log: &mut Vec<String>) {
    let owner = participant.name.clone();
    participant.board.retain(|m| {
        if m.is_alive() {
            true
        } else {
            log.push(format!("{owner}'s {} was destroyed.", m.name()));
            false
        }
    });
}

fn end_turn(state: &mut MatchState, acting: Slot) {
    let next = acting.other();
    {
        let (actor, _) = split_slots(&mut state.participants, acting);
        state
            .log
            .push(format!("{} ended their turn.", actor.name));
    }

    state.current_turn = state.participants[next.index()].id.clone();
    // One full round has passed when control returns to the first mover.
    if next == Slot::A {
        state.turn_number += 1;
    }

    let incoming = state.participant_mut(next);
    incoming.max_mana = (incoming.max_mana + 1).min(MANA_CEILING);
    incoming.mana = incoming.max_mana;
    for minion in &mut incoming.board {
        minion.exhausted = false;
    }
    draw_and_log(state, next);

    let incoming = state.participant(next);
    let line = format!(
        "It's now {}'s turn (turn {}). Mana: {}/{}.",
        incoming.name, state.turn_number, incoming.mana, incoming.max_mana
    );
    state.push_log(line);
}

/// Draw one card for a slot and record the outcome in the match log.
pub(crate) fn draw_and_log(state: &mut MatchState, slot: Slot) {
    let line = {
        let participant = state.participant_mut(slot);
        match participant.draw_card() {
            DrawOutcome::Drew => format!("{} drew a card.", participant.name),
            DrawOutcome::Burned => {
                format!("{}'s hand is full, the drawn card was burned!", participant.name)
            }
            DrawOutcome::Burnout(damage) => format!(
                "{} is out of cards and takes {damage} burnout damage!",
                participant.name
            ),
        }
    };
    state.push_log(line);
}

fn check_winner(state: &mut MatchState) {
    if state.is_game_over {
        return;
    }
    // Slot A is checked first; on simultaneous lethal it is the loser.
    let loser = if state.participants[0].health <= 0 {
        Some(Slot::A)
    } else if state.participants[1].health <= 0 {
        Some(Slot::B)
    } else {
        None
    };
    let Some(loser) = loser else {
        return;
    };
    let winner = loser.other();
    state.is_game_over = true;
    state.winner = Some(state.participants[winner.index()].id.clone());
    let line = format!(
        "{} has been defeated! {} wins!",
        state.participants[loser.index()].name,
        state.participants[winner.index()].name
    );
    state.push_log(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CardDefinition, EffectRegistry, Rarity};
    use crate::game::STARTING_HEALTH;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(id: &str, name: &str, deck: &[&str]) -> ParticipantSetup {
        ParticipantSetup {
            id: ParticipantId::from(id),
            name: name.to_string(),
            avatar_url: None,
            deck_card_ids: deck.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn start(catalog: &CardCatalog, deck_a: &[&str], deck_b: &[&str]) -> MatchState {
        let mut rng = StdRng::seed_from_u64(7);
        initialize(
            catalog,
            setup("p1", "Alice", deck_a),
            setup("p2", "Bob", deck_b),
            OpponentKind::Human,
            &mut rng,
        )
        .unwrap()
    }

    /// Put a specific card straight into a hand, bypassing the deck.
    fn give_card(state: &mut MatchState, catalog: &CardCatalog, slot: Slot, id: &str) -> InstanceId {
        let instance = CardInstance::from_definition(catalog.get(id).unwrap());
        let iid = instance.instance_id;
        state.participant_mut(slot).hand.push(instance);
        iid
    }

    /// Put a specific minion straight onto a board, ready to attack.
    fn put_minion(
        state: &mut MatchState,
        catalog: &CardCatalog,
        slot: Slot,
        id: &str,
    ) -> InstanceId {
        let mut instance = CardInstance::from_definition(catalog.get(id).unwrap());
        instance.in_play = true;
        instance.exhausted = false;
        let iid = instance.instance_id;
        state.participant_mut(slot).board.push(instance);
        iid
    }

    #[test]
    fn initialize_deals_uneven_opening_hands() {
        let catalog = CardCatalog::standard();
        let deck: Vec<&str> = vec!["c001"; 8];
        let state = start(&catalog, &deck, &deck);

        assert_eq!(state.participants[0].hand.len(), FIRST_MOVER_OPENING_HAND);
        assert_eq!(state.participants[1].hand.len(), SECOND_MOVER_OPENING_HAND);
        assert_eq!(state.participants[0].mana, 1);
        assert_eq!(state.participants[0].max_mana, 1);
        assert_eq!(state.participants[1].mana, 0);
        assert_eq!(state.participants[1].max_mana, 0);
        assert_eq!(state.turn_number, 1);
        assert_eq!(state.current_turn, state.participants[0].id);
        assert!(!state.is_game_over);
    }

    #[test]
    fn initialize_drops_unknown_card_ids() {
        let catalog = CardCatalog::standard();
        let state = start(&catalog, &["c001", "bogus", "c002"], &["c001"]);
        let a = &state.participants[0];
        assert_eq!(a.deck.len() + a.hand.len(), 2);
    }

    #[test]
    fn initialize_rejects_two_empty_decks() {
        let catalog = CardCatalog::standard();
        let mut rng = StdRng::seed_from_u64(1);
        let result = initialize(
            &catalog,
            setup("p1", "Alice", &["bogus"]),
            setup("p2", "Bob", &[]),
            OpponentKind::Human,
            &mut rng,
        );
        assert!(matches!(result, Err(EngineError::NoUsableCards)));
    }

    #[test]
    fn play_card_deducts_mana_and_enters_board() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let card = give_card(&mut state, &catalog, Slot::A, "c001");

        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card,
                position: None,
                target: None,
            },
        );

        let a = &state.participants[0];
        assert_eq!(a.mana, 0);
        assert_eq!(a.board.len(), 1);
        assert!(a.board[0].in_play);
        // Zone transition mints a new identity.
        assert_ne!(a.board[0].instance_id, card);
        // No charge: enters play unable to attack.
        assert!(a.board[0].exhausted);
    }

    #[test]
    fn play_card_rejects_insufficient_mana() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let card = give_card(&mut state, &catalog, Slot::A, "l002");
        let hand_before = state.participants[0].hand.len();

        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card,
                position: None,
                target: None,
            },
        );

        let a = &state.participants[0];
        assert_eq!(a.hand.len(), hand_before);
        assert_eq!(a.mana, 1);
        assert!(a.board.is_empty());
        assert!(state.log.last().unwrap().contains("not have enough mana"));
    }

    #[test]
    fn play_card_rejects_unknown_instance() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card: InstanceId::fresh(),
                position: None,
                target: None,
            },
        );
        assert!(state.log.last().unwrap().contains("not in hand"));
    }

    #[test]
    fn play_card_rejects_full_board() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        for _ in 0..BOARD_CAPACITY {
            put_minion(&mut state, &catalog, Slot::A, "c003");
        }
        let card = give_card(&mut state, &catalog, Slot::A, "c001");

        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card,
                position: None,
                target: None,
            },
        );

        assert_eq!(state.participants[0].board.len(), BOARD_CAPACITY);
        assert!(state.log.last().unwrap().contains("board is full"));
    }

    #[test]
    fn charge_minion_enters_ready() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        state.participant_mut(Slot::A).mana = 10;
        let card = give_card(&mut state, &catalog, Slot::A, "r002");

        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card,
                position: None,
                target: None,
            },
        );

        assert!(!state.participants[0].board[0].exhausted);
    }

    #[test]
    fn spell_resolves_without_board_slot() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let card = give_card(&mut state, &catalog, Slot::A, "s001");

        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card,
                position: None,
                target: None,
            },
        );

        assert!(state.participants[0].board.is_empty());
        assert_eq!(
            state.participants[1].health,
            STARTING_HEALTH - 2,
            "Flash Crash deals 2 to the enemy hero"
        );
    }

    #[test]
    fn on_play_draw_effect_fires() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        state.participant_mut(Slot::A).mana = 10;
        let card = give_card(&mut state, &catalog, Slot::A, "r004");
        let hand_before = state.participants[0].hand.len();
        let deck_before = state.participants[0].deck.len();

        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card,
                position: None,
                target: None,
            },
        );

        let a = &state.participants[0];
        // Played one from hand, drew two.
        assert_eq!(a.hand.len(), hand_before - 1 + 2);
        assert_eq!(a.deck.len(), deck_before - 2);
    }

    #[test]
    fn attack_hero_reduces_health_and_exhausts() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let attacker = put_minion(&mut state, &catalog, Slot::A, "c004");

        apply(
            &catalog,
            &mut state,
            Action::Attack {
                attacker,
                target: TargetRef::OpponentHero,
            },
        );

        assert_eq!(state.participants[1].health, STARTING_HEALTH - 3);
        assert!(state.participants[0].board[0].exhausted);
    }

    #[test]
    fn attack_own_hero_is_rejected() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let attacker = put_minion(&mut state, &catalog, Slot::A, "c004");

        apply(
            &catalog,
            &mut state,
            Action::Attack {
                attacker,
                target: TargetRef::OwnHero,
            },
        );

        assert_eq!(state.participants[0].health, STARTING_HEALTH);
        assert!(!state.participants[0].board[0].exhausted);
        assert!(state.log.last().unwrap().contains("own hero"));
    }

    #[test]
    fn exhausted_minion_cannot_attack_twice() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let attacker = put_minion(&mut state, &catalog, Slot::A, "c004");

        for _ in 0..2 {
            apply(
                &catalog,
                &mut state,
                Action::Attack {
                    attacker,
                    target: TargetRef::OpponentHero,
                },
            );
        }

        // Second swing was rejected.
        assert_eq!(state.participants[1].health, STARTING_HEALTH - 3);
        assert!(state.log.last().unwrap().contains("exhausted"));
    }

    #[test]
    fn zero_attack_minion_cannot_attack() {
        let catalog = CardCatalog::new(
            vec![CardDefinition {
                id: "pacifist".into(),
                name: "Pacifist".into(),
                cost: 1,
                attack: Some(0),
                health: Some(2),
                rarity: Rarity::Common,
                abilities: vec![],
                card_type: "Test".into(),
            }],
            EffectRegistry::empty(),
        );
        let mut state = start(&catalog, &["pacifist"; 4], &["pacifist"; 4]);
        let attacker = put_minion(&mut state, &catalog, Slot::A, "pacifist");

        apply(
            &catalog,
            &mut state,
            Action::Attack {
                attacker,
                target: TargetRef::OpponentHero,
            },
        );

        assert_eq!(state.participants[1].health, STARTING_HEALTH);
    }

    #[test]
    fn retaliation_applies_only_when_defender_survives() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        // 3/3 attacks a 2/6: defender survives, attacker takes 2 back.
        let attacker = put_minion(&mut state, &catalog, Slot::A, "c004");
        let defender = put_minion(&mut state, &catalog, Slot::B, "r001");

        apply(
            &catalog,
            &mut state,
            Action::Attack {
                attacker,
                target: TargetRef::Minion(defender),
            },
        );

        let a_board = &state.participants[0].board;
        let b_board = &state.participants[1].board;
        assert_eq!(b_board[0].current_health, Some(3));
        assert_eq!(a_board[0].current_health, Some(1));
    }

    #[test]
    fn no_retaliation_from_a_dead_defender() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        // 3/3 attacks a 2/1: defender dies, no retaliation.
        let attacker = put_minion(&mut state, &catalog, Slot::A, "c004");
        let defender = put_minion(&mut state, &catalog, Slot::B, "c002");

        apply(
            &catalog,
            &mut state,
            Action::Attack {
                attacker,
                target: TargetRef::Minion(defender),
            },
        );

        assert!(state.participants[1].board.is_empty());
        assert_eq!(state.participants[0].board[0].current_health, Some(3));
        assert!(state.log.iter().any(|l| l.contains("was destroyed")));
    }

    #[test]
    fn retaliation_can_kill_the_attacker() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        // 1/1 attacks a 2/2: the survivor hits back and the attacker dies.
        let attacker = put_minion(&mut state, &catalog, Slot::A, "c003");
        let defender = put_minion(&mut state, &catalog, Slot::B, "c005");

        apply(
            &catalog,
            &mut state,
            Action::Attack {
                attacker,
                target: TargetRef::Minion(defender),
            },
        );

        assert!(state.participants[0].board.is_empty());
        assert_eq!(state.participants[1].board.len(), 1);
        assert_eq!(state.participants[1].board[0].current_health, Some(1));
    }

    #[test]
    fn lethal_attack_ends_the_match() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        state.participant_mut(Slot::B).health = 1;
        let attacker = put_minion(&mut state, &catalog, Slot::A, "c004");

        apply(
            &catalog,
            &mut state,
            Action::Attack {
                attacker,
                target: TargetRef::OpponentHero,
            },
        );

        assert!(state.is_game_over);
        assert_eq!(state.winner, Some(state.participants[0].id.clone()));
    }

    #[test]
    fn simultaneous_lethal_favors_slot_b() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        // Both heroes at zero after the same action: slot A is checked
        // first and loses.
        state.participant_mut(Slot::A).health = 0;
        state.participant_mut(Slot::B).health = 0;

        apply(&catalog, &mut state, Action::EndTurn);

        assert!(state.is_game_over);
        assert_eq!(state.winner, Some(state.participants[1].id.clone()));
    }

    #[test]
    fn end_turn_flips_control_and_grants_mana() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);

        apply(&catalog, &mut state, Action::EndTurn);

        assert_eq!(state.current_turn, state.participants[1].id);
        assert_eq!(state.turn_number, 1, "half a round does not advance the counter");
        assert_eq!(state.participants[1].max_mana, 1);
        assert_eq!(state.participants[1].mana, 1);
        assert_eq!(
            state.participants[1].hand.len(),
            SECOND_MOVER_OPENING_HAND + 1
        );

        apply(&catalog, &mut state, Action::EndTurn);

        assert_eq!(state.current_turn, state.participants[0].id);
        assert_eq!(state.turn_number, 2, "full round advances the counter");
        assert_eq!(state.participants[0].max_mana, 2);
    }

    #[test]
    fn end_turn_readies_minions() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let minion = put_minion(&mut state, &catalog, Slot::B, "c004");
        state.participant_mut(Slot::B).board[0].exhausted = true;

        apply(&catalog, &mut state, Action::EndTurn);

        let b = &state.participants[1];
        assert!(!b.board_card(minion).unwrap().exhausted);
    }

    #[test]
    fn max_mana_caps_at_ceiling() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        state.participant_mut(Slot::B).max_mana = MANA_CEILING;

        apply(&catalog, &mut state, Action::EndTurn);

        assert_eq!(state.participants[1].max_mana, MANA_CEILING);
        assert_eq!(state.participants[1].mana, MANA_CEILING);
    }

    #[test]
    fn burnout_escalates_across_rounds() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 3], &["c001"; 8]);
        // Slot A's deck is exhausted by the opening deal.
        assert!(state.participants[0].deck.is_empty());

        let mut damages = Vec::new();
        for _ in 0..3 {
            apply(&catalog, &mut state, Action::EndTurn); // to B
            let before = state.participants[0].health;
            apply(&catalog, &mut state, Action::EndTurn); // back to A, draws
            damages.push(before - state.participants[0].health);
        }
        assert_eq!(damages, vec![1, 2, 3]);
    }

    #[test]
    fn actions_after_game_over_do_not_mutate() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        state.participant_mut(Slot::B).health = 0;
        apply(&catalog, &mut state, Action::EndTurn);
        assert!(state.is_game_over);

        let frozen = state.clone();
        apply(&catalog, &mut state, Action::EndTurn);

        assert_eq!(state.current_turn, frozen.current_turn);
        assert_eq!(state.turn_number, frozen.turn_number);
        assert_eq!(state.participants[0].health, frozen.participants[0].health);
        assert_eq!(state.participants[1].health, frozen.participants[1].health);
        assert_eq!(state.participants[0].hand.len(), frozen.participants[0].hand.len());
        assert!(state.log.last().unwrap().contains("after the match ended"));
    }

    #[test]
    fn concede_assigns_win_to_the_other_side() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        let loser = state.participants[0].id.clone();

        concede(&mut state, &loser, "connection lost");

        assert!(state.is_game_over);
        assert_eq!(state.winner, Some(state.participants[1].id.clone()));
        assert!(state.log.last().unwrap().contains("wins by default"));
    }

    #[test]
    fn free_spell_scenario_plays_out() {
        // 1-card decks of a free spell: play it on each side, two EndTurns,
        // and the first mover's counter reads 2 with every zone empty.
        let catalog = CardCatalog::new(
            vec![CardDefinition {
                id: "free".into(),
                name: "Free Insight".into(),
                cost: 0,
                attack: None,
                health: None,
                rarity: Rarity::Common,
                abilities: vec![],
                card_type: "Spell".into(),
            }],
            EffectRegistry::empty(),
        );
        let mut state = start(&catalog, &["free"], &["free"]);

        let a_card = state.participants[0].hand[0].instance_id;
        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card: a_card,
                position: None,
                target: None,
            },
        );
        apply(&catalog, &mut state, Action::EndTurn);

        let b_card = state.participants[1].hand[0].instance_id;
        apply(
            &catalog,
            &mut state,
            Action::PlayCard {
                card: b_card,
                position: None,
                target: None,
            },
        );
        apply(&catalog, &mut state, Action::EndTurn);

        assert_eq!(state.turn_number, 2);
        for p in &state.participants {
            assert!(p.hand.is_empty());
            assert!(p.deck.is_empty());
            assert!(p.board.is_empty());
        }
    }

    #[test]
    fn board_never_exceeds_capacity() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        state.participant_mut(Slot::A).mana = MANA_CEILING;
        let cards: Vec<InstanceId> = (0..BOARD_CAPACITY + 3)
            .map(|_| give_card(&mut state, &catalog, Slot::A, "c003"))
            .collect();

        for card in cards {
            apply(
                &catalog,
                &mut state,
                Action::PlayCard {
                    card,
                    position: None,
                    target: None,
                },
            );
            assert!(state.participants[0].board.len() <= BOARD_CAPACITY);
        }
        assert_eq!(state.participants[0].board.len(), BOARD_CAPACITY);
    }

    #[test]
    fn played_mana_never_exceeds_max() {
        let catalog = CardCatalog::standard();
        let mut state = start(&catalog, &["c001"; 8], &["c001"; 8]);
        state.participant_mut(Slot::A).mana = 3;
        state.participant_mut(Slot::A).max_mana = 3;
        for id in ["c001", "c003", "c006", "c002"] {
            let card = give_card(&mut state, &catalog, Slot::A, id);
            apply(
                &catalog,
                &mut state,
                Action::PlayCard {
                    card,
                    position: None,
                    target: None,
                },
            );
        }
        // 1 + 1 + 1 spent, the 2-cost rejected at 0 mana.
        assert_eq!(state.participants[0].mana, 0);
        assert_eq!(state.participants[0].board.len(), 3);
    }
}
