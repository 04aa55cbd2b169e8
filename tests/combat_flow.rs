//! End-to-end combat flow through the public API.

use combat_core::{
    ActionRequest, Actor, ActiveEffect, CharacterSheet, CombatEngine, CombatResult, CombatState,
    Effect, ItemKind, ItemRecord, LogKind,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sword() -> ItemRecord {
    ItemRecord::new("Steel Sword", ItemKind::Weapon)
        .with_damage(10)
        .equipped()
}

fn engine() -> (CombatEngine, combat_core::PlayerStats) {
    CombatEngine::new(CharacterSheet::new("Adventurer", 10), vec![sword()])
}

#[test]
fn three_skeevers_get_numbered_names() {
    let skeever = || Actor::new("Skeever", 1, 15, 0, 4);
    let state = CombatState::new(vec![skeever(), skeever(), skeever()], Vec::new());
    let names: Vec<&str> = state.enemies.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Skeever 1", "Skeever 2", "Skeever 3"]);
}

#[test]
fn a_full_round_returns_to_the_player() {
    let (mut eng, mut player) = engine();
    let mut state = CombatState::new(
        vec![Actor::new("Wolf", 3, 200, 0, 2), Actor::new("Wolf", 3, 200, 0, 2)],
        Vec::new(),
    );
    let mut rng = StdRng::seed_from_u64(1);

    let outcome = eng.resolve_with_rng(
        &mut state,
        &mut player,
        &ActionRequest::attack("attack").with_roll(10),
        &mut rng,
    );
    assert!(!outcome.rejected);
    assert!(!state.is_player_turn());

    // Both wolves act, then the turn comes back around.
    eng.resolve_npc_turn_with_rng(&mut state, &mut player, &mut rng);
    eng.resolve_npc_turn_with_rng(&mut state, &mut player, &mut rng);
    assert!(state.is_player_turn());
    assert_eq!(state.turn, 4);
    assert_eq!(state.result, CombatResult::Active);
}

#[test]
fn a_stunned_turn_is_skipped_without_consuming_a_roll() {
    let (mut eng, mut player) = engine();
    let mut state = CombatState::new(vec![Actor::new("Wolf", 3, 30, 0, 5)], Vec::new());
    let mut rng = StdRng::seed_from_u64(1);
    state.player_effects.push(ActiveEffect::new(Effect::Stun, 1));

    let outcome = eng.resolve_with_rng(
        &mut state,
        &mut player,
        &ActionRequest::attack("attack").with_roll(20),
        &mut rng,
    );
    assert!(!outcome.rejected);
    assert_eq!(outcome.roll, None);
    assert_eq!(state.enemies[0].current_health, 30);
    assert!(state.log.iter().any(|e| e.kind == LogKind::Stunned && e.roll.is_none()));
}

#[test]
fn killing_the_last_enemy_ends_the_combat() {
    let (mut eng, mut player) = engine();
    let mut state = CombatState::new(vec![Actor::new("Skeever", 1, 8, 0, 3)], Vec::new());
    let mut rng = StdRng::seed_from_u64(1);

    let outcome = eng.resolve_with_rng(
        &mut state,
        &mut player,
        &ActionRequest::attack("attack").with_roll(10),
        &mut rng,
    );
    assert!(outcome.narrative.contains("falls"));
    assert_eq!(state.result, CombatResult::Victory);
}

#[test]
fn resolving_out_of_turn_is_a_soft_rejection() {
    let (mut eng, mut player) = engine();
    let mut state = CombatState::new(vec![Actor::new("Wolf", 3, 200, 0, 2)], Vec::new());
    let mut rng = StdRng::seed_from_u64(1);
    eng.resolve_with_rng(&mut state, &mut player, &ActionRequest::skip(), &mut rng);
    assert!(!state.is_player_turn());

    let outcome = eng.resolve_with_rng(
        &mut state,
        &mut player,
        &ActionRequest::attack("attack"),
        &mut rng,
    );
    assert!(outcome.rejected);
    assert!(!outcome.narrative.is_empty());
}

#[test]
fn a_dot_from_a_spell_ticks_on_the_victims_turn() {
    let sheet = CharacterSheet::new("Mage", 10).with_skill(combat_core::Skill::Destruction, 30);
    let (mut eng, mut player) = CombatEngine::new(sheet, Vec::new());
    let mut state = CombatState::new(vec![Actor::new("Wolf", 3, 200, 0, 2)], Vec::new());
    let mut rng = StdRng::seed_from_u64(1);

    eng.resolve_with_rng(
        &mut state,
        &mut player,
        &ActionRequest::magic("firebolt").with_roll(10),
        &mut rng,
    );
    // 18 from the bolt, plus the first burn tick at the start of the
    // wolf's turn (the cast's resolution advanced the turn to it).
    assert_eq!(state.enemies[0].current_health, 200 - 18 - 3);
    assert!(!state.enemies[0].active_effects.is_empty());

    // Another full round: the burn ticks again when the wolf's next turn
    // starts.
    eng.resolve_npc_turn_with_rng(&mut state, &mut player, &mut rng);
    eng.resolve_with_rng(&mut state, &mut player, &ActionRequest::skip(), &mut rng);
    assert_eq!(state.enemies[0].current_health, 200 - 18 - 3 - 3);
}
