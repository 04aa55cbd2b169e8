//! Summon lifecycle and companion handling through the public API.

use combat_core::{
    summon_cap, ActionRequest, Actor, CharacterSheet, CombatEngine, CombatState, CompanionMeta,
    Perk, SavedCombat, Skill,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn conjurer(twin_souls_rank: u8) -> CharacterSheet {
    let sheet = CharacterSheet::new("Conjurer", 12).with_skill(Skill::Conjuration, 30);
    if twin_souls_rank > 0 {
        sheet.with_perk_rank(Perk::TwinSouls, twin_souls_rank)
    } else {
        sheet
    }
}

/// Step non-player turns until the turn comes back to the player.
fn cycle_to_player(
    eng: &mut CombatEngine,
    state: &mut CombatState,
    player: &mut combat_core::PlayerStats,
    rng: &mut StdRng,
) {
    eng.resolve_with_rng(state, player, &ActionRequest::skip(), rng);
    let mut safety = 20;
    while !state.is_player_turn() && safety > 0 {
        eng.resolve_npc_turn_with_rng(state, player, rng);
        safety -= 1;
    }
    assert!(state.is_player_turn());
}

#[test]
fn the_cap_scales_with_twin_souls_and_rejects_at_no_cost() {
    assert_eq!(summon_cap(&conjurer(0)), 1);
    assert_eq!(summon_cap(&conjurer(1)), 2);
    assert_eq!(summon_cap(&conjurer(2)), 3);
    assert_eq!(summon_cap(&conjurer(9)), 3);

    let (mut eng, mut player) = CombatEngine::new(conjurer(1), Vec::new());
    let mut state = CombatState::new(vec![Actor::new("Draugr", 6, 500, 15, 1)], Vec::new());
    let mut rng = StdRng::seed_from_u64(9);

    for expected in 1..=2usize {
        let outcome = eng.resolve_with_rng(
            &mut state,
            &mut player,
            &ActionRequest::magic("conjure_familiar").with_roll(10),
            &mut rng,
        );
        assert!(!outcome.rejected);
        assert_eq!(state.allies.len(), expected);
        let mut safety = 20;
        while !state.is_player_turn() && safety > 0 {
            eng.resolve_npc_turn_with_rng(&mut state, &mut player, &mut rng);
            safety -= 1;
        }
    }

    let before = player.current_magicka;
    let third = eng.resolve_with_rng(
        &mut state,
        &mut player,
        &ActionRequest::magic("conjure_familiar").with_roll(10),
        &mut rng,
    );
    assert!(third.rejected);
    assert_eq!(state.allies.len(), 2);
    assert_eq!(player.current_magicka, before);
}

#[test]
fn an_expired_summon_decays_by_halving_until_it_is_gone() {
    let (mut eng, mut player) = CombatEngine::new(conjurer(0), Vec::new());
    let summon = Actor::new("Familiar", 12, 24, 0, 6)
        .with_companion_meta(CompanionMeta::summon("familiar", 1));
    let mut state = CombatState::new(
        vec![Actor::new("Draugr", 6, 500, 15, 1)],
        vec![summon],
    );
    let mut rng = StdRng::seed_from_u64(9);

    // First player-turn start: the countdown hits zero; health untouched.
    cycle_to_player(&mut eng, &mut state, &mut player, &mut rng);
    let meta = state.allies[0].companion_meta.as_ref().unwrap();
    assert_eq!(meta.player_turns_remaining, 0);
    assert!(meta.decay_active);
    assert_eq!(state.allies[0].current_health, 24);

    // Then 24 -> 12 -> 6 -> 3 -> 1 -> gone, one halving per player turn.
    for expected in [12, 6, 3, 1] {
        cycle_to_player(&mut eng, &mut state, &mut player, &mut rng);
        assert_eq!(state.allies[0].current_health, expected);
    }
    cycle_to_player(&mut eng, &mut state, &mut player, &mut rng);
    assert!(state.allies.is_empty());
}

#[test]
fn auto_control_false_survives_turns_and_saves() {
    let (mut eng, mut player) = CombatEngine::new(conjurer(0), Vec::new());
    let mut held = Actor::new("Lydia", 12, 150, 20, 12)
        .with_companion_meta(CompanionMeta::companion("lydia"));
    held.companion_meta.as_mut().unwrap().auto_control = false;

    let mut state = CombatState::new(vec![Actor::new("Draugr", 6, 500, 15, 1)], vec![held]);
    let mut rng = StdRng::seed_from_u64(9);

    // Lydia's turn comes up; she holds position instead of acting.
    eng.resolve_with_rng(&mut state, &mut player, &ActionRequest::skip(), &mut rng);
    let lines = eng.resolve_npc_turn_with_rng(&mut state, &mut player, &mut rng);
    assert!(lines.iter().any(|l| l.contains("holds position")));
    assert_eq!(state.enemies[0].current_health, 500);

    // The flag survives a save round trip verbatim.
    let json = SavedCombat::new(state, player).to_json().unwrap();
    let loaded = SavedCombat::from_json(&json).unwrap();
    let meta = loaded.state.allies[0].companion_meta.as_ref().unwrap();
    assert!(!meta.auto_control);
    assert!(!meta.is_summon);
}

#[test]
fn a_controlled_companion_attacks_the_weakest_enemy() {
    let (mut eng, mut player) = CombatEngine::new(conjurer(0), Vec::new());
    let companion = Actor::new("Lydia", 12, 150, 20, 12)
        .with_companion_meta(CompanionMeta::companion("lydia"));
    let mut strong = Actor::new("Draugr", 6, 400, 0, 1);
    strong.name = "Draugr Overlord".into();
    let mut weak = Actor::new("Draugr", 6, 40, 0, 1);
    weak.current_health = 20;
    let weak_id = weak.id;
    let mut state = CombatState::new(vec![strong, weak], vec![companion]);
    let mut rng = StdRng::seed_from_u64(2);

    eng.resolve_with_rng(&mut state, &mut player, &ActionRequest::skip(), &mut rng);
    eng.resolve_npc_turn_with_rng(&mut state, &mut player, &mut rng);
    let weak_after = state
        .enemies
        .iter()
        .find(|e| e.id == weak_id)
        .map(|e| e.current_health)
        .unwrap();
    let strong_after = state
        .enemies
        .iter()
        .find(|e| e.name == "Draugr Overlord")
        .map(|e| e.current_health)
        .unwrap();
    assert_eq!(strong_after, 400);
    assert!(weak_after <= 20);
}
