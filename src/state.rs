//! Combat state tracking and turn advancement.
//!
//! Turn order is a fixed cyclic sequence established at combat start.
//! Advancing a turn ticks effects on the outgoing actor, moves to the next
//! living actor, and applies turn-start processing (damage-over-time,
//! summon decay, regeneration, guard decrement, misclassification
//! normalization) before re-checking for combat end.

use crate::abilities::PlayerStats;
use crate::actor::{Actor, ActorId};
use crate::effects::{self, ActiveEffect};
use crate::rewards::{LootItem, RewardBundle};
use crate::summons;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Assumed wall-clock length of one logical turn, for scaling per-second
/// regeneration rates.
pub const TURN_SECONDS: f64 = 6.0;

/// A slot in the cyclic turn order. The player is tracked separately from
/// the actor lists, so it gets its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnSlot {
    Player,
    Actor(ActorId),
}

/// Terminal state of a combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CombatResult {
    #[default]
    Active,
    Victory,
    Defeat,
    Fled,
}

/// Category of a combat log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Attack,
    Defend,
    Magic,
    Item,
    Skip,
    Stunned,
    Summon,
    Regen,
    Effect,
    System,
}

/// One append-only combat log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub turn: u32,
    pub actor: String,
    pub kind: LogKind,
    /// The outcome roll behind this entry, when one was consumed.
    pub roll: Option<u8>,
    pub message: String,
}

/// A snapshot of an ongoing combat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    /// Monotonic turn counter.
    pub turn: u32,
    pub turn_order: Vec<TurnSlot>,
    pub turn_index: usize,
    pub enemies: Vec<Actor>,
    pub allies: Vec<Actor>,
    pub log: Vec<LogEntry>,
    /// Ability id → remaining cooldown turns (player abilities).
    #[serde(default)]
    pub ability_cooldowns: HashMap<String, u32>,
    /// Effects active on the player.
    #[serde(default)]
    pub player_effects: Vec<ActiveEffect>,
    #[serde(default)]
    pub player_defending: bool,
    #[serde(default)]
    pub guard_rounds_remaining: u32,
    /// Tactical Guard is once per combat.
    #[serde(default)]
    pub player_guard_used: bool,
    /// Boss reinforcement auto-summon is once per combat.
    #[serde(default)]
    pub boss_summon_used: bool,
    #[serde(default)]
    pub flee_allowed: bool,
    #[serde(default)]
    pub surrender_allowed: bool,
    #[serde(default)]
    pub pending_loot: Vec<LootItem>,
    #[serde(default)]
    pub pending_rewards: Option<RewardBundle>,
    #[serde(default)]
    pub result: CombatResult,
}

impl CombatState {
    /// Initialize a combat. Enemy display names are made pairwise unique
    /// and the cyclic turn order is fixed as player → allies → enemies.
    pub fn new(mut enemies: Vec<Actor>, allies: Vec<Actor>) -> Self {
        disambiguate_names(&mut enemies);

        let mut turn_order = vec![TurnSlot::Player];
        turn_order.extend(allies.iter().map(|a| TurnSlot::Actor(a.id)));
        turn_order.extend(enemies.iter().map(|e| TurnSlot::Actor(e.id)));

        Self {
            turn: 1,
            turn_order,
            turn_index: 0,
            enemies,
            allies,
            log: Vec::new(),
            ability_cooldowns: HashMap::new(),
            player_effects: Vec::new(),
            player_defending: false,
            guard_rounds_remaining: 0,
            player_guard_used: false,
            boss_summon_used: false,
            flee_allowed: true,
            surrender_allowed: false,
            pending_loot: Vec::new(),
            pending_rewards: None,
            result: CombatResult::Active,
        }
    }

    pub fn with_flee_allowed(mut self, allowed: bool) -> Self {
        self.flee_allowed = allowed;
        self
    }

    pub fn with_surrender_allowed(mut self, allowed: bool) -> Self {
        self.surrender_allowed = allowed;
        self
    }

    pub fn current_slot(&self) -> TurnSlot {
        self.turn_order
            .get(self.turn_index)
            .copied()
            .unwrap_or(TurnSlot::Player)
    }

    pub fn is_player_turn(&self) -> bool {
        self.current_slot() == TurnSlot::Player
    }

    /// Find an actor in either list.
    pub fn find_actor(&self, id: ActorId) -> Option<&Actor> {
        self.allies
            .iter()
            .chain(self.enemies.iter())
            .find(|a| a.id == id)
    }

    pub fn find_actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.allies
            .iter_mut()
            .chain(self.enemies.iter_mut())
            .find(|a| a.id == id)
    }

    pub fn is_enemy(&self, id: ActorId) -> bool {
        self.enemies.iter().any(|e| e.id == id)
    }

    pub fn is_ally(&self, id: ActorId) -> bool {
        self.allies.iter().any(|a| a.id == id)
    }

    /// Friendly display name for narration; never a raw id.
    pub fn display_name(&self, id: ActorId) -> String {
        self.find_actor(id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "someone".to_string())
    }

    pub fn living_enemies(&self) -> impl Iterator<Item = &Actor> {
        self.enemies.iter().filter(|e| e.is_alive())
    }

    pub fn living_allies(&self) -> impl Iterator<Item = &Actor> {
        self.allies.iter().filter(|a| a.is_alive())
    }

    pub fn push_log(
        &mut self,
        kind: LogKind,
        actor: impl Into<String>,
        roll: Option<u8>,
        message: impl Into<String>,
    ) {
        self.log.push(LogEntry {
            turn: self.turn,
            actor: actor.into(),
            kind,
            roll,
            message: message.into(),
        });
    }

    /// Advance to the next living actor's turn, applying in order: effect
    /// decrement on the outgoing actor, summon decay and guard decrement
    /// (player-turn start only), damage-over-time, per-turn regeneration,
    /// and enemy/ally misclassification normalization.
    pub fn advance_turn(&mut self, player: &mut PlayerStats) {
        if self.result != CombatResult::Active {
            return;
        }

        // Effect decrement on the actor whose turn is ending.
        match self.current_slot() {
            TurnSlot::Player => {
                effects::tick_effects(&mut self.player_effects);
            }
            TurnSlot::Actor(id) => {
                if let Some(actor) = self.find_actor_mut(id) {
                    effects::tick_effects(&mut actor.active_effects);
                }
            }
        }

        self.turn += 1;
        self.advance_to_next_living();

        match self.current_slot() {
            TurnSlot::Player => self.player_turn_start(player),
            TurnSlot::Actor(id) => self.actor_turn_start(id),
        }

        self.normalize_misclassified();
        self.check_combat_end(player);
    }

    /// Move the turn index to the next living slot, then drop dead slots
    /// from the cyclic order.
    fn advance_to_next_living(&mut self) {
        let n = self.turn_order.len();
        if n == 0 {
            self.turn_order.push(TurnSlot::Player);
            self.turn_index = 0;
            return;
        }
        let mut chosen = TurnSlot::Player;
        for step in 1..=n {
            let idx = (self.turn_index + step) % n;
            match self.turn_order[idx] {
                TurnSlot::Player => {
                    chosen = TurnSlot::Player;
                    break;
                }
                TurnSlot::Actor(id) => {
                    if self.find_actor(id).map(|a| a.is_alive()).unwrap_or(false) {
                        chosen = TurnSlot::Actor(id);
                        break;
                    }
                }
            }
        }

        // Dead actors never survive in the order past this sweep.
        let enemies = &self.enemies;
        let allies = &self.allies;
        self.turn_order.retain(|slot| match slot {
            TurnSlot::Player => true,
            TurnSlot::Actor(id) => allies
                .iter()
                .chain(enemies.iter())
                .any(|a| a.id == *id && a.is_alive()),
        });
        self.turn_index = self
            .turn_order
            .iter()
            .position(|s| *s == chosen)
            .unwrap_or(0);
    }

    fn player_turn_start(&mut self, player: &mut PlayerStats) {
        // Cooldowns tick at the owner's turn start.
        for remaining in self.ability_cooldowns.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        self.ability_cooldowns.retain(|_, remaining| *remaining > 0);

        // Guard duration decrements specifically at player-turn starts.
        if self.player_defending {
            self.guard_rounds_remaining = self.guard_rounds_remaining.saturating_sub(1);
            if self.guard_rounds_remaining == 0 {
                self.player_defending = false;
                self.push_log(LogKind::Effect, "Player", None, "The guard stance fades.");
            }
        }

        // Summon countdown and decay only tick when a player turn begins.
        let decay_lines = summons::apply_player_turn_decay(&mut self.allies);
        for line in decay_lines {
            self.push_log(LogKind::Summon, "Summon", None, line);
        }
        self.prune_removed_from_order();

        // Damage over time lands at the start of the victim's turn.
        for (label, amount) in effects::dot_ticks(&self.player_effects) {
            let applied = player.take_damage(amount);
            self.push_log(
                LogKind::Effect,
                "Player",
                None,
                format!("You suffer {applied} {label} damage."),
            );
        }

        // Per-turn regeneration, clamped to maximum.
        let magicka_gain = (player.magicka_regen * TURN_SECONDS) as i32;
        let stamina_gain = (player.stamina_regen * TURN_SECONDS) as i32;
        player.current_magicka = (player.current_magicka + magicka_gain).min(player.max_magicka);
        player.current_stamina = (player.current_stamina + stamina_gain).min(player.max_stamina);
        self.push_log(
            LogKind::Regen,
            "Player",
            None,
            format!("You recover {magicka_gain} magicka and {stamina_gain} stamina."),
        );
    }

    fn actor_turn_start(&mut self, id: ActorId) {
        let mut lines = Vec::new();
        if let Some(actor) = self.find_actor_mut(id) {
            for (label, amount) in effects::dot_ticks(&actor.active_effects) {
                let applied = actor.take_damage(amount);
                lines.push((
                    LogKind::Effect,
                    actor.name.clone(),
                    format!("{} suffers {} {} damage.", actor.name, applied, label),
                ));
            }
            let magicka_gain = (actor.magicka_regen * TURN_SECONDS) as i32;
            let stamina_gain = (actor.stamina_regen * TURN_SECONDS) as i32;
            actor.magicka = (actor.magicka + magicka_gain).min(actor.max_magicka);
            actor.stamina = (actor.stamina + stamina_gain).min(actor.max_stamina);
            lines.push((
                LogKind::Regen,
                actor.name.clone(),
                format!("{} recovers {magicka_gain} magicka and {stamina_gain} stamina.", actor.name),
            ));
        }
        for (kind, actor, message) in lines {
            self.push_log(kind, actor, None, message);
        }
    }

    /// Relocate any companion-flagged actor found in the enemy list; an
    /// upstream data error must not leave an ally fighting for the other
    /// side.
    pub fn normalize_misclassified(&mut self) {
        let mut moved = Vec::new();
        let mut i = 0;
        while i < self.enemies.len() {
            if self.enemies[i].is_companion {
                moved.push(self.enemies.remove(i));
            } else {
                i += 1;
            }
        }
        for actor in moved {
            debug!(name = %actor.name, "relocating misclassified companion to allies");
            self.push_log(
                LogKind::System,
                actor.name.clone(),
                None,
                format!("{} rejoins your side.", actor.name),
            );
            self.allies.push(actor);
        }
    }

    /// Drop turn-order slots whose actors no longer exist (e.g. decayed
    /// summons that were removed from the ally list).
    fn prune_removed_from_order(&mut self) {
        let current = self.current_slot();
        let enemies = &self.enemies;
        let allies = &self.allies;
        self.turn_order.retain(|slot| match slot {
            TurnSlot::Player => true,
            TurnSlot::Actor(id) => allies.iter().chain(enemies.iter()).any(|a| a.id == *id),
        });
        self.turn_index = self
            .turn_order
            .iter()
            .position(|s| *s == current)
            .unwrap_or(0);
    }

    /// Check for a terminal state and run victory cleanup.
    pub fn check_combat_end(&mut self, player: &PlayerStats) -> CombatResult {
        if self.result != CombatResult::Active {
            return self.result;
        }
        if !player.is_alive() {
            self.result = CombatResult::Defeat;
            self.push_log(LogKind::System, "Player", None, "You have been defeated.");
        } else if self.enemies.iter().all(|e| !e.is_alive()) && !self.enemies.is_empty() {
            self.result = CombatResult::Victory;
            // Victory cleanup: dead summons are removed outright.
            self.allies.retain(|a| !(a.is_summon() && !a.is_alive()));
            self.prune_removed_from_order();
            self.push_log(LogKind::System, "Player", None, "All enemies are defeated!");
        }
        self.result
    }

    /// Mark the combat as fled. Callers are expected to have checked
    /// `flee_allowed`.
    pub fn mark_fled(&mut self) {
        self.result = CombatResult::Fled;
    }
}

/// Rewrite duplicate display names with incrementing suffixes so every
/// enemy can be targeted and narrated unambiguously.
pub fn disambiguate_names(actors: &mut [Actor]) {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for actor in actors.iter() {
        *counts.entry(actor.name.clone()).or_default() += 1;
    }
    let mut seen: HashMap<String, u32> = HashMap::new();
    for actor in actors.iter_mut() {
        let base = actor.name.clone();
        if counts.get(&base).copied().unwrap_or(0) > 1 {
            let n = seen.entry(base.clone()).or_default();
            *n += 1;
            actor.name = format!("{} {}", base, n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::CharacterSheet;
    use crate::actor::CompanionMeta;

    fn player_stats() -> PlayerStats {
        let sheet = CharacterSheet::new("Hero", 10);
        crate::abilities::build_catalog(&sheet, &[]).1
    }

    fn skeever() -> Actor {
        Actor::new("Skeever", 2, 15, 0, 4)
    }

    #[test]
    fn test_duplicate_names_are_made_unique() {
        let state = CombatState::new(vec![skeever(), skeever(), skeever()], Vec::new());
        let names: Vec<&str> = state.enemies.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Skeever 1", "Skeever 2", "Skeever 3"]);
    }

    #[test]
    fn test_unique_names_left_alone() {
        let state = CombatState::new(
            vec![Actor::new("Wolf", 2, 15, 0, 4), skeever()],
            Vec::new(),
        );
        let names: Vec<&str> = state.enemies.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Wolf", "Skeever"]);
    }

    #[test]
    fn test_turn_order_cycles_player_first() {
        let mut state = CombatState::new(vec![skeever(), skeever()], Vec::new());
        let mut player = player_stats();
        assert!(state.is_player_turn());
        state.advance_turn(&mut player);
        assert!(!state.is_player_turn());
        state.advance_turn(&mut player);
        state.advance_turn(&mut player);
        assert!(state.is_player_turn());
        assert_eq!(state.turn, 4);
    }

    #[test]
    fn test_dead_actors_are_pruned_from_order() {
        let mut state = CombatState::new(vec![skeever(), skeever()], Vec::new());
        let mut player = player_stats();
        let victim = state.enemies[0].id;
        state.find_actor_mut(victim).unwrap().take_damage(100);
        state.advance_turn(&mut player);
        assert!(!state
            .turn_order
            .contains(&TurnSlot::Actor(victim)));
        // The other enemy still gets its turn.
        assert_eq!(state.current_slot(), TurnSlot::Actor(state.enemies[1].id));
    }

    #[test]
    fn test_regen_is_clamped_and_logged() {
        let mut state = CombatState::new(vec![skeever(), skeever()], Vec::new());
        let mut player = player_stats();
        player.current_magicka = 10;
        // Cycle all the way back to the player's turn.
        state.advance_turn(&mut player);
        state.advance_turn(&mut player);
        state.advance_turn(&mut player);
        assert!(state.is_player_turn());
        assert!(player.current_magicka > 10);
        assert!(player.current_magicka <= player.max_magicka);
        assert!(state.log.iter().any(|e| e.kind == LogKind::Regen));
    }

    #[test]
    fn test_misclassified_companion_relocated() {
        let lydia = Actor::new("Lydia", 10, 80, 20, 10)
            .with_companion_meta(CompanionMeta::companion("lydia"));
        let mut state = CombatState::new(vec![skeever()], Vec::new());
        // Simulate the upstream data error directly.
        state.enemies.push(lydia);
        let mut player = player_stats();
        state.advance_turn(&mut player);
        assert_eq!(state.enemies.len(), 1);
        assert_eq!(state.allies.len(), 1);
        assert_eq!(state.allies[0].name, "Lydia");
    }

    #[test]
    fn test_victory_detection_and_summon_cleanup() {
        let mut dead_summon = Actor::new("Familiar", 5, 20, 0, 5)
            .with_companion_meta(CompanionMeta::summon("familiar", 3));
        dead_summon.take_damage(100);
        let mut state = CombatState::new(vec![skeever()], vec![dead_summon]);
        let player = player_stats();
        for enemy in state.enemies.iter_mut() {
            enemy.take_damage(100);
        }
        assert_eq!(state.check_combat_end(&player), CombatResult::Victory);
        assert!(state.allies.is_empty());
    }

    #[test]
    fn test_defeat_detection() {
        let mut state = CombatState::new(vec![skeever()], Vec::new());
        let mut player = player_stats();
        player.current_health = 0;
        assert_eq!(state.check_combat_end(&player), CombatResult::Defeat);
    }
}
