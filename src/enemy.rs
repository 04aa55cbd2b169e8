//! Enemy templates, behavior selection, and encounter sizing.

use crate::abilities::{Ability, AbilityCost, AbilityEffect, AbilityKind, Resource};
use crate::actor::Actor;
use crate::effects::BuffStat;
use crate::state::{CombatState, TurnSlot};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Health ratio below which a boss attempts its one reinforcement summon.
pub const BOSS_SUMMON_HEALTH_RATIO: f64 = 0.5;
/// Enemy groups never exceed this size.
pub const MAX_GROUP_SIZE: usize = 5;

/// Disposition tag steering an enemy's weighted action choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BehaviorTag {
    #[default]
    Aggressive,
    Tactical,
    Support,
    Defensive,
}

impl BehaviorTag {
    pub fn name(&self) -> &'static str {
        match self {
            BehaviorTag::Aggressive => "aggressive",
            BehaviorTag::Tactical => "tactical",
            BehaviorTag::Support => "support",
            BehaviorTag::Defensive => "defensive",
        }
    }
}

/// Static enemy archetype.
#[derive(Debug, Clone)]
pub struct EnemyTemplate {
    pub name: &'static str,
    pub base_level: u32,
    pub base_health: i32,
    pub base_damage: i32,
    pub base_armor: i32,
    pub behavior: BehaviorTag,
    pub is_boss: bool,
    /// Unique variants are never duplicated within an encounter.
    pub unique: bool,
    pub abilities: fn() -> Vec<Ability>,
}

fn no_abilities() -> Vec<Ability> {
    Vec::new()
}

fn draugr_abilities() -> Vec<Ability> {
    vec![Ability::new("frostbite", "Frostbite", AbilityKind::Magic)
        .with_cost(AbilityCost::magicka(20))
        .with_damage(10)
        .with_effect(AbilityEffect::Slow {
            magnitude: 2,
            turns: 2,
        })]
}

fn necromancer_abilities() -> Vec<Ability> {
    vec![
        Ability::new("drain_life", "Drain Life", AbilityKind::Magic)
            .with_cost(AbilityCost::magicka(25))
            .with_damage(12),
        Ability::new("raise_thrall", "Raise Thrall", AbilityKind::Magic)
            .with_cost(AbilityCost::magicka(50))
            .with_effect(AbilityEffect::Summon {
                template_id: "skeleton_thrall".into(),
            }),
        Ability::new("mend_flesh", "Mend Flesh", AbilityKind::Magic)
            .with_cost(AbilityCost::magicka(30))
            .with_heal(15),
    ]
}

fn dragon_priest_abilities() -> Vec<Ability> {
    vec![
        Ability::new("lightning_storm", "Lightning Storm", AbilityKind::Aoe)
            .with_cost(AbilityCost::magicka(60))
            .with_damage(18)
            .with_effect(AbilityEffect::AoeDamage),
        Ability::new("ward", "Ward", AbilityKind::Utility)
            .with_cost(AbilityCost::magicka(20))
            .with_effect(AbilityEffect::Buff {
                stat: BuffStat::Armor,
                amount: 25,
                turns: 2,
            }),
    ]
}

pub static ENEMY_TEMPLATES: LazyLock<Vec<EnemyTemplate>> = LazyLock::new(|| {
    vec![
        EnemyTemplate {
            name: "Skeever",
            base_level: 1,
            base_health: 15,
            base_damage: 4,
            base_armor: 0,
            behavior: BehaviorTag::Aggressive,
            is_boss: false,
            unique: false,
            abilities: no_abilities,
        },
        EnemyTemplate {
            name: "Wolf",
            base_level: 2,
            base_health: 22,
            base_damage: 6,
            base_armor: 0,
            behavior: BehaviorTag::Aggressive,
            is_boss: false,
            unique: false,
            abilities: no_abilities,
        },
        EnemyTemplate {
            name: "Bandit",
            base_level: 4,
            base_health: 40,
            base_damage: 9,
            base_armor: 12,
            behavior: BehaviorTag::Aggressive,
            is_boss: false,
            unique: false,
            abilities: no_abilities,
        },
        EnemyTemplate {
            name: "Draugr",
            base_level: 6,
            base_health: 55,
            base_damage: 11,
            base_armor: 15,
            behavior: BehaviorTag::Tactical,
            is_boss: false,
            unique: false,
            abilities: draugr_abilities,
        },
        EnemyTemplate {
            name: "Frost Troll",
            base_level: 9,
            base_health: 90,
            base_damage: 16,
            base_armor: 8,
            behavior: BehaviorTag::Aggressive,
            is_boss: false,
            unique: false,
            abilities: no_abilities,
        },
        EnemyTemplate {
            name: "Necromancer",
            base_level: 8,
            base_health: 60,
            base_damage: 10,
            base_armor: 5,
            behavior: BehaviorTag::Support,
            is_boss: false,
            unique: false,
            abilities: necromancer_abilities,
        },
        EnemyTemplate {
            name: "Bandit Chief",
            base_level: 10,
            base_health: 110,
            base_damage: 18,
            base_armor: 25,
            behavior: BehaviorTag::Tactical,
            is_boss: true,
            unique: true,
            abilities: no_abilities,
        },
        EnemyTemplate {
            name: "Dragon Priest",
            base_level: 15,
            base_health: 160,
            base_damage: 24,
            base_armor: 30,
            behavior: BehaviorTag::Tactical,
            is_boss: true,
            unique: true,
            abilities: dragon_priest_abilities,
        },
    ]
});

impl EnemyTemplate {
    /// Instantiate an actor from this template at the given level.
    pub fn instantiate(&self, level: u32) -> Actor {
        let level = level.max(1);
        let delta = level as i32 - self.base_level as i32;
        let health = (self.base_health + delta * 5).max(5);
        let damage = (self.base_damage + delta * 2).max(1);
        let armor = (self.base_armor + delta).max(0);
        let mut actor = Actor::new(self.name, level, health, armor, damage);
        actor.abilities = (self.abilities)();
        if self.is_boss {
            actor.is_boss = true;
        }
        actor
    }
}

pub fn get_template(name: &str) -> Option<&'static EnemyTemplate> {
    let lower = name.to_lowercase();
    ENEMY_TEMPLATES.iter().find(|t| t.name.to_lowercase() == lower)
}

// ============================================================================
// Encounter sizing
// ============================================================================

/// Recommended enemy count for a player level, bounded 1-5.
pub fn recommended_enemy_count(player_level: u32) -> usize {
    ((1 + player_level / 7) as usize).clamp(1, MAX_GROUP_SIZE)
}

/// Expand a single template into a same-type group. Duplicate display
/// names are resolved later by `CombatState::new`.
pub fn expand_group(template: &EnemyTemplate, count: usize) -> Vec<Actor> {
    let count = count.clamp(1, MAX_GROUP_SIZE);
    (0..count).map(|_| template.instantiate(template.base_level)).collect()
}

/// Generate one enemy scaled around the requested level (within ±2),
/// optionally refusing unique variants.
pub fn scaled_enemy<R: Rng>(target_level: u32, avoid_unique: bool, rng: &mut R) -> Actor {
    let candidates: Vec<&EnemyTemplate> = ENEMY_TEMPLATES
        .iter()
        .filter(|t| !(avoid_unique && t.unique))
        .collect();
    // Prefer templates whose base level is near the target.
    let nearby: Vec<&EnemyTemplate> = candidates
        .iter()
        .copied()
        .filter(|t| (t.base_level as i32 - target_level as i32).abs() <= 4)
        .collect();
    let template = if nearby.is_empty() {
        candidates[rng.gen_range(0..candidates.len())]
    } else {
        nearby[rng.gen_range(0..nearby.len())]
    };
    let jitter = rng.gen_range(-2i32..=2);
    let level = (target_level as i32 + jitter).max(1) as u32;
    template.instantiate(level)
}

// ============================================================================
// Behavior selection
// ============================================================================

/// What a non-player actor decides to do on its turn.
#[derive(Debug, Clone)]
pub enum NpcChoice {
    Attack,
    UseAbility(Ability),
}

fn can_afford(actor: &Actor, cost: &AbilityCost) -> bool {
    match cost.resource {
        Resource::None => true,
        Resource::Magicka => actor.magicka >= cost.amount,
        Resource::Stamina => actor.stamina >= cost.amount,
    }
}

/// Pick an enemy action by behavior tag. Abilities are resource-gated the
/// same way player casts are.
pub fn select_action<R: Rng>(enemy: &Actor, state: &CombatState, rng: &mut R) -> NpcChoice {
    let affordable: Vec<&Ability> = enemy
        .abilities
        .iter()
        .filter(|a| can_afford(enemy, &a.cost))
        .collect();

    if affordable.is_empty() {
        return NpcChoice::Attack;
    }

    // Support actors heal a wounded comrade before anything else.
    if matches!(behavior_of(enemy), BehaviorTag::Support) {
        let comrade_wounded = state
            .living_enemies()
            .any(|e| e.id != enemy.id && e.health_ratio() < 0.5);
        if comrade_wounded {
            if let Some(heal) = affordable.iter().find(|a| a.heal > 0) {
                return NpcChoice::UseAbility((*heal).clone());
            }
        }
    }

    let ability_weight = match behavior_of(enemy) {
        BehaviorTag::Aggressive => 25,
        BehaviorTag::Tactical => 55,
        BehaviorTag::Support => 70,
        BehaviorTag::Defensive => 40,
    };

    if rng.gen_range(0..100) < ability_weight {
        let pick = affordable[rng.gen_range(0..affordable.len())];
        NpcChoice::UseAbility(pick.clone())
    } else {
        NpcChoice::Attack
    }
}

/// Behavior tag for an instantiated actor, recovered from its template.
pub fn behavior_of(actor: &Actor) -> BehaviorTag {
    // Disambiguation suffixes ("Skeever 2") must not break the lookup.
    let base = actor
        .name
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == ' ');
    get_template(base).map(|t| t.behavior).unwrap_or_default()
}

/// Whether a boss should fire its once-per-combat reinforcement summon.
pub fn boss_should_summon(enemy: &Actor, state: &CombatState) -> bool {
    enemy.is_boss && !state.boss_summon_used && enemy.health_ratio() < BOSS_SUMMON_HEALTH_RATIO
}

/// Spawn a reinforcement on the enemy side, weaker than its summoner.
pub fn spawn_reinforcement(state: &mut CombatState, summoner_name: &str, level: u32) -> String {
    let level = (level.saturating_sub(3)).max(1);
    let health = 20 + level as i32 * 4;
    let damage = 4 + level as i32;
    let mut reinforcement = Actor::new("Summoned Thrall", level, health, 5, damage);
    // Reinforcements decay with nobody to sustain them, so keep them plain.
    reinforcement.abilities = Vec::new();
    let id = reinforcement.id;
    state.enemies.push(reinforcement);
    crate::state::disambiguate_names(&mut state.enemies);
    state.turn_order.push(TurnSlot::Actor(id));
    format!("{summoner_name} tears open a rift and drags a thrall through to fight!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_recommended_count_bounds() {
        assert_eq!(recommended_enemy_count(1), 1);
        assert_eq!(recommended_enemy_count(7), 2);
        assert_eq!(recommended_enemy_count(21), 4);
        assert_eq!(recommended_enemy_count(80), 5);
    }

    #[test]
    fn test_expand_group_clamps() {
        let template = get_template("Skeever").unwrap();
        assert_eq!(expand_group(template, 3).len(), 3);
        assert_eq!(expand_group(template, 12).len(), MAX_GROUP_SIZE);
        assert_eq!(expand_group(template, 0).len(), 1);
    }

    #[test]
    fn test_scaled_enemy_level_window() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let enemy = scaled_enemy(6, true, &mut rng);
            assert!(enemy.level >= 4 && enemy.level <= 8);
            assert!(!enemy.is_boss);
        }
    }

    #[test]
    fn test_scaled_enemy_can_avoid_uniques() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let enemy = scaled_enemy(14, true, &mut rng);
            assert_ne!(enemy.name, "Dragon Priest");
            assert_ne!(enemy.name, "Bandit Chief");
        }
    }

    #[test]
    fn test_select_attack_when_no_affordable_ability() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut enemy = get_template("Necromancer").unwrap().instantiate(8);
        enemy.magicka = 0;
        let state = CombatState::new(vec![enemy.clone()], Vec::new());
        for _ in 0..20 {
            assert!(matches!(
                select_action(&enemy, &state, &mut rng),
                NpcChoice::Attack
            ));
        }
    }

    #[test]
    fn test_boss_summon_latch() {
        let mut boss = get_template("Bandit Chief").unwrap().instantiate(10);
        let mut state = CombatState::new(vec![boss.clone()], Vec::new());
        boss.current_health = boss.max_health / 3;
        assert!(boss_should_summon(&boss, &state));
        state.boss_summon_used = true;
        assert!(!boss_should_summon(&boss, &state));
    }
}
