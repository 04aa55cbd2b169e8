//! Summoned ally lifecycle: creation, outcome scaling, decay, removal.

use crate::abilities::{CharacterSheet, Perk};
use crate::actor::{Actor, ActorId, CompanionMeta};
use crate::dice::{OutcomeRoll, RollTier};
use crate::state::{CombatState, TurnSlot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Concurrent summons allowed without perks.
pub const SUMMON_BASE_CAP: usize = 1;
/// Hard ceiling regardless of perk ranks.
pub const SUMMON_MAX_CAP: usize = 3;
/// Player turns granted to the bonus minion from a critical cast.
const MINION_TURNS: u32 = 3;

/// Static template a summon is instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummonTemplate {
    pub id: String,
    pub name: String,
    pub base_health: i32,
    pub base_damage: i32,
    pub base_armor: i32,
    /// Player-turn starts before decay begins, at a normal roll.
    pub base_turns: u32,
    pub health_per_level: i32,
    pub damage_per_level: i32,
}

pub static SUMMON_TEMPLATES: LazyLock<HashMap<&'static str, SummonTemplate>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();
        map.insert(
            "familiar",
            SummonTemplate {
                id: "familiar".into(),
                name: "Familiar".into(),
                base_health: 25,
                base_damage: 6,
                base_armor: 0,
                base_turns: 5,
                health_per_level: 2,
                damage_per_level: 0,
            },
        );
        map.insert(
            "flame_atronach",
            SummonTemplate {
                id: "flame_atronach".into(),
                name: "Flame Atronach".into(),
                base_health: 40,
                base_damage: 12,
                base_armor: 10,
                base_turns: 5,
                health_per_level: 3,
                damage_per_level: 1,
            },
        );
        map.insert(
            "storm_atronach",
            SummonTemplate {
                id: "storm_atronach".into(),
                name: "Storm Atronach".into(),
                base_health: 60,
                base_damage: 16,
                base_armor: 20,
                base_turns: 4,
                health_per_level: 3,
                damage_per_level: 1,
            },
        );
        map
    });

pub fn get_template(id: &str) -> Option<&'static SummonTemplate> {
    SUMMON_TEMPLATES.get(id)
}

/// How many summons this character may keep active at once.
pub fn summon_cap(sheet: &CharacterSheet) -> usize {
    (SUMMON_BASE_CAP + sheet.perk_rank(Perk::TwinSouls) as usize).min(SUMMON_MAX_CAP)
}

/// Living summons currently on the field.
pub fn active_summon_count(state: &CombatState) -> usize {
    state
        .allies
        .iter()
        .filter(|a| a.is_alive() && a.is_summon())
        .count()
}

/// Check the active-summon cap. Returns a rejection narrative when the
/// cast must be blocked before any roll or resource is consumed.
pub fn check_summon_cap(state: &CombatState, sheet: &CharacterSheet) -> Option<String> {
    let cap = summon_cap(sheet);
    let active = active_summon_count(state);
    if active >= cap {
        Some(if cap == 1 {
            "You cannot sustain another summon while one is already bound to you.".to_string()
        } else {
            format!("You cannot sustain more than {cap} summons at once.")
        })
    } else {
        None
    }
}

/// Result of a conjuration cast that got past the cap check.
#[derive(Debug, Clone)]
pub enum SummonCast {
    /// Nat 1: no actor is created; the resource was still spent.
    Failed { narrative: String },
    Summoned {
        narrative: String,
        spawned: Vec<ActorId>,
    },
}

fn scaled_actor(template: &SummonTemplate, caster_level: u32, scale: f64, turns: u32) -> Actor {
    let health =
        ((template.base_health + template.health_per_level * caster_level as i32) as f64 * scale)
            .floor()
            .max(1.0) as i32;
    let damage =
        ((template.base_damage + template.damage_per_level * caster_level as i32) as f64 * scale)
            .floor()
            .max(1.0) as i32;
    let mut actor = Actor::new(template.name.clone(), caster_level, health, template.base_armor, damage);
    actor.is_companion = true;
    actor.companion_meta = Some(CompanionMeta::summon(template.id.clone(), turns));
    actor
}

/// Create a summon for the given outcome roll, placing it into the ally
/// collection and the turn order. The cap must already have been checked.
pub fn cast_summon(
    state: &mut CombatState,
    caster_level: u32,
    template_id: &str,
    roll: OutcomeRoll,
) -> SummonCast {
    let Some(template) = get_template(template_id) else {
        // Unknown identifiers are narrated no-ops, not errors.
        return SummonCast::Failed {
            narrative: format!("The incantation for '{template_id}' fizzles into nothing."),
        };
    };

    let tier = roll.tier();
    if tier == RollTier::Fumble {
        return SummonCast::Failed {
            narrative: format!(
                "The summoning fails! The portal collapses before the {} can step through.",
                template.name
            ),
        };
    }

    let turns = match tier {
        RollTier::Strong => template.base_turns + 2,
        RollTier::Critical => template.base_turns + 3,
        _ => template.base_turns,
    };

    let primary = scaled_actor(template, caster_level, tier.scale(), turns);
    let primary_id = primary.id;
    let primary_name = primary.name.clone();
    let mut spawned = vec![primary_id];

    state.turn_order.push(TurnSlot::Actor(primary_id));
    state.allies.push(primary);

    let narrative = match tier {
        RollTier::Critical => {
            // A maximal roll brings a strictly weaker minion along.
            let minion = scaled_actor(template, caster_level, tier.scale() * 0.5, MINION_TURNS);
            let minion_id = minion.id;
            let minion_name = format!("Lesser {}", minion.name);
            let mut minion = minion;
            minion.name = minion_name.clone();
            spawned.push(minion_id);
            state.turn_order.push(TurnSlot::Actor(minion_id));
            state.allies.push(minion);
            format!(
                "A masterful summoning! {} answers the call, and a {} slips through the rift beside it.",
                primary_name, minion_name
            )
        }
        RollTier::Strong => format!(
            "{} strides through the portal, empowered and bound for {} of your turns.",
            primary_name, turns
        ),
        RollTier::Weak => format!(
            "{} stumbles through the portal, diminished by the shaky incantation.",
            primary_name
        ),
        _ => format!("{} appears at your side.", primary_name),
    };

    SummonCast::Summoned { narrative, spawned }
}

/// Tick summon countdowns and decay at a player-turn start.
///
/// Countdown decrements only on player turns. When it reaches zero the
/// summon is flagged decaying; each later player-turn start halves its
/// health (floor) until it is removed.
pub fn apply_player_turn_decay(allies: &mut Vec<Actor>) -> Vec<String> {
    let mut lines = Vec::new();
    for ally in allies.iter_mut() {
        let Some(meta) = ally.companion_meta.as_mut() else {
            continue;
        };
        if !meta.is_summon || !ally.current_health.is_positive() {
            continue;
        }
        if meta.decay_active {
            ally.current_health /= 2;
            if ally.current_health <= 0 {
                ally.current_health = 0;
                lines.push(format!("{} dissolves back into the void.", ally.name));
            } else {
                lines.push(format!(
                    "{} flickers, fading ({} health remains).",
                    ally.name, ally.current_health
                ));
            }
        } else {
            meta.player_turns_remaining = meta.player_turns_remaining.saturating_sub(1);
            if meta.player_turns_remaining == 0 {
                meta.decay_active = true;
                lines.push(format!("{} begins to fade.", ally.name));
            }
        }
    }
    // Fully decayed summons are removed from the state.
    allies.retain(|a| !(a.is_summon() && a.current_health <= 0));
    lines
}
