//! Combat status effects.
//!
//! Effects are a tagged union: each variant carries only the fields its
//! resolution needs, and effect processing is an exhaustive match.

use serde::{Deserialize, Serialize};

/// Stat targeted by a buff or debuff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuffStat {
    Damage,
    Armor,
}

impl BuffStat {
    pub fn name(&self) -> &'static str {
        match self {
            BuffStat::Damage => "damage",
            BuffStat::Armor => "armor",
        }
    }
}

/// A status effect active on an actor or the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Damage applied at the start of each of the victim's turns.
    DamageOverTime { per_turn: i32, label: String },
    /// Reduced effectiveness; magnitude subtracts from outgoing damage.
    Slow { magnitude: i32 },
    /// The victim's turns are forced skips while this lasts.
    Stun,
    /// Positive stat adjustment.
    Buff { stat: BuffStat, amount: i32 },
    /// Negative stat adjustment.
    Debuff { stat: BuffStat, amount: i32 },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::DamageOverTime { .. } => "damage over time",
            Effect::Slow { .. } => "slowed",
            Effect::Stun => "stunned",
            Effect::Buff { .. } => "buffed",
            Effect::Debuff { .. } => "weakened",
        }
    }
}

/// An effect with its remaining duration in the victim's turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub effect: Effect,
    pub turns_remaining: u32,
}

impl ActiveEffect {
    pub fn new(effect: Effect, turns: u32) -> Self {
        Self {
            effect,
            turns_remaining: turns,
        }
    }
}

/// Whether a stun effect is currently active.
pub fn is_stunned(effects: &[ActiveEffect]) -> bool {
    effects
        .iter()
        .any(|e| matches!(e.effect, Effect::Stun) && e.turns_remaining > 0)
}

/// Net outgoing-damage adjustment from buffs, debuffs, and slows.
pub fn damage_modifier(effects: &[ActiveEffect]) -> i32 {
    effects
        .iter()
        .map(|e| match &e.effect {
            Effect::Buff {
                stat: BuffStat::Damage,
                amount,
            } => *amount,
            Effect::Debuff {
                stat: BuffStat::Damage,
                amount,
            } => -amount,
            Effect::Slow { magnitude } => -magnitude,
            _ => 0,
        })
        .sum()
}

/// Net armor adjustment from buffs and debuffs.
pub fn armor_modifier(effects: &[ActiveEffect]) -> i32 {
    effects
        .iter()
        .map(|e| match &e.effect {
            Effect::Buff {
                stat: BuffStat::Armor,
                amount,
            } => *amount,
            Effect::Debuff {
                stat: BuffStat::Armor,
                amount,
            } => -amount,
            _ => 0,
        })
        .sum()
}

/// Active damage-over-time ticks as (label, amount) pairs.
pub fn dot_ticks(effects: &[ActiveEffect]) -> Vec<(String, i32)> {
    effects
        .iter()
        .filter_map(|e| match &e.effect {
            Effect::DamageOverTime { per_turn, label } => Some((label.clone(), *per_turn)),
            _ => None,
        })
        .collect()
}

/// Decrement durations and drop expired effects. Returns the expired ones
/// so the caller can narrate them.
pub fn tick_effects(effects: &mut Vec<ActiveEffect>) -> Vec<Effect> {
    let mut expired = Vec::new();
    for e in effects.iter_mut() {
        e.turns_remaining = e.turns_remaining.saturating_sub(1);
    }
    effects.retain(|e| {
        if e.turns_remaining == 0 {
            expired.push(e.effect.clone());
            false
        } else {
            true
        }
    });
    expired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stun_detection() {
        let effects = vec![ActiveEffect::new(Effect::Stun, 1)];
        assert!(is_stunned(&effects));
        assert!(!is_stunned(&[]));
    }

    #[test]
    fn test_tick_drops_expired() {
        let mut effects = vec![
            ActiveEffect::new(Effect::Stun, 1),
            ActiveEffect::new(
                Effect::DamageOverTime {
                    per_turn: 4,
                    label: "burning".into(),
                },
                3,
            ),
        ];
        let expired = tick_effects(&mut effects);
        assert_eq!(expired, vec![Effect::Stun]);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].turns_remaining, 2);
    }

    #[test]
    fn test_damage_modifier_combines_buffs_and_slows() {
        let effects = vec![
            ActiveEffect::new(
                Effect::Buff {
                    stat: BuffStat::Damage,
                    amount: 5,
                },
                2,
            ),
            ActiveEffect::new(Effect::Slow { magnitude: 2 }, 2),
            ActiveEffect::new(
                Effect::Debuff {
                    stat: BuffStat::Damage,
                    amount: 3,
                },
                2,
            ),
        ];
        assert_eq!(damage_modifier(&effects), 0);
    }
}
