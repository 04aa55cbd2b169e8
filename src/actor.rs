//! Combat actors: enemies, companions, and summons.

use crate::abilities::Ability;
use crate::effects::{self, ActiveEffect};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a combat actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        ActorId(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creature classification, derived from the actor's name rather than
/// authored, so external data cannot disagree with itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorType {
    Humanoid,
    Beast,
    Undead,
    Daedra,
    Dragon,
    Automaton,
}

impl ActorType {
    /// Infer the creature type from a display name.
    pub fn infer(name: &str) -> Self {
        let lower = name.to_lowercase();
        const UNDEAD: &[&str] = &["skeleton", "draugr", "ghost", "wraith", "vampire", "zombie"];
        const DAEDRA: &[&str] = &["atronach", "daedra", "dremora", "seducer"];
        const DRAGON: &[&str] = &["dragon", "drake", "wyrm"];
        const AUTOMATON: &[&str] = &["sphere", "centurion", "automaton", "spider worker"];
        const BEAST: &[&str] = &[
            "wolf", "bear", "skeever", "spider", "troll", "sabre", "chaurus", "mudcrab", "slaughterfish",
        ];

        if UNDEAD.iter().any(|k| lower.contains(k)) {
            ActorType::Undead
        } else if DAEDRA.iter().any(|k| lower.contains(k)) {
            ActorType::Daedra
        } else if DRAGON.iter().any(|k| lower.contains(k)) {
            ActorType::Dragon
        } else if AUTOMATON.iter().any(|k| lower.contains(k)) {
            ActorType::Automaton
        } else if BEAST.iter().any(|k| lower.contains(k)) {
            ActorType::Beast
        } else {
            ActorType::Humanoid
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActorType::Humanoid => "humanoid",
            ActorType::Beast => "beast",
            ActorType::Undead => "undead",
            ActorType::Daedra => "daedra",
            ActorType::Dragon => "dragon",
            ActorType::Automaton => "automaton",
        }
    }
}

/// Companion bookkeeping for allies and summons.
///
/// `auto_control` and `auto_loot` come from the companion record and must
/// survive every state transition verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionMeta {
    pub companion_id: String,
    pub auto_control: bool,
    pub auto_loot: bool,
    pub is_summon: bool,
    /// Player-turn starts left before decay begins. Not ticked on enemy turns.
    pub player_turns_remaining: u32,
    /// Once set, the summon's health halves at every player-turn start.
    pub decay_active: bool,
}

impl CompanionMeta {
    pub fn companion(companion_id: impl Into<String>) -> Self {
        Self {
            companion_id: companion_id.into(),
            auto_control: true,
            auto_loot: true,
            is_summon: false,
            player_turns_remaining: 0,
            decay_active: false,
        }
    }

    pub fn summon(companion_id: impl Into<String>, player_turns: u32) -> Self {
        Self {
            companion_id: companion_id.into(),
            auto_control: true,
            auto_loot: false,
            is_summon: true,
            player_turns_remaining: player_turns,
            decay_active: false,
        }
    }
}

fn default_regen() -> f64 {
    1.0
}

/// An enemy, companion, or summoned ally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub level: u32,
    pub current_health: i32,
    pub max_health: i32,
    pub armor: i32,
    pub damage: i32,
    #[serde(default)]
    pub magicka: i32,
    #[serde(default)]
    pub max_magicka: i32,
    #[serde(default)]
    pub stamina: i32,
    #[serde(default)]
    pub max_stamina: i32,
    #[serde(default = "default_regen")]
    pub magicka_regen: f64,
    #[serde(default = "default_regen")]
    pub stamina_regen: f64,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub active_effects: Vec<ActiveEffect>,
    pub actor_type: ActorType,
    #[serde(default)]
    pub is_boss: bool,
    #[serde(default)]
    pub is_companion: bool,
    #[serde(default)]
    pub companion_meta: Option<CompanionMeta>,
}

impl Actor {
    pub fn new(name: impl Into<String>, level: u32, health: i32, armor: i32, damage: i32) -> Self {
        let name = name.into();
        let actor_type = ActorType::infer(&name);
        let resource_pool = 50 + level as i32 * 5;
        Self {
            id: ActorId::new(),
            name,
            level,
            current_health: health,
            max_health: health,
            armor,
            damage,
            magicka: resource_pool,
            max_magicka: resource_pool,
            stamina: resource_pool,
            max_stamina: resource_pool,
            magicka_regen: default_regen(),
            stamina_regen: default_regen(),
            abilities: Vec::new(),
            active_effects: Vec::new(),
            actor_type,
            is_boss: false,
            is_companion: false,
            companion_meta: None,
        }
    }

    pub fn with_abilities(mut self, abilities: Vec<Ability>) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_companion_meta(mut self, meta: CompanionMeta) -> Self {
        self.is_companion = true;
        self.companion_meta = Some(meta);
        self
    }

    pub fn boss(mut self) -> Self {
        self.is_boss = true;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.current_health > 0
    }

    pub fn is_summon(&self) -> bool {
        self.companion_meta
            .as_ref()
            .map(|m| m.is_summon)
            .unwrap_or(false)
    }

    pub fn is_stunned(&self) -> bool {
        effects::is_stunned(&self.active_effects)
    }

    /// Apply damage, clamping health at zero. Returns the amount applied.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let applied = amount.max(0).min(self.current_health);
        self.current_health -= applied;
        applied
    }

    /// Heal, clamping at max health. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let missing = self.max_health - self.current_health;
        let healed = amount.max(0).min(missing);
        self.current_health += healed;
        healed
    }

    pub fn health_ratio(&self) -> f64 {
        if self.max_health <= 0 {
            0.0
        } else {
            self.current_health as f64 / self.max_health as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_inference() {
        assert_eq!(ActorType::infer("Skeever"), ActorType::Beast);
        assert_eq!(ActorType::infer("Draugr Overlord"), ActorType::Undead);
        assert_eq!(ActorType::infer("Flame Atronach"), ActorType::Daedra);
        assert_eq!(ActorType::infer("Frost Dragon"), ActorType::Dragon);
        assert_eq!(ActorType::infer("Bandit Chief"), ActorType::Humanoid);
        assert_eq!(ActorType::infer("Dwarven Centurion"), ActorType::Automaton);
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut actor = Actor::new("Wolf", 3, 20, 0, 5);
        assert_eq!(actor.take_damage(50), 20);
        assert_eq!(actor.current_health, 0);
        assert!(!actor.is_alive());
    }

    #[test]
    fn test_heal_clamps_at_max() {
        let mut actor = Actor::new("Wolf", 3, 20, 0, 5);
        actor.take_damage(15);
        assert_eq!(actor.heal(100), 15);
        assert_eq!(actor.current_health, actor.max_health);
    }

    #[test]
    fn test_negative_amounts_are_ignored() {
        let mut actor = Actor::new("Wolf", 3, 20, 0, 5);
        assert_eq!(actor.take_damage(-5), 0);
        assert_eq!(actor.heal(-5), 0);
        assert_eq!(actor.current_health, 20);
    }
}
