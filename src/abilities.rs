//! Ability catalog construction.
//!
//! Derives the set of actions a character may currently perform from the
//! character sheet (level, skills, perks) and equipped items, plus the
//! derived combat stats. Gating on advanced techniques is by specific
//! perk, never by skill level alone.

use crate::effects::BuffStat;
use crate::items::{ItemKind, ItemOwner, ItemRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Unarmed skill needed for the unarmed strike without the perk.
pub const UNARMED_SKILL_THRESHOLD: u32 = 20;
/// Block skill needed for the shield-block utility.
pub const BLOCK_SKILL_THRESHOLD: u32 = 25;

// ============================================================================
// Skills and Perks
// ============================================================================

/// Trainable skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    OneHanded,
    TwoHanded,
    Archery,
    Block,
    Unarmed,
    LightArmor,
    HeavyArmor,
    Destruction,
    Restoration,
    Conjuration,
}

impl Skill {
    pub fn name(&self) -> &'static str {
        match self {
            Skill::OneHanded => "One-Handed",
            Skill::TwoHanded => "Two-Handed",
            Skill::Archery => "Archery",
            Skill::Block => "Block",
            Skill::Unarmed => "Unarmed",
            Skill::LightArmor => "Light Armor",
            Skill::HeavyArmor => "Heavy Armor",
            Skill::Destruction => "Destruction",
            Skill::Restoration => "Restoration",
            Skill::Conjuration => "Conjuration",
        }
    }
}

/// Unlockable perks. Gating rules reference these by variant, so a missing
/// perk can never be conjured up from a high skill level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Perk {
    /// Unlocks the unarmed strike regardless of Unarmed skill.
    IronFists,
    /// Counter-attack technique (one-handed).
    Riposte,
    /// Bleeding slash technique (one-handed).
    SavageSlash,
    /// Execution-class strike (one-handed).
    MortalStrike,
    /// Spinning area attack.
    Whirlwind,
    /// Sweeping area attack.
    Cleave,
    /// Raises the active-summon cap: rank 1 allows two, rank 2 three.
    TwinSouls,
    /// Extends Tactical Guard duration by one round per rank.
    StalwartGuard,
}

impl Perk {
    pub fn name(&self) -> &'static str {
        match self {
            Perk::IronFists => "Iron Fists",
            Perk::Riposte => "Riposte",
            Perk::SavageSlash => "Savage Slash",
            Perk::MortalStrike => "Mortal Strike",
            Perk::Whirlwind => "Whirlwind",
            Perk::Cleave => "Cleave",
            Perk::TwinSouls => "Twin Souls",
            Perk::StalwartGuard => "Stalwart Guard",
        }
    }
}

/// The character sheet as handed in by the save layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub skills: HashMap<Skill, u32>,
    /// Perk → rank. Rank 0 entries are treated as absent.
    #[serde(default)]
    pub perks: HashMap<Perk, u8>,
    pub base_health: i32,
    pub base_magicka: i32,
    pub base_stamina: i32,
    #[serde(default)]
    pub health_regen: f64,
    pub magicka_regen: f64,
    pub stamina_regen: f64,
    #[serde(default)]
    pub crit_chance: f64,
    #[serde(default)]
    pub dodge_chance: f64,
}

impl CharacterSheet {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            skills: HashMap::new(),
            perks: HashMap::new(),
            base_health: 100,
            base_magicka: 100,
            base_stamina: 100,
            health_regen: 0.0,
            magicka_regen: 3.0,
            stamina_regen: 5.0,
            crit_chance: 0.1,
            dodge_chance: 0.1,
        }
    }

    pub fn with_skill(mut self, skill: Skill, value: u32) -> Self {
        self.skills.insert(skill, value);
        self
    }

    pub fn with_perk(mut self, perk: Perk) -> Self {
        self.perks.insert(perk, 1);
        self
    }

    pub fn with_perk_rank(mut self, perk: Perk, rank: u8) -> Self {
        self.perks.insert(perk, rank);
        self
    }

    pub fn skill(&self, skill: Skill) -> u32 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    pub fn perk_rank(&self, perk: Perk) -> u8 {
        self.perks.get(&perk).copied().unwrap_or(0)
    }

    pub fn has_perk(&self, perk: Perk) -> bool {
        self.perk_rank(perk) > 0
    }
}

// ============================================================================
// Abilities
// ============================================================================

/// Action classification for an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityKind {
    Melee,
    Ranged,
    Magic,
    Utility,
    Aoe,
}

/// Resource pool an ability draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Resource {
    #[default]
    None,
    Magicka,
    Stamina,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AbilityCost {
    pub resource: Resource,
    pub amount: i32,
}

impl AbilityCost {
    pub const FREE: AbilityCost = AbilityCost {
        resource: Resource::None,
        amount: 0,
    };

    pub fn magicka(amount: i32) -> Self {
        Self {
            resource: Resource::Magicka,
            amount,
        }
    }

    pub fn stamina(amount: i32) -> Self {
        Self {
            resource: Resource::Stamina,
            amount,
        }
    }
}

/// Secondary effects an ability carries, one variant per effect kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbilityEffect {
    Dot {
        per_turn: i32,
        turns: u32,
        label: String,
    },
    Slow {
        magnitude: i32,
        turns: u32,
    },
    Stun {
        turns: u32,
    },
    Buff {
        stat: BuffStat,
        amount: i32,
        turns: u32,
    },
    Summon {
        template_id: String,
    },
    AoeDamage,
    AoeHeal,
}

/// A performable action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub id: String,
    pub name: String,
    pub kind: AbilityKind,
    #[serde(default)]
    pub cost: AbilityCost,
    #[serde(default)]
    pub cooldown: u32,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub heal: i32,
    #[serde(default)]
    pub effects: Vec<AbilityEffect>,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default)]
    pub required_perk: Option<Perk>,
}

impl Ability {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AbilityKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            cost: AbilityCost::FREE,
            cooldown: 0,
            damage: 0,
            heal: 0,
            effects: Vec::new(),
            min_level: 0,
            required_perk: None,
        }
    }

    pub fn with_cost(mut self, cost: AbilityCost) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_cooldown(mut self, cooldown: u32) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_damage(mut self, damage: i32) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_heal(mut self, heal: i32) -> Self {
        self.heal = heal;
        self
    }

    pub fn with_effect(mut self, effect: AbilityEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn requires_perk(mut self, perk: Perk) -> Self {
        self.required_perk = Some(perk);
        self
    }

    pub fn is_summon(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, AbilityEffect::Summon { .. }))
    }

    pub fn is_aoe_damage(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, AbilityEffect::AoeDamage))
    }

    pub fn is_aoe_heal(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, AbilityEffect::AoeHeal))
    }

    pub fn summon_template(&self) -> Option<&str> {
        self.effects.iter().find_map(|e| match e {
            AbilityEffect::Summon { template_id } => Some(template_id.as_str()),
            _ => None,
        })
    }
}

// ============================================================================
// Derived player stats
// ============================================================================

/// Player combat stats derived from sheet plus player-equipped items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub current_health: i32,
    pub max_health: i32,
    pub current_magicka: i32,
    pub max_magicka: i32,
    pub current_stamina: i32,
    pub max_stamina: i32,
    pub armor: i32,
    pub weapon_damage: i32,
    pub crit_chance: f64,
    pub dodge_chance: f64,
    pub magicka_regen: f64,
    pub stamina_regen: f64,
}

impl PlayerStats {
    pub fn is_alive(&self) -> bool {
        self.current_health > 0
    }

    pub fn available(&self, resource: Resource) -> i32 {
        match resource {
            Resource::None => i32::MAX,
            Resource::Magicka => self.current_magicka,
            Resource::Stamina => self.current_stamina,
        }
    }

    /// Spend up to `amount` from the pool, flooring at zero. Returns what
    /// was actually spent.
    pub fn spend(&mut self, resource: Resource, amount: i32) -> i32 {
        let pool = match resource {
            Resource::None => return 0,
            Resource::Magicka => &mut self.current_magicka,
            Resource::Stamina => &mut self.current_stamina,
        };
        let spent = amount.max(0).min(*pool);
        *pool -= spent;
        spent
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        let missing = self.max_health - self.current_health;
        let healed = amount.max(0).min(missing);
        self.current_health += healed;
        healed
    }

    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let applied = amount.max(0).min(self.current_health);
        self.current_health -= applied;
        applied
    }
}

// ============================================================================
// Spell ability table
// ============================================================================

struct SpellUnlock {
    school: Skill,
    min_skill: u32,
    ability: fn() -> Ability,
}

/// School-gated spell abilities, unlocked by skill threshold.
static SPELL_UNLOCKS: LazyLock<Vec<SpellUnlock>> = LazyLock::new(|| {
    vec![
        SpellUnlock {
            school: Skill::Destruction,
            min_skill: 0,
            ability: || {
                Ability::new("flames", "Flames", AbilityKind::Magic)
                    .with_cost(AbilityCost::magicka(14))
                    .with_damage(8)
            },
        },
        SpellUnlock {
            school: Skill::Destruction,
            min_skill: 25,
            ability: || {
                Ability::new("firebolt", "Firebolt", AbilityKind::Magic)
                    .with_cost(AbilityCost::magicka(25))
                    .with_damage(18)
                    .with_effect(AbilityEffect::Dot {
                        per_turn: 3,
                        turns: 2,
                        label: "burning".into(),
                    })
            },
        },
        SpellUnlock {
            school: Skill::Destruction,
            min_skill: 50,
            ability: || {
                Ability::new("fireball", "Fireball", AbilityKind::Aoe)
                    .with_cost(AbilityCost::magicka(60))
                    .with_damage(24)
                    .with_cooldown(2)
                    .with_effect(AbilityEffect::AoeDamage)
            },
        },
        SpellUnlock {
            school: Skill::Restoration,
            min_skill: 0,
            ability: || {
                Ability::new("healing", "Healing", AbilityKind::Magic)
                    .with_cost(AbilityCost::magicka(20))
                    .with_heal(20)
            },
        },
        SpellUnlock {
            school: Skill::Restoration,
            min_skill: 40,
            ability: || {
                Ability::new("grand_healing", "Grand Healing", AbilityKind::Aoe)
                    .with_cost(AbilityCost::magicka(50))
                    .with_heal(25)
                    .with_cooldown(2)
                    .with_effect(AbilityEffect::AoeHeal)
            },
        },
        SpellUnlock {
            school: Skill::Conjuration,
            min_skill: 0,
            ability: || {
                Ability::new("conjure_familiar", "Conjure Familiar", AbilityKind::Magic)
                    .with_cost(AbilityCost::magicka(30))
                    .with_effect(AbilityEffect::Summon {
                        template_id: "familiar".into(),
                    })
            },
        },
        SpellUnlock {
            school: Skill::Conjuration,
            min_skill: 25,
            ability: || {
                Ability::new(
                    "conjure_flame_atronach",
                    "Conjure Flame Atronach",
                    AbilityKind::Magic,
                )
                .with_cost(AbilityCost::magicka(60))
                .with_effect(AbilityEffect::Summon {
                    template_id: "flame_atronach".into(),
                })
            },
        },
    ]
});

// ============================================================================
// Catalog builder
// ============================================================================

/// Build the ordered ability list and derived stats for a character.
///
/// Only items equipped by the player contribute to stats; companion-held
/// gear is filtered out.
pub fn build_catalog(sheet: &CharacterSheet, items: &[ItemRecord]) -> (Vec<Ability>, PlayerStats) {
    let player_items: Vec<&ItemRecord> = items
        .iter()
        .filter(|i| i.equipped && i.owner == ItemOwner::Player)
        .collect();

    let main_hand = player_items.iter().find(|i| i.kind == ItemKind::Weapon);
    let shield = player_items.iter().find(|i| i.kind == ItemKind::Shield);

    let armor: i32 = player_items
        .iter()
        .filter(|i| i.kind == ItemKind::Armor || i.kind == ItemKind::Shield)
        .map(|i| i.armor_rating())
        .sum();

    let weapon_damage = main_hand.map(|w| w.weapon_damage()).unwrap_or(0);

    let stats = PlayerStats {
        current_health: sheet.base_health,
        max_health: sheet.base_health,
        current_magicka: sheet.base_magicka,
        max_magicka: sheet.base_magicka,
        current_stamina: sheet.base_stamina,
        max_stamina: sheet.base_stamina,
        armor,
        weapon_damage,
        crit_chance: sheet.crit_chance,
        dodge_chance: sheet.dodge_chance,
        magicka_regen: sheet.magicka_regen,
        stamina_regen: sheet.stamina_regen,
    };

    let mut catalog = Vec::new();

    // Basic attack synthesized from the main-hand weapon. Ranged for
    // bow-class weapons, melee otherwise. No weapon, no weapon abilities.
    if let Some(weapon) = main_hand {
        let kind = if weapon.is_ranged_weapon() {
            AbilityKind::Ranged
        } else {
            AbilityKind::Melee
        };
        catalog.push(
            Ability::new("attack", format!("Attack ({})", weapon.name), kind)
                .with_damage(weapon.weapon_damage()),
        );

        catalog.push(
            Ability::new("power_attack", "Power Attack", kind)
                .with_cost(AbilityCost::stamina(25))
                .with_damage(weapon.weapon_damage() + 6),
        );

        // Advanced techniques gate on specific perks, never skill alone.
        if sheet.has_perk(Perk::Riposte) {
            catalog.push(
                Ability::new("riposte", "Riposte", AbilityKind::Melee)
                    .with_cost(AbilityCost::stamina(20))
                    .with_damage(weapon.weapon_damage() + 4)
                    .with_cooldown(2)
                    .requires_perk(Perk::Riposte),
            );
        }
        if sheet.has_perk(Perk::SavageSlash) {
            catalog.push(
                Ability::new("savage_slash", "Savage Slash", AbilityKind::Melee)
                    .with_cost(AbilityCost::stamina(25))
                    .with_damage(weapon.weapon_damage() + 2)
                    .with_effect(AbilityEffect::Dot {
                        per_turn: 4,
                        turns: 3,
                        label: "bleeding".into(),
                    })
                    .requires_perk(Perk::SavageSlash),
            );
        }
        if sheet.has_perk(Perk::MortalStrike) {
            catalog.push(
                Ability::new("mortal_strike", "Mortal Strike", AbilityKind::Melee)
                    .with_cost(AbilityCost::stamina(35))
                    .with_damage(weapon.weapon_damage() * 2)
                    .with_cooldown(3)
                    .requires_perk(Perk::MortalStrike),
            );
        }
        if sheet.has_perk(Perk::Whirlwind) {
            catalog.push(
                Ability::new("whirlwind", "Whirlwind", AbilityKind::Aoe)
                    .with_cost(AbilityCost::stamina(40))
                    .with_damage(weapon.weapon_damage())
                    .with_cooldown(3)
                    .with_effect(AbilityEffect::AoeDamage)
                    .requires_perk(Perk::Whirlwind),
            );
        }
        if sheet.has_perk(Perk::Cleave) {
            catalog.push(
                Ability::new("cleave", "Cleave", AbilityKind::Aoe)
                    .with_cost(AbilityCost::stamina(30))
                    .with_damage(weapon.weapon_damage() - 2)
                    .with_cooldown(2)
                    .with_effect(AbilityEffect::AoeDamage)
                    .requires_perk(Perk::Cleave),
            );
        }
    }

    // Unarmed strike: skill threshold OR the unlock perk. Never costs a
    // resource, never takes the low-resource penalty.
    if sheet.skill(Skill::Unarmed) >= UNARMED_SKILL_THRESHOLD || sheet.has_perk(Perk::IronFists) {
        catalog.push(
            Ability::new("unarmed_strike", "Unarmed Strike", AbilityKind::Melee)
                .with_damage(4 + (sheet.skill(Skill::Unarmed) / 10) as i32),
        );
    }

    // Shield block: Block skill threshold plus an equipped shield. Always
    // utility, never melee.
    if sheet.skill(Skill::Block) >= BLOCK_SKILL_THRESHOLD && shield.is_some() {
        catalog.push(
            Ability::new("shield_block", "Shield Block", AbilityKind::Utility)
                .with_cost(AbilityCost::stamina(15))
                .with_effect(AbilityEffect::Buff {
                    stat: BuffStat::Armor,
                    amount: 20,
                    turns: 2,
                }),
        );
    }

    // School-gated spells.
    for unlock in SPELL_UNLOCKS.iter() {
        if sheet.skill(unlock.school) >= unlock.min_skill && sheet.skill(unlock.school) > 0 {
            catalog.push((unlock.ability)());
        }
    }

    (catalog, stats)
}

/// Look up an ability from a built catalog by id.
pub fn find_ability<'a>(catalog: &'a [Ability], id: &str) -> Option<&'a Ability> {
    catalog.iter().find(|a| a.id == id)
}
