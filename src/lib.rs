//! Turn-based combat resolution engine for an AI-narrated RPG.
//!
//! This crate provides:
//! - Ability catalogs derived from a character sheet and equipped items
//! - Deterministic d20 action resolution with injectable randomness
//! - Turn order, status effects, summon lifecycles, and enemy behavior
//! - Idempotent victory rewards and a versioned save envelope
//!
//! The engine is fail-soft by design: rejected actions (wrong turn, unknown
//! ability, not enough magicka) come back as narrated outcomes with the
//! state untouched, so the narration layer always has something to say.
//!
//! # Quick Start
//!
//! ```
//! use combat_core::{
//!     Actor, ActionRequest, CharacterSheet, CombatEngine, CombatState, ItemKind, ItemRecord,
//! };
//!
//! let sheet = CharacterSheet::new("Adventurer", 10);
//! let sword = ItemRecord::new("Steel Sword", ItemKind::Weapon).equipped();
//! let (mut engine, mut player) = CombatEngine::new(sheet, vec![sword]);
//!
//! let mut state = CombatState::new(vec![Actor::new("Wolf", 3, 25, 0, 6)], Vec::new());
//! let outcome = engine.resolve(&mut state, &mut player, &ActionRequest::attack("attack"));
//! println!("{}", outcome.narrative);
//! ```

pub mod abilities;
pub mod actor;
pub mod dice;
pub mod effects;
pub mod enemy;
pub mod items;
pub mod persist;
pub mod rewards;
pub mod rules;
pub mod state;
pub mod summons;

// Primary public API
pub use abilities::{
    build_catalog, find_ability, Ability, AbilityCost, AbilityEffect, AbilityKind, CharacterSheet,
    Perk, PlayerStats, Resource, Skill,
};
pub use actor::{Actor, ActorId, ActorType, CompanionMeta};
pub use dice::{OutcomeRoll, RollTier};
pub use effects::{ActiveEffect, BuffStat, Effect};
pub use enemy::{recommended_enemy_count, scaled_enemy, BehaviorTag, EnemyTemplate};
pub use items::{ArrowKind, Inventory, ItemKind, ItemOwner, ItemRecord, PotionVital};
pub use persist::{PersistError, SavedCombat, SAVE_VERSION};
pub use rewards::{
    generate_rewards, LootItem, Rarity, RewardBundle, TransactionLedger, LEDGER_RETENTION_MS,
};
pub use rules::{
    ActionConsumed, ActionKind, ActionOutcome, ActionRequest, AoeEntry, AoeSummary, CombatEngine,
    CRIT_STUN_CHANCE, GUARD_DAMAGE_REDUCTION, GUARD_MAX_ROUNDS,
};
pub use state::{CombatResult, CombatState, LogEntry, LogKind, TurnSlot};
pub use summons::{summon_cap, SummonCast, SUMMON_BASE_CAP, SUMMON_MAX_CAP};
