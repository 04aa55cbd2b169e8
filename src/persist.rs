//! Save envelope for suspending and resuming a combat.

use crate::abilities::PlayerStats;
use crate::rewards::epoch_ms;
use crate::state::CombatState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// A combat frozen mid-fight, ready to be stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCombat {
    pub version: u32,
    pub saved_at_ms: u64,
    pub state: CombatState,
    pub player: PlayerStats,
}

impl SavedCombat {
    pub fn new(state: CombatState, player: PlayerStats) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at_ms: epoch_ms(),
            state,
            player,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let saved: SavedCombat = serde_json::from_str(json)?;
        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::{build_catalog, CharacterSheet};
    use crate::actor::{Actor, CompanionMeta};
    use crate::state::CombatState;

    fn player() -> PlayerStats {
        build_catalog(&CharacterSheet::new("Hero", 10), &[]).1
    }

    #[test]
    fn test_round_trip_preserves_companion_flags() {
        let mut companion = Actor::new("Lydia", 10, 80, 20, 10)
            .with_companion_meta(CompanionMeta::companion("lydia"));
        if let Some(meta) = companion.companion_meta.as_mut() {
            meta.auto_control = false;
        }
        let summon = Actor::new("Familiar", 10, 30, 0, 6)
            .with_companion_meta(CompanionMeta::summon("familiar", 12));

        let state = CombatState::new(
            vec![Actor::new("Draugr", 6, 55, 15, 11)],
            vec![companion, summon],
        );
        let saved = SavedCombat::new(state, player());
        let json = saved.to_json().unwrap();
        let loaded = SavedCombat::from_json(&json).unwrap();

        let lydia = &loaded.state.allies[0];
        assert!(!lydia.companion_meta.as_ref().unwrap().auto_control);
        let familiar = &loaded.state.allies[1];
        let meta = familiar.companion_meta.as_ref().unwrap();
        assert!(meta.is_summon);
        assert_eq!(meta.player_turns_remaining, 12);
        assert!(!meta.decay_active);
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let state = CombatState::new(vec![Actor::new("Wolf", 2, 20, 0, 5)], Vec::new());
        let mut saved = SavedCombat::new(state, player());
        saved.version = 99;
        let json = saved.to_json().unwrap();
        let err = SavedCombat::from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch { found: 99, .. }
        ));
    }
}
