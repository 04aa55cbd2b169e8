//! Outcome-roll machinery.
//!
//! Every probabilistic resolution in the engine is driven by a single d20
//! outcome roll. Callers may supply a fixed roll (deterministic replay and
//! tests) or let the roll come from an injected RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lowest possible outcome roll (automatic failure).
pub const MIN_ROLL: u8 = 1;
/// Highest possible outcome roll (critical success).
pub const MAX_ROLL: u8 = 20;

/// Error type for roll construction.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Outcome roll {0} is outside the {MIN_ROLL}-{MAX_ROLL} range")]
    OutOfRange(u8),
}

/// A single d20 outcome roll driving success-tier resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRoll(u8);

impl OutcomeRoll {
    /// Construct from a known value, rejecting values outside 1-20.
    pub fn new(value: u8) -> Result<Self, DiceError> {
        if (MIN_ROLL..=MAX_ROLL).contains(&value) {
            Ok(OutcomeRoll(value))
        } else {
            Err(DiceError::OutOfRange(value))
        }
    }

    /// Construct from an untrusted value, clamping into the valid range.
    ///
    /// The engine is fail-soft: a caller handing us 0 or 255 gets a legal
    /// roll rather than a hard error.
    pub fn clamped(value: u8) -> Self {
        OutcomeRoll(value.clamp(MIN_ROLL, MAX_ROLL))
    }

    /// Roll a fresh d20 from the given RNG.
    pub fn roll<R: Rng>(rng: &mut R) -> Self {
        OutcomeRoll(rng.gen_range(MIN_ROLL..=MAX_ROLL))
    }

    /// Use the supplied fixed roll if present, otherwise draw from the RNG.
    pub fn resolve<R: Rng>(fixed: Option<u8>, rng: &mut R) -> Self {
        match fixed {
            Some(v) => OutcomeRoll::clamped(v),
            None => OutcomeRoll::roll(rng),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Natural 1: automatic failure.
    pub fn is_fumble(self) -> bool {
        self.0 == MIN_ROLL
    }

    /// Natural 20: critical success.
    pub fn is_critical(self) -> bool {
        self.0 == MAX_ROLL
    }

    pub fn tier(self) -> RollTier {
        match self.0 {
            1 => RollTier::Fumble,
            2..=7 => RollTier::Weak,
            8..=14 => RollTier::Normal,
            15..=19 => RollTier::Strong,
            _ => RollTier::Critical,
        }
    }
}

impl fmt::Display for OutcomeRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Success tiers for an outcome roll, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RollTier {
    Fumble,
    Weak,
    Normal,
    Strong,
    Critical,
}

impl RollTier {
    /// Multiplier applied to damage and summon scaling for this tier.
    pub fn scale(self) -> f64 {
        match self {
            RollTier::Fumble => 0.0,
            RollTier::Weak => 0.75,
            RollTier::Normal => 1.0,
            RollTier::Strong => 1.25,
            RollTier::Critical => 1.5,
        }
    }
}

/// Draw a yes/no event with the given probability.
///
/// Probabilities outside [0, 1] are clamped rather than panicking.
pub fn percent_chance<R: Rng>(rng: &mut R, chance: f64) -> bool {
    rng.gen_bool(chance.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(OutcomeRoll::new(0).is_err());
        assert!(OutcomeRoll::new(21).is_err());
        assert!(OutcomeRoll::new(1).is_ok());
        assert!(OutcomeRoll::new(20).is_ok());
    }

    #[test]
    fn test_clamped_is_fail_soft() {
        assert_eq!(OutcomeRoll::clamped(0).value(), 1);
        assert_eq!(OutcomeRoll::clamped(255).value(), 20);
        assert_eq!(OutcomeRoll::clamped(13).value(), 13);
    }

    #[test]
    fn test_roll_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let roll = OutcomeRoll::roll(&mut rng);
            assert!(roll.value() >= 1 && roll.value() <= 20);
        }
    }

    #[test]
    fn test_fixed_roll_bypasses_rng() {
        let mut rng = StdRng::seed_from_u64(7);
        let roll = OutcomeRoll::resolve(Some(20), &mut rng);
        assert!(roll.is_critical());
        let roll = OutcomeRoll::resolve(Some(1), &mut rng);
        assert!(roll.is_fumble());
    }

    #[test]
    fn test_tiers() {
        assert_eq!(OutcomeRoll::clamped(1).tier(), RollTier::Fumble);
        assert_eq!(OutcomeRoll::clamped(5).tier(), RollTier::Weak);
        assert_eq!(OutcomeRoll::clamped(10).tier(), RollTier::Normal);
        assert_eq!(OutcomeRoll::clamped(17).tier(), RollTier::Strong);
        assert_eq!(OutcomeRoll::clamped(20).tier(), RollTier::Critical);
    }
}
