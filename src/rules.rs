//! Action resolution.
//!
//! The engine turns a player's action request into state mutation plus a
//! narrative. Rejections (wrong turn, unknown ability, cap reached, not
//! enough magicka) are not errors: they come back as normal outcomes with
//! an explanatory narrative and the state untouched, so the narration
//! layer can always speak.

use crate::abilities::{
    build_catalog, find_ability, Ability, AbilityEffect, AbilityKind, CharacterSheet, PlayerStats,
    Resource,
};
use crate::actor::{Actor, ActorId};
use crate::dice::{percent_chance, OutcomeRoll, RollTier};
use crate::effects::{self, ActiveEffect, Effect};
use crate::enemy::{self, NpcChoice};
use crate::items::{arrow_kind, potion_restore_amount, potion_vital, ArrowKind, Inventory, ItemKind, ItemRecord, PotionVital};
use crate::state::{CombatResult, CombatState, LogKind, TurnSlot};
use crate::summons::{self, SummonCast};
use crate::abilities::Perk;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Chance that a critical weapon hit also stuns for one turn.
pub const CRIT_STUN_CHANCE: f64 = 0.5;
/// Tactical Guard multiplies incoming damage by (1 - this), after armor.
pub const GUARD_DAMAGE_REDUCTION: f64 = 0.4;
/// Guard duration never exceeds this many rounds regardless of perks.
pub const GUARD_MAX_ROUNDS: u32 = 3;
/// Mitigation fraction contributed by each point of armor.
pub const ARMOR_MITIGATION_PER_POINT: f64 = 0.004;
/// Armor mitigation ceiling.
pub const ARMOR_MITIGATION_CAP: f64 = 0.8;
/// Effectiveness multiplier when acting on insufficient stamina.
pub const LOW_RESOURCE_PENALTY: f64 = 0.5;

const FIRE_ARROW_BONUS: i32 = 5;
const FIRE_ARROW_BURN: i32 = 4;
const SHOCK_ARROW_DOT: i32 = 4;
const SHOCK_ARROW_STUN_CHANCE: f64 = 0.5;
const ICE_ARROW_SLOW: i32 = 3;
const PARALYZE_STUN_CHANCE: f64 = 0.25;
const PARALYZE_STUN_TURNS: u32 = 2;

/// How incoming armor translates to a damage fraction absorbed.
pub fn armor_mitigation(armor: i32) -> f64 {
    (armor.max(0) as f64 * ARMOR_MITIGATION_PER_POINT).min(ARMOR_MITIGATION_CAP)
}

// ============================================================================
// Requests and outcomes
// ============================================================================

/// Player intent categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Attack,
    Defend,
    Magic,
    Item,
    Skip,
}

/// A player action as handed in by the intent layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub kind: ActionKind,
    #[serde(default)]
    pub ability_id: Option<String>,
    #[serde(default)]
    pub target: Option<ActorId>,
    #[serde(default)]
    pub item_name: Option<String>,
    /// Ammunition item name for ranged attacks.
    #[serde(default)]
    pub ammo: Option<String>,
    /// Fixed outcome roll, bypassing the RNG when present.
    #[serde(default)]
    pub roll: Option<u8>,
}

impl ActionRequest {
    pub fn attack(ability_id: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Attack,
            ability_id: Some(ability_id.into()),
            target: None,
            item_name: None,
            ammo: None,
            roll: None,
        }
    }

    pub fn magic(ability_id: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Magic,
            ..Self::attack(ability_id)
        }
    }

    pub fn defend() -> Self {
        Self {
            kind: ActionKind::Defend,
            ability_id: None,
            target: None,
            item_name: None,
            ammo: None,
            roll: None,
        }
    }

    pub fn item(name: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Item,
            ability_id: None,
            target: None,
            item_name: Some(name.into()),
            ammo: None,
            roll: None,
        }
    }

    pub fn skip() -> Self {
        Self {
            kind: ActionKind::Skip,
            ability_id: None,
            target: None,
            item_name: None,
            ammo: None,
            roll: None,
        }
    }

    pub fn with_target(mut self, target: ActorId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_ammo(mut self, ammo: impl Into<String>) -> Self {
        self.ammo = Some(ammo.into());
        self
    }

    pub fn with_roll(mut self, roll: u8) -> Self {
        self.roll = Some(roll);
        self
    }
}

/// Which action slots the resolution consumed. A defend or a potion is a
/// bonus action; an ammo-augmented shot consumes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionConsumed {
    pub main: bool,
    pub bonus: bool,
}

impl ActionConsumed {
    pub const NONE: ActionConsumed = ActionConsumed {
        main: false,
        bonus: false,
    };
    pub const MAIN: ActionConsumed = ActionConsumed {
        main: true,
        bonus: false,
    };
    pub const BONUS: ActionConsumed = ActionConsumed {
        main: false,
        bonus: true,
    };
    pub const BOTH: ActionConsumed = ActionConsumed {
        main: true,
        bonus: true,
    };
}

/// One target touched by an area pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AoeEntry {
    pub name: String,
    pub amount: i32,
}

/// Per-target results of a single area action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AoeSummary {
    pub damaged: Vec<AoeEntry>,
    pub healed: Vec<AoeEntry>,
}

/// The resolved result of one action request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub narrative: String,
    /// The outcome roll consumed, when one was.
    pub roll: Option<u8>,
    pub consumed: ActionConsumed,
    /// Post-consumption snapshot of an item used this action.
    pub used_item: Option<ItemRecord>,
    pub aoe: Option<AoeSummary>,
    /// True when the request was refused without touching state.
    pub rejected: bool,
}

impl ActionOutcome {
    fn rejection(narrative: impl Into<String>) -> Self {
        Self {
            narrative: narrative.into(),
            roll: None,
            consumed: ActionConsumed::NONE,
            used_item: None,
            aoe: None,
            rejected: true,
        }
    }

    fn resolved(narrative: impl Into<String>, roll: Option<u8>, consumed: ActionConsumed) -> Self {
        Self {
            narrative: narrative.into(),
            roll,
            consumed,
            used_item: None,
            aoe: None,
            rejected: false,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Stateless-per-turn resolver holding the character's catalog and bag.
#[derive(Debug, Clone)]
pub struct CombatEngine {
    pub sheet: CharacterSheet,
    pub catalog: Vec<Ability>,
    pub inventory: Inventory,
}

impl CombatEngine {
    /// Build the engine and the derived player stats from a sheet and the
    /// character's items.
    pub fn new(sheet: CharacterSheet, items: Vec<ItemRecord>) -> (Self, PlayerStats) {
        let (catalog, stats) = build_catalog(&sheet, &items);
        let engine = Self {
            sheet,
            catalog,
            inventory: Inventory::new(items),
        };
        (engine, stats)
    }

    pub fn resolve(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        request: &ActionRequest,
    ) -> ActionOutcome {
        let mut rng = rand::thread_rng();
        self.resolve_with_rng(state, player, request, &mut rng)
    }

    /// Resolve one player action. A consumed main action also advances the
    /// turn; bonus actions and rejections leave the turn with the player.
    pub fn resolve_with_rng<R: Rng>(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        request: &ActionRequest,
        rng: &mut R,
    ) -> ActionOutcome {
        if state.result != CombatResult::Active {
            return ActionOutcome::rejection("The fight is already over.");
        }
        if !state.is_player_turn() {
            return ActionOutcome::rejection("It is not your turn to act.");
        }

        // Stun short-circuit: no roll is consumed, the turn is forcibly
        // skipped, and the request itself is ignored.
        if effects::is_stunned(&state.player_effects) {
            let narrative = "You are stunned and cannot act!".to_string();
            state.push_log(LogKind::Stunned, "Player", None, narrative.clone());
            state.advance_turn(player);
            return ActionOutcome::resolved(narrative, None, ActionConsumed::MAIN);
        }

        let outcome = match request.kind {
            ActionKind::Skip => self.resolve_skip(state),
            ActionKind::Defend => self.resolve_guard(state),
            ActionKind::Item => self.resolve_item(state, player, request),
            ActionKind::Attack | ActionKind::Magic => {
                self.resolve_ability(state, player, request, rng)
            }
        };

        if outcome.consumed.main {
            state.advance_turn(player);
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Skip
    // ------------------------------------------------------------------

    /// Skipping is always legal and never consumes a roll.
    fn resolve_skip(&self, state: &mut CombatState) -> ActionOutcome {
        let narrative = format!("{} holds their ground and waits.", self.sheet.name);
        state.push_log(LogKind::Skip, "Player", None, narrative.clone());
        ActionOutcome::resolved(narrative, None, ActionConsumed::MAIN)
    }

    // ------------------------------------------------------------------
    // Tactical Guard
    // ------------------------------------------------------------------

    fn resolve_guard(&self, state: &mut CombatState) -> ActionOutcome {
        if state.player_guard_used {
            return ActionOutcome::rejection(
                "You have already steeled yourself once this fight; the stance cannot be taken again.",
            );
        }
        let rounds = (1 + self.sheet.perk_rank(Perk::StalwartGuard) as u32).min(GUARD_MAX_ROUNDS);
        state.player_guard_used = true;
        state.player_defending = true;
        state.guard_rounds_remaining = rounds;
        let narrative = format!(
            "You drop into a guarded stance, ready to turn aside the next blows for {rounds} round{}.",
            if rounds == 1 { "" } else { "s" }
        );
        state.push_log(LogKind::Defend, "Player", None, narrative.clone());
        ActionOutcome::resolved(narrative, None, ActionConsumed::BONUS)
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Drink a potion as a bonus action. The restore amount clamps to the
    /// vital's missing headroom, and the outcome carries a post-consumption
    /// snapshot of the item.
    fn resolve_item(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        request: &ActionRequest,
    ) -> ActionOutcome {
        let Some(name) = request.item_name.as_deref() else {
            return ActionOutcome::rejection("Which item did you mean to use?");
        };
        let Some(item) = self.inventory.find(name).cloned() else {
            return ActionOutcome::rejection(format!("You carry no {name}."));
        };
        if item.quantity == 0 {
            return ActionOutcome::rejection(format!("You carry no {name}."));
        }
        if item.kind != ItemKind::Potion {
            return ActionOutcome::rejection(format!(
                "{} is not something you can use mid-fight.",
                item.name
            ));
        }

        let vital = potion_vital(&item).unwrap_or(PotionVital::Health);
        let amount = potion_restore_amount(&item);
        let restored = match vital {
            PotionVital::Health => player.heal(amount),
            PotionVital::Magicka => {
                let gain = amount.min(player.max_magicka - player.current_magicka);
                player.current_magicka += gain;
                gain
            }
            PotionVital::Stamina => {
                let gain = amount.min(player.max_stamina - player.current_stamina);
                player.current_stamina += gain;
                gain
            }
        };

        let snapshot = self.inventory.consume_one(name);
        let narrative = format!(
            "You drink the {} and recover {restored} {}.",
            item.name,
            vital.name()
        );
        state.push_log(LogKind::Item, "Player", None, narrative.clone());
        let mut outcome = ActionOutcome::resolved(narrative, None, ActionConsumed::BONUS);
        outcome.used_item = snapshot;
        outcome
    }

    // ------------------------------------------------------------------
    // Abilities
    // ------------------------------------------------------------------

    fn resolve_ability<R: Rng>(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        request: &ActionRequest,
        rng: &mut R,
    ) -> ActionOutcome {
        let id = request.ability_id.as_deref().unwrap_or("attack");
        let Some(ability) = find_ability(&self.catalog, id).cloned() else {
            return ActionOutcome::rejection(format!(
                "You fumble for a move you don't know ('{id}') and think better of it."
            ));
        };

        if let Some(remaining) = state.ability_cooldowns.get(&ability.id) {
            return ActionOutcome::rejection(format!(
                "{} is not ready yet ({remaining} turn{} remaining).",
                ability.name,
                if *remaining == 1 { "" } else { "s" }
            ));
        }

        // Insufficient magicka is a plain refusal: no roll, no cost.
        if ability.cost.resource == Resource::Magicka
            && player.available(Resource::Magicka) < ability.cost.amount
        {
            return ActionOutcome::rejection(format!(
                "You lack the magicka to cast {}.",
                ability.name
            ));
        }

        if ability.is_summon() {
            return self.resolve_summon(state, player, &ability, request, rng);
        }
        if ability.is_aoe_damage() || ability.is_aoe_heal() {
            return self.resolve_aoe(state, player, &ability, request, rng);
        }
        if ability.heal > 0 {
            return self.resolve_heal(state, player, &ability, request, rng);
        }
        self.resolve_strike(state, player, &ability, request, rng)
    }

    fn resolve_summon<R: Rng>(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        ability: &Ability,
        request: &ActionRequest,
        rng: &mut R,
    ) -> ActionOutcome {
        // The cap is checked before any roll or resource is consumed.
        if let Some(refusal) = summons::check_summon_cap(state, &self.sheet) {
            return ActionOutcome::rejection(refusal);
        }
        let template_id = ability.summon_template().unwrap_or_default().to_string();

        player.spend(ability.cost.resource, ability.cost.amount);
        let roll = OutcomeRoll::resolve(request.roll, rng);
        let cast = summons::cast_summon(state, self.sheet.level, &template_id, roll);
        self.start_cooldown(state, ability);

        let narrative = match cast {
            SummonCast::Failed { narrative } => narrative,
            SummonCast::Summoned { narrative, .. } => narrative,
        };
        state.push_log(LogKind::Summon, "Player", Some(roll.value()), narrative.clone());
        // A conjuration is a bonus action; the main action stays available.
        ActionOutcome::resolved(narrative, Some(roll.value()), ActionConsumed::BONUS)
    }

    fn resolve_aoe<R: Rng>(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        ability: &Ability,
        request: &ActionRequest,
        rng: &mut R,
    ) -> ActionOutcome {
        let roll = OutcomeRoll::resolve(request.roll, rng);

        // A fumbled area action fails outright and costs nothing.
        if roll.is_fumble() {
            let narrative = format!(
                "{} fizzles catastrophically, touching no one.",
                ability.name
            );
            state.push_log(LogKind::Magic, "Player", Some(roll.value()), narrative.clone());
            let mut outcome =
                ActionOutcome::resolved(narrative, Some(roll.value()), ActionConsumed::MAIN);
            outcome.aoe = Some(AoeSummary::default());
            return outcome;
        }

        let strained = self.spend_with_strain(player, ability);
        let scale = roll.tier().scale() * if strained { LOW_RESOURCE_PENALTY } else { 1.0 };
        let mut summary = AoeSummary::default();

        if ability.is_aoe_damage() {
            let base = ability.damage + effects::damage_modifier(&state.player_effects);
            let apply: Vec<ActorId> = state.living_enemies().map(|e| e.id).collect();
            for id in apply {
                if let Some(enemy) = state.find_actor_mut(id) {
                    let raw = (base as f64 * scale).floor() as i32;
                    let mitigated = mitigate(raw, enemy.armor + effects::armor_modifier(&enemy.active_effects));
                    let applied = enemy.take_damage(mitigated);
                    summary.damaged.push(AoeEntry {
                        name: enemy.name.clone(),
                        amount: applied,
                    });
                }
            }
        }
        if ability.is_aoe_heal() {
            let amount = (ability.heal as f64 * scale).floor() as i32;
            let healed = player.heal(amount);
            summary.healed.push(AoeEntry {
                name: self.sheet.name.clone(),
                amount: healed,
            });
            let apply: Vec<ActorId> = state.living_allies().map(|a| a.id).collect();
            for id in apply {
                if let Some(ally) = state.find_actor_mut(id) {
                    let healed = ally.heal(amount);
                    summary.healed.push(AoeEntry {
                        name: ally.name.clone(),
                        amount: healed,
                    });
                }
            }
        }

        // The whole sweep is narrated as one line; targets are never logged
        // individually.
        let narrative = aoe_narrative(ability, &summary, strained);
        state.push_log(LogKind::Magic, "Player", Some(roll.value()), narrative.clone());
        self.start_cooldown(state, ability);

        let mut outcome =
            ActionOutcome::resolved(narrative, Some(roll.value()), ActionConsumed::MAIN);
        outcome.aoe = Some(summary);
        outcome
    }

    fn resolve_heal<R: Rng>(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        ability: &Ability,
        request: &ActionRequest,
        rng: &mut R,
    ) -> ActionOutcome {
        let strained = self.spend_with_strain(player, ability);
        let roll = OutcomeRoll::resolve(request.roll, rng);

        if roll.is_fumble() {
            let narrative = format!("{} sputters out; the magic slips away.", ability.name);
            state.push_log(LogKind::Magic, "Player", Some(roll.value()), narrative.clone());
            return ActionOutcome::resolved(narrative, Some(roll.value()), ActionConsumed::MAIN);
        }

        let scale = roll.tier().scale() * if strained { LOW_RESOURCE_PENALTY } else { 1.0 };
        let amount = (ability.heal as f64 * scale).floor() as i32;

        // Heals aimed at anything but an ally land on the caster. A heal
        // "cast at" an enemy is redirected, never inverted into damage.
        let (healed, patient, redirected) = match request.target {
            Some(id) if state.is_ally(id) => {
                let name = state.display_name(id);
                let healed = state
                    .find_actor_mut(id)
                    .map(|a| a.heal(amount))
                    .unwrap_or(0);
                (healed, name, false)
            }
            Some(id) if state.is_enemy(id) => (player.heal(amount), self.sheet.name.clone(), true),
            _ => (player.heal(amount), self.sheet.name.clone(), false),
        };

        self.start_cooldown(state, ability);
        let mut narrative = format!(
            "{} washes over {patient}, restoring {healed} health.",
            ability.name
        );
        if redirected {
            narrative.push_str(" The spell bends back to its caster; it will not mend an enemy.");
        }
        if strained {
            narrative.push_str(" The casting feels strained and thin.");
        }
        state.push_log(LogKind::Magic, "Player", Some(roll.value()), narrative.clone());
        ActionOutcome::resolved(narrative, Some(roll.value()), ActionConsumed::MAIN)
    }

    fn resolve_strike<R: Rng>(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        ability: &Ability,
        request: &ActionRequest,
        rng: &mut R,
    ) -> ActionOutcome {
        let target_id = match request.target {
            Some(id) => {
                if state.is_ally(id) {
                    return ActionOutcome::rejection("You will not strike an ally.");
                }
                if !state.is_enemy(id) {
                    return ActionOutcome::rejection("There is no such foe here.");
                }
                id
            }
            None => match state.living_enemies().next() {
                Some(enemy) => enemy.id,
                None => return ActionOutcome::rejection("There is nothing left to fight."),
            },
        };
        if !state
            .find_actor(target_id)
            .map(|t| t.is_alive())
            .unwrap_or(false)
        {
            return ActionOutcome::rejection(format!(
                "{} is already down.",
                state.display_name(target_id)
            ));
        }

        let strained = self.spend_with_strain(player, ability);
        let roll = OutcomeRoll::resolve(request.roll, rng);
        let target_name = state.display_name(target_id);

        // Elemental ammunition rides along on ranged attacks as a bonus
        // action; exactly one unit is consumed even on a miss.
        let mut consumed = ActionConsumed::MAIN;
        let mut ammo_used: Option<ItemRecord> = None;
        let mut ammo_suffix = String::new();
        if let Some(ammo_name) = &request.ammo {
            if ability.kind == AbilityKind::Ranged {
                match self.inventory.consume_one(ammo_name) {
                    Some(snapshot) => {
                        consumed = ActionConsumed::BOTH;
                        ammo_used = Some(snapshot);
                    }
                    None => {
                        ammo_suffix = format!(" Your quiver holds no {ammo_name}; the shot flies plain.");
                    }
                }
            }
        }

        if roll.is_fumble() {
            let narrative = format!(
                "Your {} goes wide; {target_name} slips aside untouched.{ammo_suffix}",
                ability.name
            );
            state.push_log(LogKind::Attack, "Player", Some(roll.value()), narrative.clone());
            let mut outcome = ActionOutcome::resolved(narrative, Some(roll.value()), consumed);
            outcome.used_item = ammo_used;
            return outcome;
        }

        // A strong hit can be upgraded to a critical by the crit stat; a
        // natural 20 is always critical.
        let mut tier = roll.tier();
        if tier == RollTier::Strong && percent_chance(rng, player.crit_chance) {
            tier = RollTier::Critical;
        }

        let scale = tier.scale() * if strained { LOW_RESOURCE_PENALTY } else { 1.0 };
        let base = ability.damage + effects::damage_modifier(&state.player_effects);
        let raw = (base as f64 * scale).floor().max(0.0) as i32;

        let mut rider_lines = Vec::new();
        let mut applied = 0;
        let is_weapon_hit = matches!(ability.kind, AbilityKind::Melee | AbilityKind::Ranged);
        let crit_stuns = tier == RollTier::Critical
            && is_weapon_hit
            && percent_chance(rng, CRIT_STUN_CHANCE);

        if let Some(target) = state.find_actor_mut(target_id) {
            let mitigated = mitigate(raw, target.armor + effects::armor_modifier(&target.active_effects));
            applied = target.take_damage(mitigated);

            if target.is_alive() {
                for effect in &ability.effects {
                    if let Some(active) = rider_effect(effect) {
                        rider_lines.push(format!("{} is {}.", target.name, active.effect.name()));
                        target.active_effects.push(active);
                    }
                }
                if crit_stuns {
                    target
                        .active_effects
                        .push(ActiveEffect::new(Effect::Stun, 1));
                    rider_lines.push(format!("{} reels, stunned by the blow!", target.name));
                }
            }
        }

        // Arrow riders land after the hit itself, scaled by the final tier.
        if let Some(arrow) = ammo_used.as_ref().and_then(arrow_kind) {
            rider_lines.extend(self.apply_arrow_rider(state, target_id, arrow, tier, rng));
        }

        let tier_text = match tier {
            RollTier::Critical => "A devastating critical hit! ",
            RollTier::Strong => "A telling blow! ",
            RollTier::Weak => "A glancing hit. ",
            _ => "",
        };
        let strain_text = if strained {
            " Your limbs drag with exhaustion; the blow lands softer than it should."
        } else {
            ""
        };
        let mut narrative = format!(
            "{tier_text}Your {} strikes {target_name} for {applied} damage.{strain_text}{ammo_suffix}",
            ability.name
        );
        for line in &rider_lines {
            narrative.push(' ');
            narrative.push_str(line);
        }
        if !state
            .find_actor(target_id)
            .map(|t| t.is_alive())
            .unwrap_or(true)
        {
            narrative.push_str(&format!(" {target_name} falls!"));
        }

        state.push_log(LogKind::Attack, "Player", Some(roll.value()), narrative.clone());
        self.start_cooldown(state, ability);

        let mut outcome = ActionOutcome::resolved(narrative, Some(roll.value()), consumed);
        outcome.used_item = ammo_used;
        outcome
    }

    fn apply_arrow_rider<R: Rng>(
        &self,
        state: &mut CombatState,
        target_id: ActorId,
        arrow: ArrowKind,
        tier: RollTier,
        rng: &mut R,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        match arrow {
            ArrowKind::Fire => {
                if let Some(target) = state.find_actor_mut(target_id) {
                    let burn = target.take_damage(FIRE_ARROW_BONUS);
                    target.active_effects.push(ActiveEffect::new(
                        Effect::DamageOverTime {
                            per_turn: FIRE_ARROW_BURN,
                            label: "burning".into(),
                        },
                        2,
                    ));
                    lines.push(format!(
                        "The fire arrow sears for {burn} more and leaves {} burning.",
                        target.name
                    ));
                }
            }
            ArrowKind::Shock => {
                // Electrocution magnitude follows the tier; strong tiers
                // carry an additional stun draw.
                let per_turn = ((SHOCK_ARROW_DOT as f64) * tier.scale()).floor().max(1.0) as i32;
                let stuns =
                    tier >= RollTier::Strong && percent_chance(rng, SHOCK_ARROW_STUN_CHANCE);
                if let Some(target) = state.find_actor_mut(target_id) {
                    target.active_effects.push(ActiveEffect::new(
                        Effect::DamageOverTime {
                            per_turn,
                            label: "electrocution".into(),
                        },
                        2,
                    ));
                    lines.push(format!(
                        "Lightning crawls over {}, leaving them crackling with electrocution.",
                        target.name
                    ));
                    if stuns {
                        target.active_effects.push(ActiveEffect::new(Effect::Stun, 1));
                        lines.push(format!("{} convulses, stunned by the current!", target.name));
                    }
                }
            }
            ArrowKind::Ice => {
                if let Some(target) = state.find_actor_mut(target_id) {
                    target.active_effects.push(ActiveEffect::new(
                        Effect::Slow {
                            magnitude: ICE_ARROW_SLOW,
                        },
                        2,
                    ));
                    lines.push(format!("Frost rimes {}'s limbs, slowing them.", target.name));
                }
            }
            ArrowKind::Paralyze => {
                // Strong tiers always take hold; lesser hits only sometimes.
                let holds =
                    tier >= RollTier::Strong || percent_chance(rng, PARALYZE_STUN_CHANCE);
                if let Some(target) = state.find_actor_mut(target_id) {
                    if holds {
                        target
                            .active_effects
                            .push(ActiveEffect::new(Effect::Stun, PARALYZE_STUN_TURNS));
                        lines.push(format!("{} seizes up, paralyzed!", target.name));
                    } else {
                        lines.push(format!(
                            "The paralysis venom fails to take hold of {}.",
                            target.name
                        ));
                    }
                }
            }
            ArrowKind::Command => {
                // The command spurs one allied actor into an immediate
                // bonus attack.
                let ally = state
                    .living_allies()
                    .next()
                    .map(|a| (a.name.clone(), a.damage));
                let Some((ally_name, ally_damage)) = ally else {
                    lines.push("The command rings out, but no ally answers it.".into());
                    return lines;
                };
                let victim_id = state
                    .find_actor(target_id)
                    .filter(|t| t.is_alive())
                    .map(|t| t.id)
                    .or_else(|| state.living_enemies().next().map(|e| e.id));
                if let Some(victim_id) = victim_id {
                    let (victim_name, dealt) = match state.find_actor_mut(victim_id) {
                        Some(v) => {
                            let mitigated = mitigate(
                                ally_damage,
                                v.armor + effects::armor_modifier(&v.active_effects),
                            );
                            (v.name.clone(), v.take_damage(mitigated))
                        }
                        None => (String::new(), 0),
                    };
                    lines.push(format!(
                        "Spurred by the command, {ally_name} lashes out at {victim_name} for {dealt} damage!"
                    ));
                } else {
                    lines.push(format!(
                        "{ally_name} surges forward, but no foe remains to strike."
                    ));
                }
            }
        }
        lines
    }

    /// Spend an ability's cost. Returns true when stamina fell short and
    /// the action should resolve strained. Magicka shortfalls never reach
    /// here; they are rejected earlier.
    fn spend_with_strain(&self, player: &mut PlayerStats, ability: &Ability) -> bool {
        match ability.cost.resource {
            Resource::None => false,
            Resource::Magicka => {
                player.spend(Resource::Magicka, ability.cost.amount);
                false
            }
            Resource::Stamina => {
                let had = player.available(Resource::Stamina);
                player.spend(Resource::Stamina, ability.cost.amount);
                had < ability.cost.amount
            }
        }
    }

    fn start_cooldown(&self, state: &mut CombatState, ability: &Ability) {
        if ability.cooldown > 0 {
            state
                .ability_cooldowns
                .insert(ability.id.clone(), ability.cooldown);
        }
    }

    // ------------------------------------------------------------------
    // Flee / surrender
    // ------------------------------------------------------------------

    pub fn attempt_flee<R: Rng>(
        &self,
        state: &mut CombatState,
        request_roll: Option<u8>,
        rng: &mut R,
    ) -> ActionOutcome {
        if state.result != CombatResult::Active {
            return ActionOutcome::rejection("The fight is already over.");
        }
        if !state.flee_allowed {
            return ActionOutcome::rejection("There is no way out of this fight.");
        }
        let roll = OutcomeRoll::resolve(request_roll, rng);
        if roll.tier() >= RollTier::Normal {
            state.mark_fled();
            let narrative = "You break away from the fight and escape.".to_string();
            state.push_log(LogKind::System, "Player", Some(roll.value()), narrative.clone());
            ActionOutcome::resolved(narrative, Some(roll.value()), ActionConsumed::MAIN)
        } else {
            let narrative = "You look for an opening to run, but your enemies cut you off.".to_string();
            state.push_log(LogKind::System, "Player", Some(roll.value()), narrative.clone());
            ActionOutcome::resolved(narrative, Some(roll.value()), ActionConsumed::MAIN)
        }
    }

    pub fn attempt_surrender(&self, state: &mut CombatState) -> ActionOutcome {
        if state.result != CombatResult::Active {
            return ActionOutcome::rejection("The fight is already over.");
        }
        if !state.surrender_allowed {
            return ActionOutcome::rejection("These foes will accept no surrender.");
        }
        state.mark_fled();
        let narrative = "You lower your weapon and yield.".to_string();
        state.push_log(LogKind::System, "Player", None, narrative.clone());
        ActionOutcome::resolved(narrative, None, ActionConsumed::MAIN)
    }

    // ------------------------------------------------------------------
    // Non-player turns
    // ------------------------------------------------------------------

    pub fn resolve_npc_turn(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
    ) -> Vec<String> {
        let mut rng = rand::thread_rng();
        self.resolve_npc_turn_with_rng(state, player, &mut rng)
    }

    /// Resolve the turn of whichever non-player actor currently holds it,
    /// then advance. Returns the narrative lines produced.
    pub fn resolve_npc_turn_with_rng<R: Rng>(
        &mut self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        rng: &mut R,
    ) -> Vec<String> {
        let TurnSlot::Actor(id) = state.current_slot() else {
            return vec!["It is the player's turn.".to_string()];
        };
        let Some(actor) = state.find_actor(id).cloned() else {
            state.advance_turn(player);
            return Vec::new();
        };

        let mut lines = Vec::new();

        if actor.is_stunned() {
            let line = format!("{} is stunned and loses their turn!", actor.name);
            state.push_log(LogKind::Stunned, actor.name.clone(), None, line.clone());
            lines.push(line);
        } else if state.is_ally(id) {
            lines.extend(self.ally_act(state, &actor, rng));
        } else {
            lines.extend(self.enemy_act(state, player, id, &actor, rng));
        }

        state.advance_turn(player);
        lines
    }

    fn ally_act<R: Rng>(
        &self,
        state: &mut CombatState,
        actor: &Actor,
        rng: &mut R,
    ) -> Vec<String> {
        let auto = actor
            .companion_meta
            .as_ref()
            .map(|m| m.auto_control)
            .unwrap_or(true);
        if !auto {
            let line = format!("{} holds position, awaiting your command.", actor.name);
            state.push_log(LogKind::System, actor.name.clone(), None, line.clone());
            return vec![line];
        }

        // Companions focus the weakest enemy still standing.
        let target = state
            .living_enemies()
            .min_by(|a, b| {
                a.health_ratio()
                    .partial_cmp(&b.health_ratio())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|e| e.id);
        let Some(target_id) = target else {
            return Vec::new();
        };

        let roll = OutcomeRoll::roll(rng);
        let line = if roll.is_fumble() {
            format!("{} lunges and misses entirely.", actor.name)
        } else {
            let raw = (actor.damage as f64 * roll.tier().scale()).floor() as i32;
            // Companion crits stun their targets on the same draw as any
            // other melee critical.
            let crit_stuns = roll.is_critical() && percent_chance(rng, CRIT_STUN_CHANCE);
            let (target_name, applied, downed) = match state.find_actor_mut(target_id) {
                Some(t) => {
                    let mitigated = mitigate(raw, t.armor + effects::armor_modifier(&t.active_effects));
                    let applied = t.take_damage(mitigated);
                    if crit_stuns && t.is_alive() {
                        t.active_effects.push(ActiveEffect::new(Effect::Stun, 1));
                    }
                    (t.name.clone(), applied, !t.is_alive())
                }
                None => (String::new(), 0, false),
            };
            let mut line = format!(
                "{} tears into {target_name} for {applied} damage.",
                actor.name
            );
            if downed {
                line.push_str(&format!(" {target_name} falls!"));
            } else if crit_stuns {
                line.push_str(&format!(" {target_name} reels, stunned by the blow!"));
            }
            line
        };
        state.push_log(LogKind::Attack, actor.name.clone(), Some(roll.value()), line.clone());
        vec![line]
    }

    fn enemy_act<R: Rng>(
        &self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        id: ActorId,
        actor: &Actor,
        rng: &mut R,
    ) -> Vec<String> {
        // A wounded boss calls for help exactly once per combat, in place
        // of its normal action.
        if enemy::boss_should_summon(actor, state) {
            state.boss_summon_used = true;
            let line = enemy::spawn_reinforcement(state, &actor.name, actor.level);
            debug!(boss = %actor.name, "boss reinforcement summon fired");
            state.push_log(LogKind::Summon, actor.name.clone(), None, line.clone());
            return vec![line];
        }

        match enemy::select_action(actor, state, rng) {
            NpcChoice::Attack => vec![self.enemy_attack_player(state, player, actor, rng)],
            NpcChoice::UseAbility(ability) => {
                self.enemy_use_ability(state, player, id, actor, &ability, rng)
            }
        }
    }

    fn enemy_attack_player<R: Rng>(
        &self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        actor: &Actor,
        rng: &mut R,
    ) -> String {
        let roll = OutcomeRoll::roll(rng);
        let line = if roll.is_fumble() {
            format!("{} attacks wildly and misses you.", actor.name)
        } else if percent_chance(rng, player.dodge_chance) {
            format!("{} strikes at you, but you twist aside untouched.", actor.name)
        } else {
            let base = actor.damage + effects::damage_modifier(&actor.active_effects);
            let raw = (base as f64 * roll.tier().scale()).floor().max(0.0) as i32;
            let mut mitigated = mitigate(
                raw,
                player.armor + effects::armor_modifier(&state.player_effects),
            );
            // Guard reduction multiplies after armor, never instead of it.
            if state.player_defending {
                mitigated =
                    (mitigated as f64 * (1.0 - GUARD_DAMAGE_REDUCTION)).floor() as i32;
            }
            let applied = player.take_damage(mitigated);
            // A natural 20 against the player carries the same stun draw as
            // the player's own critical strikes.
            let crit_stuns = roll.is_critical() && percent_chance(rng, CRIT_STUN_CHANCE);
            if crit_stuns {
                state
                    .player_effects
                    .push(ActiveEffect::new(Effect::Stun, 1));
            }
            let mut line = if state.player_defending {
                format!(
                    "{} hits you for {applied} damage; your guard turns aside the worst of it.",
                    actor.name
                )
            } else {
                format!("{} hits you for {applied} damage.", actor.name)
            };
            if crit_stuns {
                line.push_str(" The blow leaves you reeling, stunned!");
            }
            line
        };
        state.push_log(LogKind::Attack, actor.name.clone(), Some(roll.value()), line.clone());
        line
    }

    fn enemy_use_ability<R: Rng>(
        &self,
        state: &mut CombatState,
        player: &mut PlayerStats,
        id: ActorId,
        actor: &Actor,
        ability: &Ability,
        rng: &mut R,
    ) -> Vec<String> {
        // Pay the cost on the live actor.
        if let Some(live) = state.find_actor_mut(id) {
            match ability.cost.resource {
                Resource::Magicka => live.magicka = (live.magicka - ability.cost.amount).max(0),
                Resource::Stamina => live.stamina = (live.stamina - ability.cost.amount).max(0),
                Resource::None => {}
            }
        }

        if ability.is_summon() {
            // Enemy conjurers stop reinforcing once the field is crowded.
            if state.living_enemies().count() >= enemy::MAX_GROUP_SIZE {
                let line = format!("{} gestures, but the rift refuses to open.", actor.name);
                state.push_log(LogKind::Magic, actor.name.clone(), None, line.clone());
                return vec![line];
            }
            let line = enemy::spawn_reinforcement(state, &actor.name, actor.level);
            state.push_log(LogKind::Summon, actor.name.clone(), None, line.clone());
            return vec![line];
        }

        if ability.heal > 0 {
            let patient = state
                .living_enemies()
                .filter(|e| e.id != id)
                .min_by(|a, b| {
                    a.health_ratio()
                        .partial_cmp(&b.health_ratio())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|e| e.id)
                .unwrap_or(id);
            let (name, healed) = match state.find_actor_mut(patient) {
                Some(p) => (p.name.clone(), p.heal(ability.heal)),
                None => (String::new(), 0),
            };
            let line = format!(
                "{} chants, and {name} knits back together for {healed} health.",
                actor.name
            );
            state.push_log(LogKind::Magic, actor.name.clone(), None, line.clone());
            return vec![line];
        }

        // Offensive cast at the player.
        let roll = OutcomeRoll::roll(rng);
        let line = if roll.is_fumble() {
            format!("{}'s {} sputters and dies.", actor.name, ability.name)
        } else {
            let raw = (ability.damage as f64 * roll.tier().scale()).floor() as i32;
            let mut mitigated = mitigate(
                raw,
                player.armor + effects::armor_modifier(&state.player_effects),
            );
            if state.player_defending {
                mitigated = (mitigated as f64 * (1.0 - GUARD_DAMAGE_REDUCTION)).floor() as i32;
            }
            let applied = player.take_damage(mitigated);
            for effect in &ability.effects {
                if let Some(active) = rider_effect(effect) {
                    state.player_effects.push(active);
                }
            }
            format!(
                "{} unleashes {} on you for {applied} damage.",
                actor.name, ability.name
            )
        };
        state.push_log(LogKind::Magic, actor.name.clone(), Some(roll.value()), line.clone());
        vec![line]
    }
}

/// Apply the armor mitigation curve to a raw damage figure.
fn mitigate(raw: i32, armor: i32) -> i32 {
    ((raw as f64) * (1.0 - armor_mitigation(armor))).floor().max(0.0) as i32
}

/// Map an ability's declared rider onto an active status effect.
fn rider_effect(effect: &AbilityEffect) -> Option<ActiveEffect> {
    match effect {
        AbilityEffect::Dot {
            per_turn,
            turns,
            label,
        } => Some(ActiveEffect::new(
            Effect::DamageOverTime {
                per_turn: *per_turn,
                label: label.clone(),
            },
            *turns,
        )),
        AbilityEffect::Slow { magnitude, turns } => Some(ActiveEffect::new(
            Effect::Slow {
                magnitude: *magnitude,
            },
            *turns,
        )),
        AbilityEffect::Stun { turns } => Some(ActiveEffect::new(Effect::Stun, *turns)),
        AbilityEffect::Buff {
            stat,
            amount,
            turns,
        } => Some(ActiveEffect::new(
            Effect::Buff {
                stat: *stat,
                amount: *amount,
            },
            *turns,
        )),
        AbilityEffect::Summon { .. } | AbilityEffect::AoeDamage | AbilityEffect::AoeHeal => None,
    }
}

fn aoe_narrative(ability: &Ability, summary: &AoeSummary, strained: bool) -> String {
    let mut parts = Vec::new();
    if !summary.damaged.is_empty() {
        let hits: Vec<String> = summary
            .damaged
            .iter()
            .map(|e| format!("{} ({})", e.name, e.amount))
            .collect();
        parts.push(format!("scouring {}", hits.join(", ")));
    }
    if !summary.healed.is_empty() {
        let heals: Vec<String> = summary
            .healed
            .iter()
            .map(|e| format!("{} (+{})", e.name, e.amount))
            .collect();
        parts.push(format!("mending {}", heals.join(", ")));
    }
    let body = if parts.is_empty() {
        "touching no one".to_string()
    } else {
        parts.join(" and ")
    };
    let strain = if strained {
        " The casting feels strained and thin."
    } else {
        ""
    };
    format!("{} sweeps the field, {body}.{strain}", ability.name)
}
