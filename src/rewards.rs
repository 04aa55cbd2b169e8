//! Victory rewards and the idempotent transaction ledger.
//!
//! Reward generation is separated from reward application: a bundle is
//! computed (possibly as a preview), stamped with a fresh transaction id,
//! and only applied through the ledger, which refuses duplicates so a
//! retried save layer can never double-grant.

use crate::actor::{Actor, ActorType};
use crate::items::ItemKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

/// Applied transactions older than this are evicted from the ledger.
pub const LEDGER_RETENTION_MS: u64 = 10 * 60 * 1000;

/// Wall-clock milliseconds since the Unix epoch.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Experience for one defeated actor.
pub fn xp_for_kill(level: u32, is_boss: bool) -> u32 {
    let base = (level * 3).max(1);
    if is_boss {
        base * 2
    } else {
        base
    }
}

// ============================================================================
// Loot tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
}

impl Rarity {
    /// Multiplier applied to a loot entry's base weight; rarer drops less.
    pub fn weight_multiplier(&self) -> f64 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Uncommon => 0.45,
            Rarity::Rare => 0.15,
            Rarity::Epic => 0.04,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
        }
    }
}

/// One candidate drop in a creature-type loot table.
#[derive(Debug, Clone)]
pub struct LootEntry {
    pub name: &'static str,
    pub kind: ItemKind,
    pub rarity: Rarity,
    pub weight: u32,
    pub min_qty: u32,
    pub max_qty: u32,
    pub gold_value: i32,
}

const fn entry(
    name: &'static str,
    kind: ItemKind,
    rarity: Rarity,
    weight: u32,
    min_qty: u32,
    max_qty: u32,
    gold_value: i32,
) -> LootEntry {
    LootEntry {
        name,
        kind,
        rarity,
        weight,
        min_qty,
        max_qty,
        gold_value,
    }
}

/// Drop pools keyed by creature type.
pub static LOOT_TABLES: LazyLock<HashMap<ActorType, Vec<LootEntry>>> = LazyLock::new(|| {
    let mut tables = HashMap::new();
    tables.insert(
        ActorType::Beast,
        vec![
            entry("Animal Pelt", ItemKind::Misc, Rarity::Common, 10, 1, 2, 5),
            entry("Raw Meat", ItemKind::Misc, Rarity::Common, 8, 1, 3, 3),
            entry("Pristine Hide", ItemKind::Misc, Rarity::Rare, 6, 1, 1, 40),
        ],
    );
    tables.insert(
        ActorType::Humanoid,
        vec![
            entry("Gold Coins", ItemKind::Misc, Rarity::Common, 10, 8, 25, 1),
            entry("Iron Dagger", ItemKind::Weapon, Rarity::Common, 6, 1, 1, 10),
            entry("Minor Healing Potion", ItemKind::Potion, Rarity::Uncommon, 6, 1, 2, 25),
            entry("Steel Sword", ItemKind::Weapon, Rarity::Uncommon, 5, 1, 1, 45),
            entry("Elven Bow", ItemKind::Weapon, Rarity::Rare, 4, 1, 1, 120),
        ],
    );
    tables.insert(
        ActorType::Undead,
        vec![
            entry("Bone Meal", ItemKind::Misc, Rarity::Common, 10, 1, 2, 5),
            entry("Ancient Relic", ItemKind::Misc, Rarity::Rare, 5, 1, 1, 60),
            entry("Ebony Sword", ItemKind::Weapon, Rarity::Epic, 4, 1, 1, 250),
        ],
    );
    tables.insert(
        ActorType::Daedra,
        vec![
            entry("Fire Salts", ItemKind::Misc, Rarity::Uncommon, 10, 1, 2, 30),
            entry("Daedra Heart", ItemKind::Misc, Rarity::Rare, 6, 1, 1, 150),
        ],
    );
    tables.insert(
        ActorType::Dragon,
        vec![
            entry("Dragon Scales", ItemKind::Misc, Rarity::Rare, 10, 1, 3, 100),
            entry("Dragon Bone", ItemKind::Misc, Rarity::Rare, 8, 1, 2, 120),
        ],
    );
    tables.insert(
        ActorType::Automaton,
        vec![
            entry("Dwemer Scrap", ItemKind::Misc, Rarity::Common, 10, 1, 3, 15),
            entry("Dynamo Core", ItemKind::Misc, Rarity::Rare, 5, 1, 1, 80),
        ],
    );
    tables
});

/// Extra pool merged in when the kill was a boss.
static BOSS_BONUS_TABLE: LazyLock<Vec<LootEntry>> = LazyLock::new(|| {
    vec![
        entry("Grand Healing Potion", ItemKind::Potion, Rarity::Uncommon, 8, 1, 2, 100),
        entry("Daedric Sword", ItemKind::Weapon, Rarity::Epic, 5, 1, 1, 400),
        entry("Ebony Armor", ItemKind::Armor, Rarity::Epic, 4, 1, 1, 350),
    ]
});

/// Combat-relevant numbers attached to a dropped item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub damage: Option<i32>,
    pub armor: Option<i32>,
    pub value: i32,
}

/// A dropped item as surfaced to the save layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootItem {
    pub name: String,
    pub kind: ItemKind,
    pub rarity: Rarity,
    pub quantity: u32,
    #[serde(default)]
    pub stats: Option<ItemStats>,
}

/// Fill in missing weapon/armor numbers using the same name-tier inference
/// the item model uses, so dropped gear arrives playable.
pub fn enrich_loot(item: &mut LootItem, gold_value: i32) {
    let probe = crate::items::ItemRecord::new(item.name.clone(), item.kind);
    let stats = ItemStats {
        damage: (item.kind == ItemKind::Weapon).then(|| probe.weapon_damage()),
        armor: matches!(item.kind, ItemKind::Armor | ItemKind::Shield)
            .then(|| probe.armor_rating()),
        value: gold_value,
    };
    item.stats = Some(stats);
}

fn pick_entry<'a, R: Rng>(pool: &'a [LootEntry], rng: &mut R) -> Option<&'a LootEntry> {
    let total: f64 = pool
        .iter()
        .map(|e| e.weight as f64 * e.rarity.weight_multiplier())
        .sum();
    if total <= 0.0 {
        return None;
    }
    let mut draw = rng.gen_range(0.0..total);
    for e in pool {
        let w = e.weight as f64 * e.rarity.weight_multiplier();
        if draw < w {
            return Some(e);
        }
        draw -= w;
    }
    pool.last()
}

/// Roll drops for one defeated actor. Bosses draw from their type table
/// merged with the boss bonus pool and roll an extra time.
pub fn roll_loot<R: Rng>(actor: &Actor, rng: &mut R) -> (Vec<LootItem>, i32) {
    let mut pool: Vec<LootEntry> = LOOT_TABLES
        .get(&actor.actor_type)
        .cloned()
        .unwrap_or_default();
    if actor.is_boss {
        pool.extend(BOSS_BONUS_TABLE.iter().cloned());
    }

    let draws = if actor.is_boss { 3 } else { 2 };
    let mut items = Vec::new();
    let mut gold = 0;
    for _ in 0..draws {
        let Some(e) = pick_entry(&pool, rng) else {
            continue;
        };
        let quantity = rng.gen_range(e.min_qty..=e.max_qty);
        if e.name == "Gold Coins" {
            gold += quantity as i32 * e.gold_value;
            continue;
        }
        let mut item = LootItem {
            name: e.name.to_string(),
            kind: e.kind,
            rarity: e.rarity,
            quantity,
            stats: None,
        };
        enrich_loot(&mut item, e.gold_value);
        items.push(item);
    }

    // Nobody drops nothing: an empty roll falls back to pocket change.
    if items.is_empty() && gold == 0 {
        gold = (actor.level as i32 * 2).max(5);
    }
    (items, gold)
}

/// Merge duplicate item names into single stacks.
pub fn consolidate(items: Vec<LootItem>) -> Vec<LootItem> {
    let mut out: Vec<LootItem> = Vec::new();
    for item in items {
        match out.iter_mut().find(|o| o.name == item.name) {
            Some(existing) => existing.quantity += item.quantity,
            None => out.push(item),
        }
    }
    out
}

// ============================================================================
// Reward bundles
// ============================================================================

/// Everything a victory grants, stamped for idempotent application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardBundle {
    pub transaction_id: Uuid,
    pub character_id: String,
    pub xp: u32,
    pub gold: i32,
    pub items: Vec<LootItem>,
    pub timestamp_ms: u64,
    /// Previews are for display only and are never applied.
    #[serde(default)]
    pub preview: bool,
}

/// Score a victory over the given defeated actors into a reward bundle
/// with a fresh transaction id.
pub fn generate_rewards<R: Rng>(
    character_id: impl Into<String>,
    defeated: &[Actor],
    preview: bool,
    rng: &mut R,
) -> RewardBundle {
    let mut xp = 0;
    let mut gold = 0;
    let mut items = Vec::new();
    for actor in defeated {
        xp += xp_for_kill(actor.level, actor.is_boss);
        let (dropped, coin) = roll_loot(actor, rng);
        items.extend(dropped);
        gold += coin;
    }
    let bundle = RewardBundle {
        transaction_id: Uuid::new_v4(),
        character_id: character_id.into(),
        xp,
        gold,
        items: consolidate(items),
        timestamp_ms: epoch_ms(),
        preview,
    };
    debug!(
        tx = %bundle.transaction_id,
        xp = bundle.xp,
        gold = bundle.gold,
        items = bundle.items.len(),
        preview = bundle.preview,
        "reward bundle generated"
    );
    bundle
}

// ============================================================================
// Transaction ledger
// ============================================================================

/// Per-character record of applied reward transactions.
///
/// Application is idempotent: a transaction id is granted at most once, so
/// a retried or replayed apply is a silent no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLedger {
    pub character_id: String,
    /// Transaction id → apply timestamp (epoch ms).
    applied: HashMap<Uuid, u64>,
}

impl TransactionLedger {
    pub fn new(character_id: impl Into<String>) -> Self {
        Self {
            character_id: character_id.into(),
            applied: HashMap::new(),
        }
    }

    pub fn is_applied(&self, transaction_id: Uuid) -> bool {
        self.applied.contains_key(&transaction_id)
    }

    /// Record a bundle as applied. Returns true only when the caller
    /// should actually grant it: previews, bundles for another character,
    /// and already-applied transactions are refused.
    pub fn apply(&mut self, bundle: &RewardBundle, now_ms: u64) -> bool {
        if bundle.preview {
            debug!(tx = %bundle.transaction_id, "refusing to apply preview bundle");
            return false;
        }
        if bundle.character_id != self.character_id {
            debug!(
                tx = %bundle.transaction_id,
                theirs = %bundle.character_id,
                ours = %self.character_id,
                "refusing bundle for another character"
            );
            return false;
        }
        if self.is_applied(bundle.transaction_id) {
            debug!(tx = %bundle.transaction_id, "duplicate apply ignored");
            return false;
        }
        self.applied.insert(bundle.transaction_id, now_ms);
        true
    }

    /// Drop applied records older than the retention window.
    pub fn evict_expired(&mut self, now_ms: u64) -> usize {
        let before = self.applied.len();
        self.applied
            .retain(|_, at| now_ms.saturating_sub(*at) < LEDGER_RETENTION_MS);
        let evicted = before - self.applied.len();
        if evicted > 0 {
            debug!(evicted, "ledger eviction pass");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
