//! Inbound inventory item records.
//!
//! Items arrive from the save layer with optional explicit overrides
//! (`damage`, `armor`, `subtype`); anything missing falls back to
//! name-based inference. Missing numeric fields default to zero, never to
//! an invalid value.

use serde::{Deserialize, Serialize};

/// Broad item classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Weapon,
    Shield,
    Armor,
    Potion,
    Ammo,
    Misc,
}

/// Who has the item equipped. Companion-held gear must never leak into
/// the player's derived stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ItemOwner {
    #[default]
    Player,
    Companion(String),
}

/// A single inventory record as handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub damage: Option<i32>,
    #[serde(default)]
    pub armor: Option<i32>,
    #[serde(default)]
    pub value: Option<i32>,
    #[serde(default)]
    pub weight: Option<f32>,
    pub quantity: u32,
    #[serde(default)]
    pub equipped: bool,
    #[serde(default)]
    pub owner: ItemOwner,
    #[serde(default)]
    pub description: Option<String>,
}

impl ItemRecord {
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            name: name.into(),
            kind,
            subtype: None,
            damage: None,
            armor: None,
            value: None,
            weight: None,
            quantity: 1,
            equipped: false,
            owner: ItemOwner::Player,
            description: None,
        }
    }

    pub fn with_damage(mut self, damage: i32) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_armor(mut self, armor: i32) -> Self {
        self.armor = Some(armor);
        self
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn equipped(mut self) -> Self {
        self.equipped = true;
        self
    }

    pub fn owned_by(mut self, owner: ItemOwner) -> Self {
        self.owner = owner;
        self
    }

    /// Searchable text: subtype override first, then name.
    fn classification_text(&self) -> String {
        match &self.subtype {
            Some(s) => format!("{} {}", s.to_lowercase(), self.name.to_lowercase()),
            None => self.name.to_lowercase(),
        }
    }

    /// Whether this weapon fires at range (bow/crossbow class).
    pub fn is_ranged_weapon(&self) -> bool {
        self.kind == ItemKind::Weapon && {
            let text = self.classification_text();
            text.contains("bow") || text.contains("crossbow")
        }
    }

    /// Effective weapon damage: explicit override, else inferred from name
    /// tier, else a bare minimum.
    pub fn weapon_damage(&self) -> i32 {
        if let Some(d) = self.damage {
            return d.max(0);
        }
        let text = self.classification_text();
        if text.contains("daedric") || text.contains("dragonbone") {
            14
        } else if text.contains("ebony") || text.contains("glass") {
            12
        } else if text.contains("dwarven") || text.contains("orcish") {
            10
        } else if text.contains("steel") {
            8
        } else if text.contains("iron") {
            7
        } else {
            5
        }
    }

    /// Effective armor rating: explicit override, else inferred.
    pub fn armor_rating(&self) -> i32 {
        if let Some(a) = self.armor {
            return a.max(0);
        }
        let text = self.classification_text();
        if text.contains("daedric") || text.contains("dragonplate") {
            40
        } else if text.contains("ebony") {
            32
        } else if text.contains("steel plate") {
            28
        } else if text.contains("steel") || text.contains("dwarven") {
            22
        } else if text.contains("iron") || text.contains("hide") {
            15
        } else {
            10
        }
    }
}

/// Which vital a potion restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PotionVital {
    Health,
    Magicka,
    Stamina,
}

impl PotionVital {
    pub fn name(&self) -> &'static str {
        match self {
            PotionVital::Health => "health",
            PotionVital::Magicka => "magicka",
            PotionVital::Stamina => "stamina",
        }
    }
}

/// Map a potion to the vital it restores, from subtype, name, or
/// description.
pub fn potion_vital(item: &ItemRecord) -> Option<PotionVital> {
    if item.kind != ItemKind::Potion {
        return None;
    }
    let mut text = item.classification_text();
    if let Some(desc) = &item.description {
        text.push(' ');
        text.push_str(&desc.to_lowercase());
    }
    if text.contains("health") || text.contains("healing") {
        Some(PotionVital::Health)
    } else if text.contains("magicka") {
        Some(PotionVital::Magicka)
    } else if text.contains("stamina") {
        Some(PotionVital::Stamina)
    } else {
        // A potion with no recognizable vital defaults to health.
        Some(PotionVital::Health)
    }
}

/// Restore amount for a potion: explicit value, else name-tier inference.
pub fn potion_restore_amount(item: &ItemRecord) -> i32 {
    if let Some(v) = item.value {
        return v.max(0);
    }
    let text = item.classification_text();
    if text.contains("ultimate") {
        150
    } else if text.contains("extreme") || text.contains("grand") {
        100
    } else if text.contains("plentiful") || text.contains("greater") {
        75
    } else if text.contains("minor") || text.contains("weak") {
        25
    } else {
        50
    }
}

/// Special ammunition classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrowKind {
    Fire,
    Shock,
    Ice,
    Paralyze,
    Command,
}

impl ArrowKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArrowKind::Fire => "fire",
            ArrowKind::Shock => "shock",
            ArrowKind::Ice => "ice",
            ArrowKind::Paralyze => "paralyze",
            ArrowKind::Command => "command",
        }
    }
}

/// Classify an ammo stack by subtype or name.
pub fn arrow_kind(item: &ItemRecord) -> Option<ArrowKind> {
    if item.kind != ItemKind::Ammo {
        return None;
    }
    let text = item.classification_text();
    if text.contains("fire") || text.contains("flame") {
        Some(ArrowKind::Fire)
    } else if text.contains("shock") || text.contains("lightning") {
        Some(ArrowKind::Shock)
    } else if text.contains("ice") || text.contains("frost") {
        Some(ArrowKind::Ice)
    } else if text.contains("paralyz") {
        Some(ArrowKind::Paralyze)
    } else if text.contains("command") {
        Some(ArrowKind::Command)
    } else {
        None
    }
}

/// The player's inventory as passed into action resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<ItemRecord>,
}

impl Inventory {
    pub fn new(items: Vec<ItemRecord>) -> Self {
        Self { items }
    }

    pub fn find(&self, name: &str) -> Option<&ItemRecord> {
        let lower = name.to_lowercase();
        self.items.iter().find(|i| i.name.to_lowercase() == lower)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut ItemRecord> {
        let lower = name.to_lowercase();
        self.items
            .iter_mut()
            .find(|i| i.name.to_lowercase() == lower)
    }

    /// Decrement exactly one unit from the named stack. Returns a snapshot
    /// of the record after consumption (quantity possibly zero).
    pub fn consume_one(&mut self, name: &str) -> Option<ItemRecord> {
        let item = self.find_mut(name)?;
        if item.quantity == 0 {
            return None;
        }
        item.quantity -= 1;
        Some(item.clone())
    }
}
