use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::ActionSet;
use crate::menu::layout::COLUMNS;

pub const DEFAULT_MATERIAL: &str = "STONE";
pub const DEFAULT_TRIGGER_MATERIAL: &str = "COMPASS";
pub const MAX_ROWS: usize = 6;

//////////////////////////////
/// MENU STRUCTS AND ENUMS ///
//////////////////////////////

/// Inventory shape. Chests are sized by rows; everything else is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuType {
    Chest,
    Dispenser,
    Dropper,
    Furnace,
    Workbench,
    Crafting,
    Enchanting,
    Brewing,
    Player,
    Creative,
    Merchant,
    EnderChest,
    Anvil,
    Smithing,
    Beacon,
    Hopper,
    ShulkerBox,
    Barrel,
    BlastFurnace,
    Lectern,
    Smoker,
    Loom,
    Cartography,
    Grindstone,
    Stonecutter,
    Composter,
    ChiseledBookshelf,
}

impl MenuType {
    const ALL: [MenuType; 27] = [
        MenuType::Chest,
        MenuType::Dispenser,
        MenuType::Dropper,
        MenuType::Furnace,
        MenuType::Workbench,
        MenuType::Crafting,
        MenuType::Enchanting,
        MenuType::Brewing,
        MenuType::Player,
        MenuType::Creative,
        MenuType::Merchant,
        MenuType::EnderChest,
        MenuType::Anvil,
        MenuType::Smithing,
        MenuType::Beacon,
        MenuType::Hopper,
        MenuType::ShulkerBox,
        MenuType::Barrel,
        MenuType::BlastFurnace,
        MenuType::Lectern,
        MenuType::Smoker,
        MenuType::Loom,
        MenuType::Cartography,
        MenuType::Grindstone,
        MenuType::Stonecutter,
        MenuType::Composter,
        MenuType::ChiseledBookshelf,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MenuType::Chest => "CHEST",
            MenuType::Dispenser => "DISPENSER",
            MenuType::Dropper => "DROPPER",
            MenuType::Furnace => "FURNACE",
            MenuType::Workbench => "WORKBENCH",
            MenuType::Crafting => "CRAFTING",
            MenuType::Enchanting => "ENCHANTING",
            MenuType::Brewing => "BREWING",
            MenuType::Player => "PLAYER",
            MenuType::Creative => "CREATIVE",
            MenuType::Merchant => "MERCHANT",
            MenuType::EnderChest => "ENDER_CHEST",
            MenuType::Anvil => "ANVIL",
            MenuType::Smithing => "SMITHING",
            MenuType::Beacon => "BEACON",
            MenuType::Hopper => "HOPPER",
            MenuType::ShulkerBox => "SHULKER_BOX",
            MenuType::Barrel => "BARREL",
            MenuType::BlastFurnace => "BLAST_FURNACE",
            MenuType::Lectern => "LECTERN",
            MenuType::Smoker => "SMOKER",
            MenuType::Loom => "LOOM",
            MenuType::Cartography => "CARTOGRAPHY",
            MenuType::Grindstone => "GRINDSTONE",
            MenuType::Stonecutter => "STONECUTTER",
            MenuType::Composter => "COMPOSTER",
            MenuType::ChiseledBookshelf => "CHISELED_BOOKSHELF",
        }
    }

    /// Exact name first, then a loose match ignoring `_`, spaces and case.
    /// Anything unrecognised is a chest.
    pub fn from_name(raw: &str) -> MenuType {
        let upper = raw.trim().to_uppercase();
        if let Some(t) = Self::ALL.iter().find(|t| t.name() == upper) {
            return *t;
        }

        let loose: String = upper.chars().filter(|c| *c != '_' && *c != ' ').collect();
        Self::ALL
            .iter()
            .find(|t| t.name().replace('_', "") == loose)
            .copied()
            .unwrap_or_else(|| {
                log::warn!("Unknown menu type '{}', defaulting to CHEST", raw);
                MenuType::Chest
            })
    }

    /// Slot count for non-chest shapes.
    pub fn fixed_size(self) -> Option<usize> {
        let size = match self {
            MenuType::Chest => return None,
            MenuType::Dispenser | MenuType::Dropper | MenuType::Creative => 9,
            MenuType::Furnace
            | MenuType::BlastFurnace
            | MenuType::Smoker
            | MenuType::Anvil
            | MenuType::Merchant
            | MenuType::Cartography
            | MenuType::Grindstone => 3,
            MenuType::Workbench => 10,
            MenuType::Crafting | MenuType::Brewing | MenuType::Hopper => 5,
            MenuType::Enchanting | MenuType::Stonecutter => 2,
            MenuType::Player => 41,
            MenuType::EnderChest | MenuType::ShulkerBox | MenuType::Barrel => 27,
            MenuType::Smithing | MenuType::Loom => 4,
            MenuType::Beacon | MenuType::Lectern | MenuType::Composter => 1,
            MenuType::ChiseledBookshelf => 6,
        };
        Some(size)
    }
}

/// What the player sees in a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemVisual {
    pub material: String,
    pub amount: u32,
    pub name: Option<String>,
    pub lore: Vec<String>,
}

impl ItemVisual {
    pub fn of(material: impl Into<String>) -> Self {
        ItemVisual {
            material: material.into(),
            amount: 1,
            name: None,
            lore: Vec::new(),
        }
    }
}

/// Normalise a material identifier: strips quotes and a `minecraft:`
/// namespace, upper-cases, maps spaces/dashes to `_`.
/// Returns `None` unless the result is a well-formed identifier.
pub fn normalize_material(raw: &str) -> Option<String> {
    let trimmed = raw.replace('"', "");
    let trimmed = trimmed.trim();
    let trimmed = trimmed
        .strip_prefix("minecraft:")
        .or_else(|| trimmed.strip_prefix("MINECRAFT:"))
        .unwrap_or(trimmed);

    let id: String = trimmed
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    let well_formed = id.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    well_formed.then_some(id)
}

pub struct MenuItem {
    pub key: String,
    pub visual: ItemVisual,
    pub action_sets: Vec<ActionSet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTrigger {
    pub material: String,
    pub name: Option<String>,
    pub lore: Vec<String>,
}

/// Ways a menu can be opened besides the admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activator {
    Command(Vec<String>),
    /// Matched case-insensitively against the whole chat line.
    Chat(Vec<String>),
    Item(ItemTrigger),
}

pub struct Menu {
    pub name: String,
    pub title: String,
    pub kind: MenuType,
    pub rows: usize,
    /// Layout rows as parsed (quoted keys kept with their delimiters).
    pub layout: Vec<String>,
    pub(crate) items: BTreeMap<usize, Arc<MenuItem>>,
    /// Item keys that were declared but never placed.
    pub(crate) unplaced: Vec<String>,
    pub activators: Vec<Activator>,
    pub(crate) events: HashMap<String, Vec<ActionSet>>,
    pub(crate) expired: AtomicBool,
    pub(crate) last_access: AtomicU64,
}

impl Menu {
    pub fn size(&self) -> usize {
        self.kind.fixed_size().unwrap_or(self.rows * COLUMNS)
    }

    pub fn item_at(&self, slot: usize) -> Option<&Arc<MenuItem>> {
        self.items.get(&slot)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Occupied slots in ascending order.
    pub fn slots(&self) -> impl Iterator<Item = (usize, &Arc<MenuItem>)> {
        self.items.iter().map(|(slot, item)| (*slot, item))
    }

    pub fn unplaced_items(&self) -> &[String] {
        &self.unplaced
    }

    pub fn event_handlers(&self, event: &str) -> &[ActionSet] {
        self.events
            .get(event)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(|k| k.as_str())
    }

    pub fn mark_expired(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn touch(&self) {
        self.last_access.store(now_millis(), Ordering::Relaxed);
    }

    /// Milliseconds since the Unix epoch of the last open.
    pub fn last_access_millis(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Menu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Menu")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("kind", &self.kind)
            .field("rows", &self.rows)
            .field("items", &self.items.len())
            .field("expired", &self.is_expired())
            .finish()
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_type_falls_back_to_chest() {
        assert_eq!(MenuType::from_name("hopper"), MenuType::Hopper);
        assert_eq!(MenuType::from_name("Ender Chest"), MenuType::EnderChest);
        assert_eq!(MenuType::from_name("blastfurnace"), MenuType::BlastFurnace);
        assert_eq!(MenuType::from_name("spaceship"), MenuType::Chest);
    }

    #[test]
    fn material_normalisation() {
        assert_eq!(normalize_material("diamond_sword").as_deref(), Some("DIAMOND_SWORD"));
        assert_eq!(normalize_material("minecraft:oak-log").as_deref(), Some("OAK_LOG"));
        assert_eq!(normalize_material("\"Gold Ingot\"").as_deref(), Some("GOLD_INGOT"));
        assert_eq!(normalize_material("???"), None);
        assert_eq!(normalize_material(""), None);
        assert_eq!(normalize_material("9lives"), None);
    }
}
