use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

use super::layout::{Layout, RowCache};
use super::model::{
    Activator, DEFAULT_MATERIAL, DEFAULT_TRIGGER_MATERIAL, ItemTrigger, ItemVisual, MAX_ROWS,
    Menu, MenuItem, MenuType, normalize_material,
};
use crate::engine::{ActionSet, colorize, parse_actions, parse_condition};
use crate::error::MenuLoadError;

/// Item key whose `slot` is honoured instead of its layout position.
const CLOSE_KEY: &str = "close";

////////////////////
/// TOML STRUCTS ///
////////////////////

#[derive(Deserialize)]
struct MenuFile {
    title: Option<String>,
    rows: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    layout: Option<LayoutConfig>,
    items: Option<toml::Table>, // [items.<key>] tables, parsed one by one
    #[serde(default)]
    activators: Option<ActivatorsConfig>,
    #[serde(default)]
    events: toml::Table,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LayoutConfig {
    Rows(Vec<String>),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Deserialize)]
struct ItemConfig {
    #[serde(default)]
    material: Option<String>,
    #[serde(default = "default_amount")]
    amount: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    lore: Vec<String>,
    #[serde(default)]
    actions: Vec<ActionEntry>,
    #[serde(default)]
    slot: Option<usize>,
}

/// One entry of an `actions` list: a bare action string or a conditional set.
#[derive(Deserialize)]
#[serde(untagged)]
enum ActionEntry {
    Bare(String),
    Set(ActionSetConfig),
}

#[derive(Deserialize)]
struct ActionSetConfig {
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    actions: Option<OneOrMany>,
    #[serde(default)]
    deny: Option<OneOrMany>,
}

/// Event handlers: a list of entries or a single one. The list is tried
/// first so an array of strings never reads as a positional table.
#[derive(Deserialize)]
#[serde(untagged)]
enum Entries {
    Many(Vec<ActionEntry>),
    One(ActionEntry),
}

#[derive(Deserialize)]
struct ActivatorsConfig {
    #[serde(default)]
    command: Option<OneOrMany>,
    #[serde(default)]
    chat: Option<OneOrMany>,
    #[serde(default)]
    item: Option<ItemTriggerConfig>,

    // `material`/`name`/`lore` directly under [activators]
    #[serde(default)]
    material: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    lore: Vec<String>,
}

#[derive(Deserialize)]
struct ItemTriggerConfig {
    #[serde(default)]
    material: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    lore: Vec<String>,
}

fn default_amount() -> u32 {
    1
}

////////////////////
/// LOADER       ///
////////////////////

/// Load one menu document. The menu is named after the file stem.
pub fn load_menu_from_file(path: &Path, row_cache: &RowCache) -> Result<Menu, MenuLoadError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let text = fs::read_to_string(path).map_err(|source| MenuLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    load_menu_from_str(&name, &text, row_cache)
}

pub fn load_menu_from_str(
    name: &str,
    text: &str,
    row_cache: &RowCache,
) -> Result<Menu, MenuLoadError> {
    let file: MenuFile = toml::from_str(text).map_err(|e| MenuLoadError::Parse {
        menu: name.to_string(),
        message: e.to_string(),
    })?;

    let title = file.title.ok_or_else(|| MenuLoadError::MissingField {
        menu: name.to_string(),
        field: "title",
    })?;
    let layout_config = file.layout.ok_or_else(|| MenuLoadError::MissingField {
        menu: name.to_string(),
        field: "layout",
    })?;
    let items_table = file.items.ok_or_else(|| MenuLoadError::MissingField {
        menu: name.to_string(),
        field: "items",
    })?;

    let mut layout_rows: Vec<String> = match layout_config {
        LayoutConfig::Rows(rows) => rows,
        LayoutConfig::Text(text) => text.lines().map(str::to_string).collect(),
    };
    while layout_rows.last().is_some_and(|r| r.trim().is_empty()) {
        layout_rows.pop();
    }
    if layout_rows.is_empty() {
        return Err(MenuLoadError::InvalidLayout(name.to_string()));
    }

    let row_count = match file.rows {
        Some(r) if (1..=MAX_ROWS as i64).contains(&r) => r as usize,
        Some(r) => {
            return Err(MenuLoadError::InvalidRows {
                menu: name.to_string(),
                rows: r,
            });
        }
        None => layout_rows.len().min(MAX_ROWS),
    };
    layout_rows.truncate(row_count);

    let layout = Layout::parse(&layout_rows, row_cache);
    let kind = file
        .kind
        .as_deref()
        .map(MenuType::from_name)
        .unwrap_or(MenuType::Chest);

    let (items, unplaced) = load_items(name, items_table, &layout);
    let activators = file
        .activators
        .map(|a| load_activators(name, a))
        .unwrap_or_default();
    let events = load_events(name, file.events);

    log::debug!(
        "Menu '{}' loaded with {} rows, {} slots filled, {} activators",
        name,
        row_count,
        items.len(),
        activators.len()
    );

    Ok(Menu {
        name: name.to_string(),
        title,
        kind,
        rows: row_count,
        layout: layout.processed_rows(),
        items,
        unplaced,
        activators,
        events,
        expired: AtomicBool::new(false),
        last_access: AtomicU64::new(0),
    })
}

/// Items are isolated: a malformed one is logged and skipped.
fn load_items(
    menu: &str,
    table: toml::Table,
    layout: &Layout,
) -> (BTreeMap<usize, Arc<MenuItem>>, Vec<String>) {
    let mut placed: BTreeMap<usize, Arc<MenuItem>> = BTreeMap::new();
    let mut unplaced = Vec::new();

    for (key, value) in table {
        let config: ItemConfig = match value.try_into() {
            Ok(c) => c,
            Err(e) => {
                log::error!("Error loading item '{}' for menu '{}': {}", key, menu, e);
                continue;
            }
        };

        let slot_override = config.slot.filter(|_| key == CLOSE_KEY);
        let item = Arc::new(build_item(&key, config));

        let slots = match slot_override {
            Some(slot) => vec![slot],
            None => layout.slots_for(&key),
        };
        if slots.is_empty() {
            log::debug!("Item '{}' in menu '{}' is not placed in the layout", key, menu);
            unplaced.push(key);
            continue;
        }
        for slot in slots {
            placed.insert(slot, item.clone());
        }
    }

    (placed, unplaced)
}

fn build_item(key: &str, config: ItemConfig) -> MenuItem {
    let material = match config.material.as_deref() {
        None => DEFAULT_MATERIAL.to_string(),
        Some(raw) => normalize_material(raw).unwrap_or_else(|| {
            log::warn!("Invalid material: {}. Using {} instead.", raw, DEFAULT_MATERIAL);
            DEFAULT_MATERIAL.to_string()
        }),
    };

    let visual = ItemVisual {
        material,
        amount: config.amount.max(1),
        name: config.name.as_deref().map(colorize),
        lore: config.lore.iter().map(|l| colorize(l)).collect(),
    };

    let action_sets: Vec<ActionSet> = config.actions.into_iter().filter_map(build_set).collect();
    log::debug!("Loaded item '{}' with {} action sets", key, action_sets.len());

    MenuItem {
        key: key.to_string(),
        visual,
        action_sets,
    }
}

/// A bare string becomes a conditionless set; one that fails to parse
/// produces no set at all.
fn build_set(entry: ActionEntry) -> Option<ActionSet> {
    match entry {
        ActionEntry::Bare(raw) => {
            let actions = parse_actions(&[raw]);
            (!actions.is_empty()).then(|| ActionSet {
                actions,
                ..ActionSet::default()
            })
        }
        ActionEntry::Set(set) => {
            let condition = set.condition.as_deref().and_then(|raw| {
                let parsed = parse_condition(raw);
                if parsed.is_none() {
                    log::warn!("Condition '{}' ignored; actions run unconditionally", raw);
                }
                parsed
            });
            let actions = set.actions.map(OneOrMany::into_vec).unwrap_or_default();
            let deny = set.deny.map(OneOrMany::into_vec).unwrap_or_default();

            Some(ActionSet {
                condition,
                actions: parse_actions(&actions),
                deny_actions: parse_actions(&deny),
            })
        }
    }
}

fn load_activators(menu: &str, config: ActivatorsConfig) -> Vec<Activator> {
    let mut activators = Vec::new();

    if let Some(commands) = config.command {
        activators.push(Activator::Command(commands.into_vec()));
    }
    if let Some(chat) = config.chat {
        activators.push(Activator::Chat(chat.into_vec()));
    }

    let trigger = match config.item {
        Some(item) => Some(item),
        None if config.material.is_some() => Some(ItemTriggerConfig {
            material: config.material,
            name: config.name,
            lore: config.lore,
        }),
        None => None,
    };
    if let Some(item) = trigger {
        activators.push(Activator::Item(build_trigger(menu, item)));
    }

    log::debug!("Menu '{}' loaded {} activators", menu, activators.len());
    activators
}

fn build_trigger(menu: &str, config: ItemTriggerConfig) -> ItemTrigger {
    let raw = config.material.unwrap_or_default();
    let material = normalize_material(&raw).unwrap_or_else(|| {
        log::warn!(
            "Invalid activator material '{}' in menu '{}'. Using {} instead.",
            raw,
            menu,
            DEFAULT_TRIGGER_MATERIAL
        );
        DEFAULT_TRIGGER_MATERIAL.to_string()
    });

    ItemTrigger {
        material,
        name: config.name.as_deref().map(colorize),
        lore: config.lore.iter().map(|l| colorize(l)).collect(),
    }
}

/// Event names are matched lower-case (`open`, `close`, ...).
fn load_events(menu: &str, table: toml::Table) -> HashMap<String, Vec<ActionSet>> {
    let mut events = HashMap::new();

    for (event, value) in table {
        let entries: Entries = match value.try_into() {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Unsupported handler for event '{}' in menu '{}': {}", event, menu, e);
                continue;
            }
        };
        let entries = match entries {
            Entries::One(entry) => vec![entry],
            Entries::Many(list) => list,
        };
        let handlers: Vec<ActionSet> = entries.into_iter().filter_map(build_set).collect();
        events.insert(event.to_lowercase(), handlers);
    }

    log::debug!("Menu '{}' loaded events for {} event types", menu, events.len());
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Action, Condition};

    fn load(text: &str) -> Result<Menu, MenuLoadError> {
        load_menu_from_str("test", text, &RowCache::new())
    }

    #[test]
    fn minimal_menu_places_items_by_layout() {
        let menu = load(
            r#"
title = "&6Main"
layout = ["A B"]

[items.A]
material = "diamond"
actions = ["tell:hi"]
"#,
        )
        .unwrap();

        assert_eq!(menu.rows, 1);
        assert_eq!(menu.size(), 9);
        assert_eq!(menu.kind, MenuType::Chest);
        let item = menu.item_at(0).unwrap();
        assert_eq!(item.visual.material, "DIAMOND");
        assert_eq!(item.action_sets.len(), 1);
        assert_eq!(item.action_sets[0].actions, vec![Action::Tell("hi".into())]);
        assert!(menu.item_at(1).is_none());
        assert!(menu.item_at(2).is_none());
    }

    #[test]
    fn missing_required_fields_are_load_errors() {
        let no_title = load("layout = [\"A\"]\n[items]\n");
        assert!(matches!(
            no_title,
            Err(MenuLoadError::MissingField { field: "title", .. })
        ));

        let no_items = load("title = \"x\"\nlayout = [\"A\"]\n");
        assert!(matches!(
            no_items,
            Err(MenuLoadError::MissingField { field: "items", .. })
        ));

        let bad_toml = load("title = ");
        assert!(matches!(bad_toml, Err(MenuLoadError::Parse { .. })));
    }

    #[test]
    fn rows_out_of_range_rejected() {
        let err = load("title = \"x\"\nrows = 7\nlayout = [\"A\"]\n[items]\n");
        assert!(matches!(err, Err(MenuLoadError::InvalidRows { rows: 7, .. })));
    }

    #[test]
    fn rows_truncate_layout_and_absent_rows_cap_at_six() {
        let menu = load("title = \"x\"\nrows = 1\nlayout = [\"AAA\", \"BBB\"]\n[items.B]\n").unwrap();
        assert_eq!(menu.layout.len(), 1);
        assert_eq!(menu.unplaced_items(), ["B".to_string()]);

        let menu = load(
            "title = \"x\"\nlayout = [\"A\",\"A\",\"A\",\"A\",\"A\",\"A\",\"A\",\"A\"]\n[items.A]\n",
        )
        .unwrap();
        assert_eq!(menu.rows, 6);
        assert_eq!(menu.item_count(), 6);
    }

    #[test]
    fn string_layout_splits_on_newlines() {
        let menu = load(
            "title = \"x\"\nlayout = \"\"\"\nAB\n`XY`A\n\"\"\"\n[items.A]\n[items.XY]\n",
        )
        .unwrap();
        assert_eq!(menu.rows, 2);
        assert!(menu.item_at(0).is_some());
        assert_eq!(menu.item_at(9).unwrap().key, "XY");
        assert_eq!(menu.item_at(10).unwrap().key, "A");
    }

    #[test]
    fn close_item_uses_its_slot() {
        let menu = load(
            r#"
title = "x"
layout = ["AAAAAAAAA", "AAAAAAAAA"]

[items.close]
material = "barrier"
slot = 13
actions = ["close"]
"#,
        )
        .unwrap();
        assert_eq!(menu.item_at(13).unwrap().key, "close");
    }

    #[test]
    fn bad_item_does_not_abort_menu() {
        let menu = load(
            r#"
title = "x"
layout = ["AB"]

[items.A]
amount = "lots"

[items.B]
material = "not a real material!"
"#,
        )
        .unwrap();
        assert!(menu.item_at(0).is_none());
        assert_eq!(menu.item_at(1).unwrap().visual.material, DEFAULT_MATERIAL);
    }

    #[test]
    fn conditional_sets_and_bare_strings() {
        let menu = load(
            r#"
title = "x"
layout = ["V"]

[items.V]
actions = [
    { condition = "perm:vip.access", actions = "tell:welcome", deny = ["tell:no-access", "close:"] },
    "teleport:spawn",
    "tell:after",
]
"#,
        )
        .unwrap();

        let sets = &menu.item_at(0).unwrap().action_sets;
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].condition, Some(Condition::Permission("vip.access".into())));
        assert_eq!(sets[0].actions, vec![Action::Tell("welcome".into())]);
        assert_eq!(sets[0].deny_actions.len(), 2);
        assert_eq!(sets[1].actions, vec![Action::Tell("after".into())]);
    }

    #[test]
    fn activators_and_events() {
        let menu = load(
            r#"
title = "x"
layout = ["A"]
type = "hopper"

[items.A]

[activators]
command = "/shop"
chat = ["Open Shop", "shop please"]
item = { material = "clock", name = "&bMenu" }

[events]
open = "sound:UI_BUTTON_CLICK"
CLOSE = ["tell:bye", { condition = "perm:x", actions = ["tell:x"] }]
"#,
        )
        .unwrap();

        assert_eq!(menu.kind, MenuType::Hopper);
        assert_eq!(menu.size(), 5);
        assert_eq!(menu.activators.len(), 3);
        assert_eq!(menu.activators[0], Activator::Command(vec!["/shop".into()]));
        match &menu.activators[2] {
            Activator::Item(t) => {
                assert_eq!(t.material, "CLOCK");
                assert_eq!(t.name.as_deref(), Some("§bMenu"));
            }
            other => panic!("unexpected activator {:?}", other),
        }
        assert_eq!(menu.event_handlers("open").len(), 1);
        assert_eq!(menu.event_handlers("close").len(), 2);
        assert!(menu.event_handlers("click").is_empty());
    }

    #[test]
    fn flat_item_activator_with_bad_material_uses_compass() {
        let menu = load(
            "title = \"x\"\nlayout = [\"A\"]\n[items]\n[activators]\nmaterial = \"??\"\n",
        )
        .unwrap();
        assert_eq!(
            menu.activators,
            vec![Activator::Item(ItemTrigger {
                material: DEFAULT_TRIGGER_MATERIAL.into(),
                name: None,
                lore: vec![],
            })]
        );
    }

    #[test]
    fn loads_from_file_using_stem_as_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.toml");
        fs::write(&path, "title = \"Shop\"\nlayout = [\"A\"]\n[items.A]\n").unwrap();

        let menu = load_menu_from_file(&path, &RowCache::new()).unwrap();
        assert_eq!(menu.name, "shop");

        let missing = load_menu_from_file(&dir.path().join("nope.toml"), &RowCache::new());
        assert!(matches!(missing, Err(MenuLoadError::Io { .. })));
    }
}
