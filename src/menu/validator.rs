use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use super::layout::{parse_row, token_key};
use super::model::Menu;
use crate::engine::{Action, ActionSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub menu: String,
    pub message: String,
}

impl ValidationError {
    fn new(menu: &str, msg: impl Into<String>) -> Self {
        ValidationError {
            menu: menu.to_string(),
            message: msg.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "menu '{}': {}", self.menu, self.message)
    }
}

/// Structural checks on a single menu. Findings are advisory.
pub fn validate_menu(menu: &Menu) -> Vec<ValidationError> {
    let mut errors: Vec<ValidationError> = Vec::new();
    let size = menu.size();

    // Items must land inside the inventory
    for (slot, item) in menu.slots() {
        if slot >= size {
            errors.push(ValidationError::new(
                &menu.name,
                format!(
                    "item '{}' at slot {} is outside the {}-slot inventory",
                    item.key, slot, size
                ),
            ));
        }
    }

    // Layout keys need a matching item; blanks are padding
    let declared: HashSet<&str> = menu
        .slots()
        .map(|(_, item)| item.key.as_str())
        .chain(menu.unplaced_items().iter().map(String::as_str))
        .collect();
    let used: BTreeSet<String> = menu
        .layout
        .iter()
        .flat_map(|row| parse_row(row))
        .map(|token| token_key(&token).to_string())
        .filter(|key| !key.trim().is_empty())
        .collect();
    for key in used.iter().filter(|k| !declared.contains(k.as_str())) {
        errors.push(ValidationError::new(
            &menu.name,
            format!("layout key '{}' has no item definition", key),
        ));
    }

    for key in menu.unplaced_items() {
        errors.push(ValidationError::new(
            &menu.name,
            format!("item '{}' does not appear in the layout", key),
        ));
    }

    errors
}

/// Per-menu checks plus cross-menu references (`open:` targets).
pub fn validate_registry(menus: &[Arc<Menu>]) -> Vec<ValidationError> {
    let names: HashSet<&str> = menus.iter().map(|m| m.name.as_str()).collect();
    let mut errors: Vec<ValidationError> = Vec::new();

    for menu in menus {
        errors.extend(validate_menu(menu));

        let item_sets = menu.slots().flat_map(|(_, item)| item.action_sets.iter());
        let event_sets = menu
            .event_types()
            .flat_map(|event| menu.event_handlers(event).iter());

        let mut targets: BTreeSet<&str> = BTreeSet::new();
        for set in item_sets.chain(event_sets) {
            targets.extend(open_targets(set));
        }
        for target in targets.into_iter().filter(|t| !names.contains(t)) {
            errors.push(ValidationError::new(
                &menu.name,
                format!("'open:{}' refers to an unknown menu", target),
            ));
        }
    }

    errors
}

fn open_targets(set: &ActionSet) -> impl Iterator<Item = &str> {
    set.actions
        .iter()
        .chain(set.deny_actions.iter())
        .filter_map(|action| match action {
            Action::OpenMenu(name) => Some(name.as_str()),
            _ => None,
        })
}
