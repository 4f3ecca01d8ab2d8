use std::sync::Arc;

use crate::menu::{Activator, ItemVisual, Menu, normalize_material};

/// The label of a command line: first word, leading `/` dropped, lower-cased.
fn command_label(input: &str) -> String {
    input
        .trim()
        .trim_start_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase()
}

pub fn matches_command(activator: &Activator, input: &str) -> bool {
    let Activator::Command(commands) = activator else {
        return false;
    };
    let label = command_label(input);
    !label.is_empty() && commands.iter().any(|c| command_label(c) == label)
}

/// Chat triggers match the whole (trimmed) line, ignoring case.
pub fn matches_chat(activator: &Activator, message: &str) -> bool {
    let Activator::Chat(triggers) = activator else {
        return false;
    };
    let message = message.trim().to_lowercase();
    triggers.iter().any(|t| t.trim().to_lowercase() == message)
}

/// Material must match; a declared name or lore must match exactly.
pub fn matches_item(activator: &Activator, held: &ItemVisual) -> bool {
    let Activator::Item(trigger) = activator else {
        return false;
    };

    let held_material = normalize_material(&held.material).unwrap_or_default();
    if held_material != trigger.material {
        return false;
    }
    if let Some(name) = &trigger.name {
        if held.name.as_ref() != Some(name) {
            return false;
        }
    }
    if !trigger.lore.is_empty() && held.lore != trigger.lore {
        return false;
    }
    true
}

fn find_first(menus: &[Arc<Menu>], pred: impl Fn(&Activator) -> bool) -> Option<Arc<Menu>> {
    menus
        .iter()
        .find(|menu| menu.activators.iter().any(&pred))
        .cloned()
}

pub fn find_by_command(menus: &[Arc<Menu>], input: &str) -> Option<Arc<Menu>> {
    find_first(menus, |a| matches_command(a, input))
}

pub fn find_by_chat(menus: &[Arc<Menu>], message: &str) -> Option<Arc<Menu>> {
    find_first(menus, |a| matches_chat(a, message))
}

pub fn find_by_item(menus: &[Arc<Menu>], held: &ItemVisual) -> Option<Arc<Menu>> {
    find_first(menus, |a| matches_item(a, held))
}
