use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::output::{Output, OutputBlock};
use crate::error::HostError;
use crate::menu::{ItemVisual, MenuType};

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Player {
    pub id: String,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Player {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Player whose id is their name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Player {
            id: name.to_lowercase(),
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundSpec {
    pub id: String,
    pub volume: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleSpec {
    pub title: String,
    pub subtitle: String,
    pub fade_in: u32,
    pub stay: u32,
    pub fade_out: u32,
}

/// Materialised inventory handed to the host when a menu opens.
#[derive(Debug, Clone)]
pub struct InventoryView {
    pub menu: String,
    pub title: String,
    pub kind: MenuType,
    pub size: usize,
    pub slots: Vec<(usize, ItemVisual)>,
}

impl InventoryView {
    pub fn item_at(&self, slot: usize) -> Option<&ItemVisual> {
        self.slots.iter().find(|(s, _)| *s == slot).map(|(_, v)| v)
    }
}

/// Everything player-visible goes through the host; the engine never talks
/// to a concrete server type.
pub trait Host: Send + Sync {
    fn has_permission(&self, player: &Player, permission: &str) -> bool;

    /// Placeholder substitution; text without placeholders is returned unchanged.
    fn set_placeholders(&self, player: &Player, text: &str) -> String;

    fn send_message(&self, player: &Player, message: &str) -> HostResult<()>;

    fn play_sound(&self, player: &Player, sound: &SoundSpec) -> HostResult<()>;

    fn send_title(&self, player: &Player, title: &TitleSpec) -> HostResult<()>;

    fn send_action_bar(&self, player: &Player, message: &str) -> HostResult<()>;

    fn perform_command(&self, player: &Player, command: &str) -> HostResult<()>;

    fn dispatch_console_command(&self, command: &str) -> HostResult<()>;

    fn open_inventory(&self, player: &Player, view: InventoryView) -> HostResult<()>;

    fn close_inventory(&self, player: &Player) -> HostResult<()>;
}

#[derive(Default)]
struct RecordingState {
    outputs: HashMap<String, Output>,
    console: Output,
    permissions: HashMap<String, HashSet<String>>,
    placeholders: HashMap<String, HashMap<String, String>>,
    open_views: HashMap<String, InventoryView>,
    failing: HashSet<&'static str>,
}

/// In-memory host that records every effect per player.
#[derive(Default)]
pub struct RecordingHost {
    state: Mutex<RecordingState>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn grant(&self, player: &Player, permission: &str) {
        self.state
            .lock()
            .permissions
            .entry(player.id.clone())
            .or_default()
            .insert(permission.to_string());
    }

    pub fn revoke(&self, player: &Player, permission: &str) {
        if let Some(perms) = self.state.lock().permissions.get_mut(&player.id) {
            perms.remove(permission);
        }
    }

    pub fn set_placeholder(&self, player: &Player, key: &str, value: &str) {
        self.state
            .lock()
            .placeholders
            .entry(player.id.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Make every subsequent call named `call` fail (e.g. "send_message").
    pub fn fail_call(&self, call: &'static str) {
        self.state.lock().failing.insert(call);
    }

    pub fn take_output(&self, player: &Player) -> Output {
        self.state
            .lock()
            .outputs
            .remove(&player.id)
            .unwrap_or_default()
    }

    pub fn take_console_output(&self) -> Output {
        std::mem::take(&mut self.state.lock().console)
    }

    pub fn open_view(&self, player: &Player) -> Option<InventoryView> {
        self.state.lock().open_views.get(&player.id).cloned()
    }

    fn record(&self, call: &'static str, player: &Player, block: OutputBlock) -> HostResult<()> {
        let mut state = self.state.lock();
        if state.failing.contains(call) {
            return Err(HostError::new(call, "recording host configured to fail"));
        }
        state
            .outputs
            .entry(player.id.clone())
            .or_default()
            .push(block);
        Ok(())
    }
}

impl Host for RecordingHost {
    fn has_permission(&self, player: &Player, permission: &str) -> bool {
        self.state
            .lock()
            .permissions
            .get(&player.id)
            .is_some_and(|p| p.contains(permission))
    }

    fn set_placeholders(&self, player: &Player, text: &str) -> String {
        let state = self.state.lock();
        let mut out = text.replace("%player_name%", &player.name);
        if let Some(values) = state.placeholders.get(&player.id) {
            for (key, value) in values {
                out = out.replace(&format!("%{}%", key), value);
            }
        }
        out
    }

    fn send_message(&self, player: &Player, message: &str) -> HostResult<()> {
        self.record(
            "send_message",
            player,
            OutputBlock::Text(message.to_string()),
        )
    }

    fn play_sound(&self, player: &Player, sound: &SoundSpec) -> HostResult<()> {
        self.record(
            "play_sound",
            player,
            OutputBlock::Sound {
                id: sound.id.clone(),
                volume: sound.volume,
                pitch: sound.pitch,
            },
        )
    }

    fn send_title(&self, player: &Player, title: &TitleSpec) -> HostResult<()> {
        self.record(
            "send_title",
            player,
            OutputBlock::Title {
                title: title.title.clone(),
                subtitle: title.subtitle.clone(),
                fade_in: title.fade_in,
                stay: title.stay,
                fade_out: title.fade_out,
            },
        )
    }

    fn send_action_bar(&self, player: &Player, message: &str) -> HostResult<()> {
        self.record(
            "send_action_bar",
            player,
            OutputBlock::ActionBar(message.to_string()),
        )
    }

    fn perform_command(&self, player: &Player, command: &str) -> HostResult<()> {
        self.record(
            "perform_command",
            player,
            OutputBlock::Command(command.to_string()),
        )
    }

    fn dispatch_console_command(&self, command: &str) -> HostResult<()> {
        let mut state = self.state.lock();
        if state.failing.contains("dispatch_console_command") {
            return Err(HostError::new(
                "dispatch_console_command",
                "recording host configured to fail",
            ));
        }
        state
            .console
            .push(OutputBlock::ConsoleCommand(command.to_string()));
        Ok(())
    }

    fn open_inventory(&self, player: &Player, view: InventoryView) -> HostResult<()> {
        self.record(
            "open_inventory",
            player,
            OutputBlock::Opened {
                menu: view.menu.clone(),
                title: view.title.clone(),
                size: view.size,
            },
        )?;
        self.state.lock().open_views.insert(player.id.clone(), view);
        Ok(())
    }

    fn close_inventory(&self, player: &Player) -> HostResult<()> {
        self.record("close_inventory", player, OutputBlock::Closed)?;
        self.state.lock().open_views.remove(&player.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_substitute_known_keys_only() {
        let host = RecordingHost::new();
        let steve = Player::named("Steve");
        host.set_placeholder(&steve, "player_level", "12");

        let out = host.set_placeholders(&steve, "%player_level% > %unknown% %player_name%");
        assert_eq!(out, "12 > %unknown% Steve");
    }

    #[test]
    fn failing_call_records_nothing() {
        let host = RecordingHost::new();
        let steve = Player::named("Steve");
        host.fail_call("send_message");

        assert!(host.send_message(&steve, "hi").is_err());
        assert!(host.take_output(&steve).is_empty());
    }

    #[test]
    fn permissions_are_per_player() {
        let host = RecordingHost::new();
        let steve = Player::named("Steve");
        let alex = Player::named("Alex");
        host.grant(&steve, "vip.access");

        assert!(host.has_permission(&steve, "vip.access"));
        assert!(!host.has_permission(&alex, "vip.access"));

        host.revoke(&steve, "vip.access");
        assert!(!host.has_permission(&steve, "vip.access"));
    }

    #[test]
    fn action_bar_is_recorded_as_its_own_block() {
        let host = RecordingHost::new();
        let steve = Player::named("Steve");
        host.send_action_bar(&steve, "&eready").unwrap();
        host.send_message(&steve, "hi").unwrap();

        let out = host.take_output(&steve);
        assert_eq!(out.blocks[0], OutputBlock::ActionBar("&eready".into()));
        assert_eq!(out.texts(), vec!["hi"]);
    }
}
