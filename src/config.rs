use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::fill_template;
use crate::error::ConfigError;

pub const SETTINGS_FILE: &str = "settings.toml";

/// `settings.toml` in the data directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    /// Watch the menus directory and reload on change.
    pub serve_mode: bool,
    /// Relative to the data directory unless absolute.
    pub menus_dir: PathBuf,
    /// Periodic lookup-cache clear; 0 disables it.
    pub cache_clear_interval_secs: u64,
    pub messages: Messages,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: false,
            serve_mode: false,
            menus_dir: PathBuf::from("menus"),
            cache_clear_interval_secs: 300,
            messages: Messages::default(),
        }
    }
}

impl Settings {
    /// A missing file means defaults; a broken one is an error.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        if !path.exists() {
            log::info!("No {} found, using default settings", path.display());
            return Ok(Settings::default());
        }
        let text = fs::read_to_string(path)?;
        let settings = Settings::from_str(&text)?;
        log::debug!(
            "Settings loaded: debug={}, serve_mode={}",
            settings.debug,
            settings.serve_mode
        );
        Ok(settings)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Settings, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn menus_path(&self, data_dir: &Path) -> PathBuf {
        if self.menus_dir.is_absolute() {
            self.menus_dir.clone()
        } else {
            data_dir.join(&self.menus_dir)
        }
    }

    /// Flip serve mode; returns the new value.
    pub fn toggle_serve_mode(&mut self) -> bool {
        self.serve_mode = !self.serve_mode;
        self.serve_mode
    }
}

/// User-facing strings. `&` colour codes and `%key%` tokens are allowed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub menu_not_found: String,
    pub menu_opened: String,
    pub menu_open_failed: String,
    pub usage_open: String,
    pub player_only: String,
    pub reloaded: String,
    pub reload_failed: String,
    pub list_title: String,
    pub list_empty: String,
    pub list_format: String,
    pub serve_enabled: String,
    pub serve_disabled: String,
    pub unknown_command: String,
    pub help: Vec<String>,
}

impl Default for Messages {
    fn default() -> Self {
        Messages {
            menu_not_found: "&cMenu not found: %menu%".into(),
            menu_opened: "&aOpened menu: %title%".into(),
            menu_open_failed: "&cFailed to open menu: %menu%".into(),
            usage_open: "&cUsage: open <menu>".into(),
            player_only: "&cThis command can only be used by players.".into(),
            reloaded: "&aConfiguration reloaded.".into(),
            reload_failed: "&cFailed to reload menus, see console.".into(),
            list_title: "&6Loaded menus:".into(),
            list_empty: "&7No menus loaded.".into(),
            list_format: "&e- %name%&7: %title%".into(),
            serve_enabled: "&aServe mode enabled, watching menu files.".into(),
            serve_disabled: "&cServe mode disabled.".into(),
            unknown_command: "&cUnknown command. Try 'help'.".into(),
            help: vec![
                "&6=== Menu Commands ===".into(),
                "&eopen <menu> &7- Open a menu".into(),
                "&ereload &7- Reload settings and menus".into(),
                "&elist &7- List loaded menus".into(),
                "&eserve &7- Toggle watching the menus directory".into(),
            ],
        }
    }
}

impl Messages {
    pub fn format(template: &str, pairs: &[(&str, &str)]) -> String {
        fill_template(template, pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let s = Settings::from_str("").unwrap();
        assert!(!s.debug);
        assert!(!s.serve_mode);
        assert_eq!(s.menus_dir, PathBuf::from("menus"));
        assert_eq!(s.cache_clear_interval_secs, 300);
        assert_eq!(s.messages.list_title, "&6Loaded menus:");
    }

    #[test]
    fn partial_messages_keep_other_defaults() {
        let s = Settings::from_str(
            r#"
debug = true
database = { type = "sqlite" }

[messages]
menu_not_found = "nope: %menu%"
"#,
        )
        .unwrap();
        assert!(s.debug);
        assert_eq!(s.messages.menu_not_found, "nope: %menu%");
        assert_eq!(s.messages.reloaded, "&aConfiguration reloaded.");
    }

    #[test]
    fn malformed_settings_are_errors() {
        assert!(matches!(
            Settings::from_str("debug = \"sometimes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(s.cache_clear_interval_secs, 300);
    }

    #[test]
    fn menus_path_is_relative_to_data_dir() {
        let s = Settings::default();
        assert_eq!(
            s.menus_path(Path::new("/srv/plugin")),
            PathBuf::from("/srv/plugin/menus")
        );
    }

    #[test]
    fn format_and_toggle() {
        assert_eq!(
            Messages::format("&aOpened menu: %title%", &[("title", "Shop")]),
            "&aOpened menu: Shop"
        );
        let mut s = Settings::default();
        assert!(s.toggle_serve_mode());
        assert!(!s.toggle_serve_mode());
    }
}
