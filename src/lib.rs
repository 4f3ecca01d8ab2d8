pub mod config;
pub mod engine;
pub mod error;
pub mod menu;
pub mod watcher;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Messages, SETTINGS_FILE, Settings};
use engine::{Host, MenuEngine, Output, PeriodicHandle, Player, Scheduler, colorize};
use menu::MenuRegistry;
use watcher::MenuWatcher;

pub use error::{ConfigError, HostError, MenuError, MenuLoadError, WatchError};

pub const EXAMPLE_MENU_FILE: &str = "example.toml";
const EXAMPLE_MENU: &str = include_str!("../assets/example.toml");

const SUBCOMMANDS: [&str; 5] = ["open", "reload", "list", "serve", "help"];

/// Who issued an admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSender {
    Console,
    Player(Player),
}

/// The embedding facade: settings, registry, engine, cache sweeper and the
/// optional menu watcher, plus the admin command surface.
pub struct MenuPlugin {
    data_dir: PathBuf,
    settings: Settings,
    engine: Arc<MenuEngine>,
    watcher: Option<MenuWatcher>,
    sweeper: Option<PeriodicHandle>,
}

impl MenuPlugin {
    /// Load settings and menus from `data_dir` and wire everything up.
    /// A menus directory that does not exist yet gets an example menu.
    pub fn start(
        data_dir: impl Into<PathBuf>,
        host: Arc<dyn Host>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, MenuLoadError> {
        let data_dir = data_dir.into();
        let settings = load_settings(&data_dir);
        if settings.debug {
            log::debug!("Debug mode enabled");
        }

        let menus_dir = settings.menus_path(&data_dir);
        write_example_menu(&menus_dir)?;

        let registry = Arc::new(MenuRegistry::new(menus_dir));
        let count = registry.load()?;
        let engine = MenuEngine::new(host, scheduler, registry);

        let mut plugin = MenuPlugin {
            data_dir,
            settings,
            engine,
            watcher: None,
            sweeper: None,
        };
        plugin.restart_sweeper();
        plugin.sync_watcher();

        log::info!("Menu plugin enabled with {} menus", count);
        Ok(plugin)
    }

    pub fn engine(&self) -> &Arc<MenuEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<MenuRegistry> {
        self.engine.registry()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.as_ref().is_some_and(MenuWatcher::is_running)
    }

    /// Run one admin command (`open`, `reload`, `list`, `serve`, `help`).
    /// Replies are returned; menu effects go through the host.
    pub fn step(&mut self, sender: &CommandSender, input: &str) -> Output {
        let mut out = Output::new();
        let mut parts = input.split_whitespace();
        let sub = parts.next().unwrap_or("help").to_lowercase();
        let rest: Vec<&str> = parts.collect();

        match sub.as_str() {
            "open" => self.cmd_open(&mut out, sender, rest.first().copied()),
            "reload" => self.cmd_reload(&mut out),
            "list" => self.cmd_list(&mut out),
            "serve" => self.cmd_serve(&mut out),
            "help" => {
                for line in &self.settings.messages.help {
                    out.say(colorize(line));
                }
            }
            _ => out.say(colorize(&self.settings.messages.unknown_command)),
        }
        out
    }

    /// Completions for a partially typed admin command.
    pub fn complete(&self, input: &str) -> Vec<String> {
        let lower = input.to_lowercase();
        match lower.split_once(char::is_whitespace) {
            Some((sub, rest)) if sub == "open" => {
                let prefix = rest.trim_start();
                self.registry()
                    .names()
                    .into_iter()
                    .filter(|name| name.to_lowercase().starts_with(prefix))
                    .collect()
            }
            Some(_) => Vec::new(),
            None => SUBCOMMANDS
                .iter()
                .filter(|c| c.starts_with(lower.as_str()))
                .map(|c| c.to_string())
                .collect(),
        }
    }

    fn cmd_open(&self, out: &mut Output, sender: &CommandSender, name: Option<&str>) {
        let messages = &self.settings.messages;
        let CommandSender::Player(player) = sender else {
            out.say(colorize(&messages.player_only));
            return;
        };
        let Some(name) = name else {
            out.say(colorize(&messages.usage_open));
            return;
        };

        // Lookup happens off the main context; the reply comes through the host.
        let engine = Arc::clone(&self.engine);
        let player = player.clone();
        let menu_name = name.to_string();
        let messages = messages.clone();
        self.registry().get_async(
            name,
            self.engine.scheduler(),
            Box::new(move |result| {
                let reply = match result {
                    Ok(menu) => match engine.open_menu(&menu, &player) {
                        Ok(()) => Messages::format(
                            &messages.menu_opened,
                            &[("title", menu.title.as_str())],
                        ),
                        Err(e) => {
                            log::error!("Failed to open menu '{}': {}", menu_name, e);
                            Messages::format(
                                &messages.menu_open_failed,
                                &[("menu", menu_name.as_str())],
                            )
                        }
                    },
                    Err(_) => {
                        Messages::format(&messages.menu_not_found, &[("menu", menu_name.as_str())])
                    }
                };
                if let Err(e) = engine.host().send_message(&player, &colorize(&reply)) {
                    log::warn!("Could not reply to {}: {}", player.name, e);
                }
            }),
        );
    }

    fn cmd_reload(&mut self, out: &mut Output) {
        let path = self.data_dir.join(SETTINGS_FILE);
        match Settings::load(&path) {
            Ok(settings) => {
                if settings.menus_dir != self.settings.menus_dir {
                    log::warn!("menus_dir changes take effect after a restart");
                }
                self.settings = settings;
            }
            Err(e) => log::error!("Failed to reload {}: {}", path.display(), e),
        }

        match self.engine.reload() {
            Ok(count) => {
                log::info!("Reloaded {} menus", count);
                out.say(colorize(&self.settings.messages.reloaded));
            }
            Err(e) => {
                log::error!("Failed to reload menus: {}", e);
                out.say(colorize(&self.settings.messages.reload_failed));
            }
        }

        self.restart_sweeper();
        self.sync_watcher();
    }

    fn cmd_list(&self, out: &mut Output) {
        let messages = &self.settings.messages;
        let menus = self.registry().all();

        out.say(colorize(&messages.list_title));
        if menus.is_empty() {
            out.say(colorize(&messages.list_empty));
            return;
        }
        for menu in menus {
            let line = Messages::format(
                &messages.list_format,
                &[("name", menu.name.as_str()), ("title", menu.title.as_str())],
            );
            out.say(colorize(&line));
        }
    }

    fn cmd_serve(&mut self, out: &mut Output) {
        self.settings.toggle_serve_mode();
        self.sync_watcher();

        let message = if self.is_watching() {
            &self.settings.messages.serve_enabled
        } else {
            &self.settings.messages.serve_disabled
        };
        out.say(colorize(message));
    }

    /// Start or stop the watcher to match `serve_mode`.
    fn sync_watcher(&mut self) {
        if !self.settings.serve_mode {
            if let Some(mut watcher) = self.watcher.take() {
                watcher.stop();
            }
            return;
        }
        if self.is_watching() {
            return;
        }

        let dir = self.registry().menus_dir().to_path_buf();
        match MenuWatcher::start(&dir, &self.engine) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => {
                log::error!("Could not watch menus directory: {}", e);
                self.settings.serve_mode = false;
            }
        }
    }

    fn restart_sweeper(&mut self) {
        self.sweeper = None;
        let secs = self.settings.cache_clear_interval_secs;
        if secs == 0 {
            return;
        }
        self.sweeper = Some(
            self.registry()
                .start_cache_sweeper(&**self.engine.scheduler(), Duration::from_secs(secs)),
        );
    }

    pub fn shutdown(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        self.sweeper = None;
        log::info!("Menu plugin disabled");
    }
}

/// Settings problems are logged and fall back to defaults.
fn load_settings(data_dir: &Path) -> Settings {
    let path = data_dir.join(SETTINGS_FILE);
    Settings::load(&path).unwrap_or_else(|e| {
        log::error!("Failed to load {}: {}; using defaults", path.display(), e);
        Settings::default()
    })
}

fn write_example_menu(menus_dir: &Path) -> Result<(), MenuLoadError> {
    if menus_dir.exists() {
        return Ok(());
    }
    let io_err = |source| MenuLoadError::MenusDir {
        path: menus_dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(menus_dir).map_err(io_err)?;
    fs::write(menus_dir.join(EXAMPLE_MENU_FILE), EXAMPLE_MENU).map_err(io_err)?;
    log::info!("Created example menu in {}", menus_dir.display());
    Ok(())
}
