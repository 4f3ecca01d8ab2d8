use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::engine::MenuEngine;
use crate::error::WatchError;
use crate::menu::MENU_EXTENSION;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// A reload reads the whole directory, so one save burst (possibly touching
/// several files) needs only one reload.
struct ReloadGate {
    window: Duration,
    last: Option<Instant>,
}

impl ReloadGate {
    fn new(window: Duration) -> Self {
        ReloadGate { window, last: None }
    }

    fn admit(&mut self, at: Instant) -> bool {
        match self.last {
            Some(last) if at.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(at);
                true
            }
        }
    }
}

pub struct MenuWatcher {
    watcher: Option<RecommendedWatcher>,
    dir: PathBuf,
}

impl MenuWatcher {
    pub fn start(dir: &Path, engine: &Arc<MenuEngine>) -> Result<Self, WatchError> {
        Self::with_debounce(dir, engine, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(
        dir: &Path,
        engine: &Arc<MenuEngine>,
        debounce: Duration,
    ) -> Result<Self, WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::MissingDir(dir.to_path_buf()));
        }

        let engine: Weak<MenuEngine> = Arc::downgrade(engine);
        let mut gate = ReloadGate::new(debounce);

        let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            match result {
                Ok(event) => {
                    if is_menu_change(&event) && gate.admit(Instant::now()) {
                        if let Some(engine) = engine.upgrade() {
                            log::info!("Menu files changed, scheduling reload");
                            engine.request_reload();
                        }
                    }
                }
                Err(e) => log::warn!("Menu watcher error: {}", e),
            }
        })?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        log::info!("Started watching menu directory: {}", dir.display());

        Ok(MenuWatcher {
            watcher: Some(watcher),
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.dir) {
                log::debug!("unwatch failed: {}", e);
            }
            log::info!("Stopped watching menu directory: {}", self.dir.display());
        }
    }
}

impl Drop for MenuWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_menu_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.extension().is_some_and(|e| e == MENU_EXTENSION))
}
