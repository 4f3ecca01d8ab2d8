use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while turning a menu document into a `Menu`.
#[derive(Debug, Error)]
pub enum MenuLoadError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("menu '{menu}' is not valid TOML: {message}")]
    Parse { menu: String, message: String },
    #[error("missing '{field}' for menu: {menu}")]
    MissingField { menu: String, field: &'static str },
    #[error("menu '{menu}' declares {rows} rows (expected 1..=6)")]
    InvalidRows { menu: String, rows: i64 },
    #[error("invalid layout configuration for menu: {0}")]
    InvalidLayout(String),
    #[error("cannot access menus directory '{path}': {source}")]
    MenusDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no menus were successfully loaded")]
    NoMenusLoaded,
}

/// Errors surfaced by menu lookups.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("menu not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading settings: {0}")]
    Io(#[from] io::Error),
    #[error("settings are not valid TOML: {0}")]
    Parse(String),
}

/// A host call failed while an action was running.
#[derive(Debug, Clone, Error)]
#[error("host call '{call}' failed: {message}")]
pub struct HostError {
    pub call: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(call: &'static str, message: impl Into<String>) -> Self {
        HostError {
            call,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create menu watcher: {0}")]
    Create(#[from] notify::Error),
    #[error("menus directory '{0}' does not exist")]
    MissingDir(PathBuf),
}
