mod layout;
mod loader;
mod model;
mod registry;
mod validator;

pub use layout::{COLUMNS, Layout, QUOTE, RowCache, parse_row};
pub use loader::{load_menu_from_file, load_menu_from_str};

// Re-export the menu model and the registry the engine drives.
pub use model::{
    Activator, DEFAULT_MATERIAL, DEFAULT_TRIGGER_MATERIAL, ItemTrigger, ItemVisual, MAX_ROWS, Menu,
    MenuItem, MenuType, normalize_material,
};
pub use registry::{LookupCallback, MENU_EXTENSION, MenuRegistry};
pub use validator::{ValidationError, validate_menu, validate_registry};
