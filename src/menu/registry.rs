use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;

use super::layout::RowCache;
use super::loader::load_menu_from_file;
use super::model::Menu;
use super::validator::validate_registry;
use crate::engine::{PeriodicHandle, Scheduler};
use crate::error::{MenuError, MenuLoadError};

pub const MENU_EXTENSION: &str = "toml";

pub type LookupCallback = Box<dyn FnOnce(Result<Arc<Menu>, MenuError>) + Send + 'static>;

/// Name to menu map with a lookup cache in front. Cache entries carry the
/// generation they were read in and every change to the map bumps it, so a
/// menu cached before a reload is never returned.
pub struct MenuRegistry {
    menus_dir: PathBuf,
    menus: RwLock<HashMap<String, Arc<Menu>>>,
    cache: RwLock<HashMap<String, (u64, Arc<Menu>)>>,
    generation: AtomicU64,
    row_cache: RowCache,
}

impl MenuRegistry {
    pub fn new(menus_dir: impl Into<PathBuf>) -> Self {
        MenuRegistry {
            menus_dir: menus_dir.into(),
            menus: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            row_cache: RowCache::new(),
        }
    }

    pub fn menus_dir(&self) -> &Path {
        &self.menus_dir
    }

    /// Rescan the menus directory and swap in the result.
    ///
    /// Files are parsed without holding any lock; only the swap takes the
    /// write lock. A file that fails is logged and skipped. If nothing loads
    /// the current menus stay in place and `NoMenusLoaded` is returned.
    pub fn load(&self) -> Result<usize, MenuLoadError> {
        let dir = &self.menus_dir;
        fs::create_dir_all(dir).map_err(|source| MenuLoadError::MenusDir {
            path: dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| MenuLoadError::MenusDir {
                path: dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == MENU_EXTENSION))
            .collect();
        paths.sort();

        self.row_cache.clear();
        let mut fresh: HashMap<String, Arc<Menu>> = HashMap::new();
        for path in paths {
            match load_menu_from_file(&path, &self.row_cache) {
                Ok(menu) => {
                    log::info!("Loaded menu: {}", menu.name);
                    fresh.insert(menu.name.clone(), Arc::new(menu));
                }
                Err(e) => log::error!("Failed to load menu from {}: {}", path.display(), e),
            }
        }

        if fresh.is_empty() {
            return Err(MenuLoadError::NoMenusLoaded);
        }
        let count = fresh.len();

        {
            let mut menus = self.menus.write();
            for old in menus.values() {
                old.mark_expired();
            }
            *menus = fresh;
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.cache.write().clear();
        }

        for finding in validate_registry(&self.all()) {
            log::warn!("{}", finding);
        }
        log::info!("Loaded {} menus from {}", count, dir.display());
        Ok(count)
    }

    /// Look a menu up by name. Absence is an error, never a placeholder.
    pub fn get(&self, name: &str) -> Result<Arc<Menu>, MenuError> {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some((tag, menu)) = self.cache.read().get(name) {
            if *tag == generation {
                return Ok(menu.clone());
            }
        }

        let menus = self.menus.read();
        let menu = menus
            .get(name)
            .cloned()
            .ok_or_else(|| MenuError::NotFound(name.to_string()))?;

        // The generation only moves under the write lock, so it is stable here.
        let current = self.generation.load(Ordering::SeqCst);
        self.cache
            .write()
            .insert(name.to_string(), (current, menu.clone()));
        Ok(menu)
    }

    /// Look up off the calling thread; `callback` runs on the main context.
    pub fn get_async(
        self: &Arc<Self>,
        name: &str,
        scheduler: &Arc<dyn Scheduler>,
        callback: LookupCallback,
    ) {
        let registry = Arc::clone(self);
        let main = Arc::clone(scheduler);
        let name = name.to_string();
        scheduler.run_async(Box::new(move || {
            let result = registry.get(&name);
            main.run_on_main(Box::new(move || callback(result)));
        }));
    }

    /// Insert or replace a menu. A replaced menu is marked expired.
    pub fn register(&self, menu: Menu) -> Arc<Menu> {
        let menu = Arc::new(menu);
        let mut menus = self.menus.write();
        if let Some(old) = menus.insert(menu.name.clone(), menu.clone()) {
            if !Arc::ptr_eq(&old, &menu) {
                old.mark_expired();
            }
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.write().remove(&menu.name);
        log::debug!("Registered menu: {}", menu.name);
        menu
    }

    /// Point-in-time snapshot, sorted by name.
    pub fn all(&self) -> Vec<Arc<Menu>> {
        let mut menus: Vec<Arc<Menu>> = self.menus.read().values().cloned().collect();
        menus.sort_by(|a, b| a.name.cmp(&b.name));
        menus
    }

    pub fn names(&self) -> Vec<String> {
        self.all().iter().map(|m| m.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.menus.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.menus.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.menus.read().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
        log::debug!("Menu cache cleared");
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Clear the lookup cache every `period`. Stops once the registry is gone
    /// or the handle is dropped.
    pub fn start_cache_sweeper(
        self: &Arc<Self>,
        scheduler: &dyn Scheduler,
        period: Duration,
    ) -> PeriodicHandle {
        let weak: Weak<MenuRegistry> = Arc::downgrade(self);
        scheduler.run_periodically(
            period,
            Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.clear_cache();
                }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InlineScheduler;
    use crate::menu::loader::load_menu_from_str;
    use parking_lot::Mutex;

    fn write_menu(dir: &Path, name: &str, title: &str) {
        let text = format!("title = \"{}\"\nlayout = [\"A\"]\n[items.A]\n", title);
        fs::write(dir.join(format!("{}.toml", name)), text).unwrap();
    }

    #[test]
    fn load_reads_every_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        write_menu(dir.path(), "main", "Main");
        write_menu(dir.path(), "shop", "Shop");
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = MenuRegistry::new(dir.path());
        assert_eq!(registry.load().unwrap(), 2);
        assert_eq!(registry.names(), vec!["main".to_string(), "shop".to_string()]);
    }

    #[test]
    fn broken_file_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        write_menu(dir.path(), "main", "Main");
        fs::write(dir.path().join("broken.toml"), "title = [").unwrap();

        let registry = MenuRegistry::new(dir.path());
        assert_eq!(registry.load().unwrap(), 1);
        assert!(registry.contains("main"));
        assert!(!registry.contains("broken"));
    }

    #[test]
    fn empty_dir_is_fatal_and_keeps_previous_menus() {
        let dir = tempfile::tempdir().unwrap();
        write_menu(dir.path(), "main", "Main");
        let registry = MenuRegistry::new(dir.path());
        registry.load().unwrap();
        let before = registry.get("main").unwrap();

        fs::remove_file(dir.path().join("main.toml")).unwrap();
        assert!(matches!(registry.load(), Err(MenuLoadError::NoMenusLoaded)));
        assert!(!before.is_expired());
        assert!(registry.contains("main"));
    }

    #[test]
    fn missing_name_is_not_found() {
        let registry = MenuRegistry::new("unused");
        assert!(matches!(registry.get("nope"), Err(MenuError::NotFound(n)) if n == "nope"));
    }

    #[test]
    fn reload_invalidates_cached_lookups() {
        let dir = tempfile::tempdir().unwrap();
        write_menu(dir.path(), "main", "Old");
        let registry = MenuRegistry::new(dir.path());
        registry.load().unwrap();

        let old = registry.get("main").unwrap();
        assert_eq!(registry.cached_len(), 1);
        assert!(Arc::ptr_eq(&old, &registry.get("main").unwrap()));

        write_menu(dir.path(), "main", "New");
        registry.load().unwrap();

        let fresh = registry.get("main").unwrap();
        assert_eq!(fresh.title, "New");
        assert!(old.is_expired());
        assert!(!fresh.is_expired());
    }

    #[test]
    fn register_upserts_and_expires_replaced() {
        let registry = MenuRegistry::new("unused");
        let cache = RowCache::new();
        let first = registry.register(
            load_menu_from_str("x", "title = \"1\"\nlayout = [\"A\"]\n[items]\n", &cache).unwrap(),
        );
        assert_eq!(registry.get("x").unwrap().title, "1");

        let gen_before = registry.generation();
        registry.register(
            load_menu_from_str("x", "title = \"2\"\nlayout = [\"A\"]\n[items]\n", &cache).unwrap(),
        );

        assert!(first.is_expired());
        assert!(registry.generation() > gen_before);
        assert_eq!(registry.get("x").unwrap().title, "2");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sweeper_clears_cache_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        write_menu(dir.path(), "main", "Main");
        let registry = Arc::new(MenuRegistry::new(dir.path()));
        registry.load().unwrap();
        let scheduler = InlineScheduler::new();

        let handle = registry.start_cache_sweeper(&*scheduler, Duration::from_secs(300));
        registry.get("main").unwrap();
        assert_eq!(registry.cached_len(), 1);
        scheduler.tick_periodic();
        assert_eq!(registry.cached_len(), 0);

        drop(handle);
        registry.get("main").unwrap();
        scheduler.tick_periodic();
        assert_eq!(registry.cached_len(), 1);
    }

    #[test]
    fn async_lookup_delivers_result() {
        let dir = tempfile::tempdir().unwrap();
        write_menu(dir.path(), "main", "Main");
        let registry = Arc::new(MenuRegistry::new(dir.path()));
        registry.load().unwrap();
        let scheduler: Arc<dyn Scheduler> = InlineScheduler::new();

        let seen: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        for name in ["main", "nope"] {
            let seen = seen.clone();
            registry.get_async(
                name,
                &scheduler,
                Box::new(move |result| seen.lock().push(result.is_ok())),
            );
        }
        assert_eq!(*seen.lock(), vec![true, false]);
    }
}
