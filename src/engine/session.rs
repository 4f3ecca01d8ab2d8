use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::engine::actions::{ActionContext, MenuNavigator, run_action_sets};
use crate::engine::activators::{find_by_chat, find_by_command, find_by_item};
use crate::engine::helpers::{colorize, replace_player};
use crate::engine::host::{Host, InventoryView, Player};
use crate::engine::scheduler::Scheduler;
use crate::error::{HostError, MenuError, MenuLoadError};
use crate::menu::{ItemVisual, Menu, MenuRegistry};

pub const OPEN_EVENT: &str = "open";
pub const CLOSE_EVENT: &str = "close";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenDecision {
    Allow,
    Cancel,
}

/// Consulted before a menu is materialised. Hooks must not register hooks.
pub type PreOpenHook = Box<dyn Fn(&Player, &Menu) -> OpenDecision + Send + Sync>;

/// Told the menu count after every successful reload.
pub type ReloadHook = Box<dyn Fn(usize) + Send + Sync>;

struct OpenView {
    player: Player,
    menu: Arc<Menu>,
}

/// Which player is looking at which menu, and what happens when they open,
/// click or close it. Inbound calls may arrive on any thread; inventory work
/// is moved onto the main context. No lock is held while the host or an
/// action runs.
pub struct MenuEngine {
    me: Weak<MenuEngine>,
    host: Arc<dyn Host>,
    scheduler: Arc<dyn Scheduler>,
    registry: Arc<MenuRegistry>,
    hooks: RwLock<Vec<PreOpenHook>>,
    reload_hooks: RwLock<Vec<ReloadHook>>,
    views: Mutex<HashMap<String, OpenView>>,
}

impl MenuEngine {
    pub fn new(
        host: Arc<dyn Host>,
        scheduler: Arc<dyn Scheduler>,
        registry: Arc<MenuRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| MenuEngine {
            me: me.clone(),
            host,
            scheduler,
            registry,
            hooks: RwLock::new(Vec::new()),
            reload_hooks: RwLock::new(Vec::new()),
            views: Mutex::new(HashMap::new()),
        })
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn registry(&self) -> &Arc<MenuRegistry> {
        &self.registry
    }

    pub fn add_pre_open_hook(
        &self,
        hook: impl Fn(&Player, &Menu) -> OpenDecision + Send + Sync + 'static,
    ) {
        self.hooks.write().push(Box::new(hook));
    }

    pub fn add_reload_hook(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.reload_hooks.write().push(Box::new(hook));
    }

    /// Run `task` now if on the main context, otherwise queue it there.
    fn on_main(&self, task: impl FnOnce(&MenuEngine) + Send + 'static) {
        if self.scheduler.is_main_context() {
            task(self);
            return;
        }
        match self.me.upgrade() {
            Some(engine) => self.scheduler.run_on_main(Box::new(move || task(&*engine))),
            None => log::debug!("engine dropped; discarding deferred task"),
        }
    }

    //////////////////
    /// OPEN       ///
    //////////////////

    /// Open `menu` for `player`. Off the main context the open is deferred
    /// and this returns `Ok` immediately.
    pub fn open_menu(&self, menu: &Arc<Menu>, player: &Player) -> Result<(), HostError> {
        menu.touch();
        if self.scheduler.is_main_context() {
            return self.open_now(menu, player);
        }

        let menu = Arc::clone(menu);
        let player = player.clone();
        self.on_main(move |engine| {
            if let Err(e) = engine.open_now(&menu, &player) {
                log::error!("Failed to open menu '{}' for {}: {}", menu.name, player.name, e);
            }
        });
        Ok(())
    }

    pub fn open_by_name(&self, name: &str, player: &Player) -> Result<(), MenuError> {
        let menu = self.registry.get(name)?;
        self.open_menu(&menu, player)?;
        Ok(())
    }

    /// Inbound open request from the embedding shell.
    pub fn on_open_request(&self, menu_name: &str, player: &Player) -> Result<(), MenuError> {
        self.open_by_name(menu_name, player)
    }

    fn open_now(&self, menu: &Arc<Menu>, player: &Player) -> Result<(), HostError> {
        let target: &Menu = menu;
        let cancelled = self
            .hooks
            .read()
            .iter()
            .any(|hook| hook(player, target) == OpenDecision::Cancel);
        if cancelled {
            log::debug!("Opening of menu '{}' for {} was cancelled", menu.name, player.name);
            return Ok(());
        }

        let view = self.build_view(menu, player);
        self.host.open_inventory(player, view)?;
        self.views.lock().insert(
            player.id.clone(),
            OpenView {
                player: player.clone(),
                menu: Arc::clone(menu),
            },
        );
        log::debug!("Opened menu '{}' for {}", menu.name, player.name);

        self.run_event(menu, OPEN_EVENT, player);
        Ok(())
    }

    fn build_view(&self, menu: &Menu, player: &Player) -> InventoryView {
        let size = menu.size();
        let title = colorize(
            &self
                .host
                .set_placeholders(player, &replace_player(&menu.title, &player.name)),
        );

        let mut slots: Vec<(usize, ItemVisual)> = Vec::with_capacity(menu.item_count());
        for (slot, item) in menu.slots() {
            if slot < size {
                slots.push((slot, item.visual.clone()));
            } else {
                log::warn!(
                    "Attempted to set item at invalid slot {} in menu {}",
                    slot,
                    menu.name
                );
            }
        }

        InventoryView {
            menu: menu.name.clone(),
            title,
            kind: menu.kind,
            size,
            slots,
        }
    }

    //////////////////
    /// CLICK      ///
    //////////////////

    /// Inbound click. Runs on the main context.
    pub fn on_click(&self, menu_name: &str, slot: usize, player: &Player) {
        let menu_name = menu_name.to_string();
        let player = player.clone();
        self.on_main(move |engine| {
            engine.handle_click(&menu_name, slot, &player);
        });
    }

    /// Click handling proper. `None` when the click was ignored (no view,
    /// stale view, slot outside the inventory, empty slot); otherwise whether the chain ran to the end.
    pub fn handle_click(&self, menu_name: &str, slot: usize, player: &Player) -> Option<bool> {
        let menu = self.open_view_of(player)?;
        if menu.name != menu_name || menu.is_expired() {
            log::debug!(
                "Ignoring click from {} on '{}': bound view is '{}'{}",
                player.name,
                menu_name,
                menu.name,
                if menu.is_expired() { " (expired)" } else { "" }
            );
            return None;
        }

        if slot >= menu.size() {
            log::debug!("Ignoring click on slot {} outside menu '{}'", slot, menu.name);
            return None;
        }
        let item = Arc::clone(menu.item_at(slot)?);
        log::debug!(
            "{} clicked slot {} ('{}') in menu '{}'",
            player.name,
            slot,
            item.key,
            menu.name
        );

        let ctx = ActionContext {
            host: &*self.host,
            navigator: self,
            player,
        };
        Some(run_action_sets(&item.action_sets, &ctx))
    }

    //////////////////
    /// CLOSE      ///
    //////////////////

    /// Inbound close: the player's inventory is already gone.
    pub fn on_close(&self, player: &Player) {
        let player = player.clone();
        self.on_main(move |engine| {
            let view = engine.views.lock().remove(&player.id);
            if let Some(view) = view {
                log::debug!("Menu '{}' closed by {}", view.menu.name, player.name);
                engine.run_event(&view.menu, CLOSE_EVENT, &player);
            }
        });
    }

    /// Handlers are best-effort; action failures are logged by the actions.
    fn run_event(&self, menu: &Menu, event: &str, player: &Player) {
        let handlers = menu.event_handlers(event);
        if handlers.is_empty() {
            return;
        }
        let ctx = ActionContext {
            host: &*self.host,
            navigator: self,
            player,
        };
        run_action_sets(handlers, &ctx);
    }

    pub fn open_view_of(&self, player: &Player) -> Option<Arc<Menu>> {
        self.views
            .lock()
            .get(&player.id)
            .map(|view| Arc::clone(&view.menu))
    }

    pub fn open_view_count(&self) -> usize {
        self.views.lock().len()
    }

    //////////////////
    /// RELOAD     ///
    //////////////////

    /// Reload menus, then close and reopen views bound to expired menus.
    pub fn reload(&self) -> Result<usize, MenuLoadError> {
        let count = self.registry.load()?;
        self.refresh_open_views();
        for hook in self.reload_hooks.read().iter() {
            hook(count);
        }
        Ok(count)
    }

    /// Queue a reload on the main context; safe from any thread.
    pub fn request_reload(&self) {
        self.on_main(|engine| match engine.reload() {
            Ok(count) => log::info!("Reloaded {} menus", count),
            Err(e) => log::error!("Menu reload failed: {}", e),
        });
    }

    /// Close every view whose menu has expired and reopen the fresh menu of
    /// the same name. Old close handlers do not run. Returns how many views
    /// were refreshed.
    pub fn refresh_open_views(&self) -> usize {
        let stale: Vec<OpenView> = {
            let mut views = self.views.lock();
            let ids: Vec<String> = views
                .iter()
                .filter(|(_, view)| view.menu.is_expired())
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| views.remove(id)).collect()
        };

        let refreshed = stale.len();
        for view in stale {
            if let Err(e) = self.host.close_inventory(&view.player) {
                log::warn!("Failed to close stale menu for {}: {}", view.player.name, e);
            }
            match self.registry.get(&view.menu.name) {
                Ok(fresh) => {
                    if let Err(e) = self.open_menu(&fresh, &view.player) {
                        log::error!(
                            "Failed to reopen menu '{}' for {}: {}",
                            fresh.name,
                            view.player.name,
                            e
                        );
                    }
                }
                Err(_) => log::warn!(
                    "Menu '{}' no longer exists; closed it for {}",
                    view.menu.name,
                    view.player.name
                ),
            }
        }
        refreshed
    }

    //////////////////
    /// ACTIVATORS ///
    //////////////////

    /// A command typed by `player`. Returns true when a menu claimed it.
    pub fn on_command(&self, player: &Player, input: &str) -> bool {
        let Some(menu) = find_by_command(&self.registry.all(), input) else {
            return false;
        };
        self.open_and_log(&menu, player);
        true
    }

    /// A chat line; may arrive off the main context. True cancels the chat.
    pub fn on_chat(&self, player: &Player, message: &str) -> bool {
        let Some(menu) = find_by_chat(&self.registry.all(), message) else {
            return false;
        };
        self.open_and_log(&menu, player);
        true
    }

    /// `player` used `held`. True when an item activator matched.
    pub fn on_interact(&self, player: &Player, held: &ItemVisual) -> bool {
        let Some(menu) = find_by_item(&self.registry.all(), held) else {
            return false;
        };
        self.open_and_log(&menu, player);
        true
    }

    fn open_and_log(&self, menu: &Arc<Menu>, player: &Player) {
        if let Err(e) = self.open_menu(menu, player) {
            log::error!("Failed to open menu '{}' for {}: {}", menu.name, player.name, e);
        }
    }
}

impl MenuNavigator for MenuEngine {
    fn open_by_name(&self, name: &str, player: &Player) -> Result<(), MenuError> {
        MenuEngine::open_by_name(self, name, player)
    }

    fn close_view(&self, player: &Player, run_close_handlers: bool) -> Result<(), HostError> {
        // Unbind first: a host may report the close back through `on_close`.
        let view = self.views.lock().remove(&player.id);
        self.host.close_inventory(player)?;
        if let (true, Some(view)) = (run_close_handlers, view) {
            self.run_event(&view.menu, CLOSE_EVENT, player);
        }
        Ok(())
    }
}
