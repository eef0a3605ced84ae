use crate::flags::ItemFlags;
use crate::tray::Shared;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

/// One entry in the tray menu tree.
///
/// `MenuItem` is a cheap handle; clones address the same underlying item.
/// Don't construct it directly, use [`Tray::add_menu_item`](crate::Tray::add_menu_item)
/// and friends. All methods can be called from any thread.
#[derive(Clone)]
pub struct MenuItem {
    pub(crate) inner: Arc<ItemInner>,
    pub(crate) shared: Arc<Shared>,
}

/// Plain copy of a menu item's rendered state, handed to native backends.
#[derive(Clone, Debug)]
pub struct ItemSnapshot {
    pub id: u32,
    /// Submenu this item belongs to, or that it opens when `submenu` is set.
    pub menu_id: Option<u32>,
    pub title: String,
    pub tooltip: String,
    pub disabled: bool,
    pub checked: bool,
    pub checkable: bool,
    pub separator: bool,
    pub submenu: bool,
    pub submenu_item: bool,
}

pub(crate) struct ItemInner {
    pub(crate) id: u32,
    pub(crate) menu_id: Option<u32>,
    pub(crate) checkable: bool,
    pub(crate) separator: bool,
    pub(crate) submenu: bool,
    pub(crate) submenu_item: bool,
    pub(crate) state: Mutex<ItemState>,
    // Capacity-one slot: a click while the previous one is undelivered is
    // dropped, never queued, and never blocks the native loop.
    pub(crate) clicked_tx: SyncSender<()>,
    clicked_rx: Mutex<Receiver<()>>,
}

pub(crate) struct ItemState {
    pub(crate) title: String,
    pub(crate) tooltip: String,
    pub(crate) disabled: bool,
    pub(crate) checked: bool,
}

impl ItemInner {
    pub(crate) fn new(
        id: u32,
        menu_id: Option<u32>,
        title: &str,
        tooltip: &str,
        flags: ItemFlags,
        submenu: bool,
        submenu_item: bool,
    ) -> Arc<ItemInner> {
        let (clicked_tx, clicked_rx) = sync_channel(1);
        Arc::new(ItemInner {
            id,
            menu_id,
            checkable: flags.contains(ItemFlags::CHECKABLE),
            separator: flags.contains(ItemFlags::SEPARATOR),
            submenu,
            submenu_item,
            state: Mutex::new(ItemState {
                title: title.to_owned(),
                tooltip: tooltip.to_owned(),
                disabled: flags.contains(ItemFlags::DISABLED),
                checked: flags.contains(ItemFlags::CHECKED),
            }),
            clicked_tx,
            clicked_rx: Mutex::new(clicked_rx),
        })
    }

    pub(crate) fn snapshot_with(&self, state: &ItemState) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            menu_id: self.menu_id,
            title: state.title.clone(),
            tooltip: state.tooltip.clone(),
            disabled: state.disabled,
            checked: state.checked,
            checkable: self.checkable,
            separator: self.separator,
            submenu: self.submenu,
            submenu_item: self.submenu_item,
        }
    }

    pub(crate) fn snapshot(&self) -> ItemSnapshot {
        let state = self.state.lock().unwrap();
        self.snapshot_with(&state)
    }
}

impl MenuItem {
    /// The process-unique identifier the native layer reports clicks with.
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    pub fn checkable(&self) -> bool {
        self.inner.checkable
    }

    pub fn is_separator(&self) -> bool {
        self.inner.separator
    }

    pub fn is_submenu(&self) -> bool {
        self.inner.submenu
    }

    pub fn is_submenu_item(&self) -> bool {
        self.inner.submenu_item
    }

    /// Adds an item nested under this submenu, with the same flag
    /// normalization as [`Tray::add_menu_item`](crate::Tray::add_menu_item).
    pub fn add_submenu_item(&self, title: &str, tooltip: &str, flags: ItemFlags) -> MenuItem {
        let flags = flags.normalized();
        let inner = ItemInner::new(
            self.shared.next_id(),
            self.inner.menu_id,
            title,
            tooltip,
            flags,
            false,
            true,
        );
        self.shared.register(inner)
    }

    /// Sets the text shown on the menu item.
    pub fn set_title(&self, title: &str) {
        self.shared
            .update(&self.inner, |state| state.title = title.to_owned());
    }

    /// Sets the text shown when hovering over the menu item.
    pub fn set_tooltip(&self, tooltip: &str) {
        self.shared
            .update(&self.inner, |state| state.tooltip = tooltip.to_owned());
    }

    /// Enables the menu item regardless of its previous state.
    pub fn enable(&self) {
        self.shared
            .update(&self.inner, |state| state.disabled = false);
    }

    /// Disables (grays out) the menu item regardless of its previous state.
    pub fn disable(&self) {
        self.shared
            .update(&self.inner, |state| state.disabled = true);
    }

    pub fn disabled(&self) -> bool {
        self.inner.state.lock().unwrap().disabled
    }

    /// Puts a check mark on the menu item regardless of its previous state.
    pub fn check(&self) {
        self.shared
            .update(&self.inner, |state| state.checked = true);
    }

    /// Removes the check mark regardless of the previous state.
    pub fn uncheck(&self) {
        self.shared
            .update(&self.inner, |state| state.checked = false);
    }

    pub fn checked(&self) -> bool {
        self.inner.state.lock().unwrap().checked
    }

    /// Hides the menu item in the native menu; registry state is untouched.
    pub fn hide(&self) {
        self.shared.set_visible(&self.inner, false);
    }

    /// Shows a previously hidden menu item.
    pub fn show(&self) {
        self.shared.set_visible(&self.inner, true);
    }

    /// Blocks until the item is clicked.
    ///
    /// At most one notification is buffered; clicks arriving while one is
    /// already pending are dropped, so rapid clicks coalesce.
    pub fn clicked(&self) {
        let rx = self.inner.clicked_rx.lock().unwrap();
        let _ = rx.recv();
    }

    /// Drains a pending click notification without blocking. Returns true
    /// when one was pending.
    pub fn try_clicked(&self) -> bool {
        self.inner.clicked_rx.lock().unwrap().try_recv().is_ok()
    }
}
