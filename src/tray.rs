use crate::flags::ItemFlags;
use crate::item::{ItemInner, ItemState, MenuItem};
use crate::latch::Latch;
use crate::native::{EventSink, NativeTray};
use log::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

/// Lifecycle hook passed to [`Tray::run`].
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// A tray icon's menu: the registry of its items and the bridge between the
/// native event loop and application threads.
///
/// `Tray` is a cheap handle; clones address the same registry. Every method
/// except [`run`](Tray::run) can be called from any thread, before or after
/// the native loop has started. The operating system still shows at most one
/// tray icon per process.
#[derive(Clone)]
pub struct Tray {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    backend: Box<dyn NativeTray>,
    items: RwLock<HashMap<u32, Arc<ItemInner>>>,
    next_id: AtomicU32,
    started: Latch,
    quit_requested: Latch,
    loop_thread: Mutex<Option<ThreadId>>,
    ready_signal: Mutex<Option<Sender<()>>>,
    exit_hook: Mutex<Option<Callback>>,
}

/// The sink handed to the backend's event loop.
struct Dispatcher {
    shared: Arc<Shared>,
}

impl Tray {
    pub fn new(backend: impl NativeTray + 'static) -> Tray {
        Tray {
            shared: Arc::new(Shared {
                backend: Box::new(backend),
                items: RwLock::new(HashMap::new()),
                next_id: AtomicU32::new(1),
                started: Latch::new(),
                quit_requested: Latch::new(),
                loop_thread: Mutex::new(None),
                ready_signal: Mutex::new(None),
                exit_hook: Mutex::new(None),
            }),
        }
    }

    /// Adds a menu item with the given title and tooltip.
    ///
    /// Conflicting flags are normalized: a separator drops every other flag,
    /// and `CHECKED` is cleared unless `CHECKABLE` is also set.
    pub fn add_menu_item(&self, title: &str, tooltip: &str, flags: ItemFlags) -> MenuItem {
        let flags = flags.normalized();
        let inner = ItemInner::new(self.shared.next_id(), None, title, tooltip, flags, false, false);
        self.shared.register(inner)
    }

    /// Adds a submenu and returns the item that opens it; populate it with
    /// [`MenuItem::add_submenu_item`]. Submenus added after the loop has
    /// started are pushed into the visible tray immediately.
    pub fn add_submenu(&self, title: &str) -> MenuItem {
        let menu_id = self.shared.next_id();
        self.shared.backend.create_submenu(menu_id);

        let inner = ItemInner::new(
            self.shared.next_id(),
            Some(menu_id),
            title,
            "",
            ItemFlags::NONE,
            true,
            false,
        );
        if self.shared.started.is_set() {
            self.shared.backend.add_submenu_to_tray(&inner.snapshot());
        }
        self.shared.register(inner)
    }

    /// Adds a separator bar to the menu.
    pub fn add_separator(&self) {
        let id = self.shared.next_id();
        self.shared.backend.add_separator(id);
    }

    /// Enters the native event loop and blocks until [`quit`](Tray::quit).
    ///
    /// Must be called once, from the thread the platform designates to own
    /// the loop (the main thread, at the very beginning of `main`). A second
    /// call is logged and refused. `on_ready` runs on its own thread once the
    /// loop is up, so it can create menu items without blocking the loop;
    /// `on_exit` runs inside the shutdown path, before `run` returns.
    pub fn run(&self, on_ready: Option<Callback>, on_exit: Option<Callback>) {
        if !self.shared.started.transition() {
            let owner = *self.shared.loop_thread.lock().unwrap();
            warn!(
                "run() called again from {:?}, but the loop is owned by {:?}",
                thread::current().id(),
                owner
            );
            return;
        }
        *self.shared.loop_thread.lock().unwrap() = Some(thread::current().id());

        if let Some(on_ready) = on_ready {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                if rx.recv().is_ok() {
                    on_ready();
                }
            });
            *self.shared.ready_signal.lock().unwrap() = Some(tx);
        }
        *self.shared.exit_hook.lock().unwrap() = on_exit;

        let events: Arc<dyn EventSink> = Arc::new(Dispatcher {
            shared: Arc::clone(&self.shared),
        });
        self.shared.backend.native_loop(events);

        // The hook slot is take-once: a no-op when the backend already fired
        // exiting() on its shutdown path.
        self.shared.run_exit_hook();
    }

    /// Requests shutdown of the native loop. Idempotent and thread-safe;
    /// concurrent callers collapse into a single native shutdown call. A
    /// no-op until the loop has started.
    pub fn quit(&self) {
        if self.shared.started.is_set() && self.shared.quit_requested.transition() {
            self.shared.backend.quit();
        }
    }
}

/// `Tray` doubles as the callback surface for native layers that hold a
/// handle to it directly; tests use it to simulate clicks.
impl EventSink for Tray {
    fn ready(&self) {
        self.shared.signal_ready();
    }

    fn menu_item_selected(&self, id: u32) {
        self.shared.dispatch_selected(id);
    }

    fn exiting(&self) {
        self.shared.run_exit_hook();
    }
}

impl EventSink for Dispatcher {
    fn ready(&self) {
        self.shared.signal_ready();
    }

    fn menu_item_selected(&self, id: u32) {
        self.shared.dispatch_selected(id);
    }

    fn exiting(&self) {
        self.shared.run_exit_hook();
    }
}

impl Shared {
    pub(crate) fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a freshly built item and pushes it to the native layer. The
    /// map entry exists before the native layer can ever report a click for
    /// the id.
    pub(crate) fn register(self: &Arc<Self>, inner: Arc<ItemInner>) -> MenuItem {
        let mut items = self.items.write().unwrap();
        items.insert(inner.id, Arc::clone(&inner));
        self.backend.add_or_update_menu_item(&inner.snapshot());
        drop(items);

        MenuItem {
            inner,
            shared: Arc::clone(self),
        }
    }

    /// Applies a state mutation and forwards the result to the native layer.
    /// The write lock is held across the native call so updates to one item
    /// reach the backend in invocation order.
    pub(crate) fn update(&self, inner: &Arc<ItemInner>, mutate: impl FnOnce(&mut ItemState)) {
        let items = self.items.write().unwrap();
        let snapshot = {
            let mut state = inner.state.lock().unwrap();
            mutate(&mut state);
            inner.snapshot_with(&state)
        };
        self.backend.add_or_update_menu_item(&snapshot);
        drop(items);
    }

    pub(crate) fn set_visible(&self, inner: &Arc<ItemInner>, visible: bool) {
        let items = self.items.write().unwrap();
        let snapshot = inner.snapshot();
        if visible {
            self.backend.show_menu_item(&snapshot);
        } else {
            self.backend.hide_menu_item(&snapshot);
        }
        drop(items);
    }

    /// Non-blocking delivery: a click lands in the item's single slot or is
    /// dropped, so the native loop is never stalled by a slow consumer.
    fn dispatch_selected(&self, id: u32) {
        let item = self.items.read().unwrap().get(&id).cloned();
        match item {
            Some(item) => {
                let _ = item.clicked_tx.try_send(());
            }
            // Stale ids happen benignly during teardown races.
            None => warn!("ignoring selection of unknown menu item {}", id),
        }
    }

    fn signal_ready(&self) {
        if let Some(tx) = self.ready_signal.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }

    fn run_exit_hook(&self) {
        let hook = self.exit_hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::headless::{HeadlessBackend, NativeOp};
    use std::time::Duration;

    fn wait_for_start(tray: &Tray) {
        for _ in 0..500 {
            if tray.shared.started.is_set() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("loop never started");
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let tray = Tray::new(HeadlessBackend::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tray = tray.clone();
                thread::spawn(move || {
                    let mut ids = Vec::new();
                    for n in 0..25 {
                        let title = format!("item {}", n);
                        ids.push(tray.add_menu_item(&title, "", ItemFlags::NONE).id());
                    }
                    ids
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            // Issuance order within one caller is strictly increasing.
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            all.extend(ids);
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 8 * 25);
    }

    #[test]
    fn separator_flag_dominates_at_creation() {
        let tray = Tray::new(HeadlessBackend::new());
        let flags = ItemFlags::SEPARATOR | ItemFlags::CHECKABLE | ItemFlags::CHECKED;
        let item = tray.add_menu_item("----", "", flags);
        assert!(item.is_separator());
        assert!(!item.checkable());
        assert!(!item.checked());
    }

    #[test]
    fn checked_without_checkable_is_cleared() {
        let tray = Tray::new(HeadlessBackend::new());
        let item = tray.add_menu_item("a", "", ItemFlags::CHECKED);
        assert!(!item.checked());

        let item = tray.add_menu_item("b", "", ItemFlags::CHECKABLE | ItemFlags::CHECKED);
        assert!(item.checked());
    }

    #[test]
    fn enable_disable_updates_native_layer_each_time() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        let item = tray.add_menu_item("toggle", "", ItemFlags::NONE);
        item.enable();
        item.disable();
        item.enable();
        assert!(!item.disabled());

        let updates = handle
            .ops()
            .into_iter()
            .filter(|op| *op == NativeOp::Upsert(item.id()))
            .count();
        // One for creation, one per enable/disable call.
        assert_eq!(updates, 4);
    }

    #[test]
    fn check_uncheck_roundtrip() {
        let tray = Tray::new(HeadlessBackend::new());
        let item = tray.add_menu_item("checkable", "", ItemFlags::CHECKABLE);
        assert!(!item.checked());
        item.check();
        assert!(item.checked());
        item.uncheck();
        assert!(!item.checked());
    }

    #[test]
    fn title_and_tooltip_updates_reach_the_native_layer() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        let item = tray.add_menu_item("before", "", ItemFlags::NONE);
        item.set_title("after");
        item.set_tooltip("hover");

        let updates = handle
            .ops()
            .into_iter()
            .filter(|op| *op == NativeOp::Upsert(item.id()))
            .count();
        assert_eq!(updates, 3);
    }

    #[test]
    fn hide_and_show_keep_the_registry_entry() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        let item = tray.add_menu_item("blinking", "", ItemFlags::NONE);
        item.hide();
        item.show();

        let ops = handle.ops();
        assert!(ops.contains(&NativeOp::Hide(item.id())));
        assert!(ops.contains(&NativeOp::Show(item.id())));

        // Still registered: a click after hide/show lands as usual.
        tray.menu_item_selected(item.id());
        assert!(item.try_clicked());
    }

    #[test]
    fn separator_allocates_an_id_slot() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        tray.add_separator();
        let first = tray.add_menu_item("after", "", ItemFlags::NONE);

        assert_eq!(handle.ops()[0], NativeOp::Separator(1));
        assert_eq!(first.id(), 2);
    }

    #[test]
    fn rapid_clicks_coalesce_into_one_notification() {
        let tray = Tray::new(HeadlessBackend::new());
        let item = tray.add_menu_item("clickme", "", ItemFlags::NONE);

        for _ in 0..5 {
            tray.menu_item_selected(item.id());
        }
        assert!(item.try_clicked());
        assert!(!item.try_clicked());
    }

    #[test]
    fn unknown_id_is_ignored() {
        let tray = Tray::new(HeadlessBackend::new());
        tray.menu_item_selected(4242);
    }

    #[test]
    fn each_leaf_gets_its_own_notification() {
        let tray = Tray::new(HeadlessBackend::new());

        let top: Vec<_> = ["one", "two", "three"]
            .iter()
            .map(|title| tray.add_menu_item(title, "", ItemFlags::NONE))
            .collect();
        let submenu = tray.add_submenu("nested");
        let leaves = vec![
            submenu.add_submenu_item("start", "", ItemFlags::NONE),
            submenu.add_submenu_item("stop", "", ItemFlags::NONE),
        ];

        let all: Vec<_> = top.iter().chain(leaves.iter()).collect();
        for item in &all {
            tray.menu_item_selected(item.id());
        }
        for item in &all {
            assert!(item.try_clicked(), "missing click for {}", item.id());
            assert!(!item.try_clicked(), "extra click for {}", item.id());
        }
        assert!(!submenu.try_clicked());
    }

    #[test]
    fn submenu_items_inherit_the_parent_menu() {
        let tray = Tray::new(HeadlessBackend::new());
        let submenu = tray.add_submenu("parent");
        let child = submenu.add_submenu_item("child", "", ItemFlags::NONE);
        assert!(submenu.is_submenu());
        assert!(!submenu.is_submenu_item());
        assert!(child.is_submenu_item());
    }

    #[test]
    fn run_with_no_hooks_starts_and_quits() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        let worker = {
            let tray = tray.clone();
            thread::spawn(move || tray.run(None, None))
        };
        wait_for_start(&tray);
        tray.quit();
        worker.join().unwrap();

        let quits = handle
            .ops()
            .into_iter()
            .filter(|op| *op == NativeOp::Quit)
            .count();
        assert_eq!(quits, 1);
    }

    #[test]
    fn concurrent_quit_shuts_down_once() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = {
            let tray = tray.clone();
            thread::spawn(move || {
                tray.run(
                    Some(Box::new(move || {
                        let _ = ready_tx.send(());
                    })),
                    None,
                )
            })
        };
        ready_rx.recv().unwrap();

        let quitters: Vec<_> = (0..10)
            .map(|_| {
                let tray = tray.clone();
                thread::spawn(move || tray.quit())
            })
            .collect();
        for quitter in quitters {
            quitter.join().unwrap();
        }
        worker.join().unwrap();

        let quits = handle
            .ops()
            .into_iter()
            .filter(|op| *op == NativeOp::Quit)
            .count();
        assert_eq!(quits, 1);
    }

    #[test]
    fn quit_before_run_is_a_no_op() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        tray.quit();
        assert!(handle.ops().is_empty());
    }

    #[test]
    fn second_run_is_refused() {
        let backend = HeadlessBackend::new();
        let tray = Tray::new(backend);

        let worker = {
            let tray = tray.clone();
            thread::spawn(move || tray.run(None, None))
        };
        wait_for_start(&tray);

        // Returns immediately instead of entering a second loop.
        tray.run(None, None);

        tray.quit();
        worker.join().unwrap();
    }

    #[test]
    fn exit_hook_runs_before_run_returns() {
        let backend = HeadlessBackend::new();
        let tray = Tray::new(backend);

        let (exit_tx, exit_rx) = mpsc::channel();
        let worker = {
            let tray = tray.clone();
            thread::spawn(move || {
                tray.run(
                    None,
                    Some(Box::new(move || {
                        let _ = exit_tx.send(());
                    })),
                );
                // By the time run() returns the hook must have fired.
                exit_rx.try_recv().unwrap();
            })
        };
        wait_for_start(&tray);
        tray.quit();
        worker.join().unwrap();
    }

    #[test]
    fn dynamic_submenu_renders_into_the_running_tray() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();
        let tray = Tray::new(backend);

        let early = tray.add_submenu("early");
        assert!(!handle
            .ops()
            .into_iter()
            .any(|op| op == NativeOp::AddSubmenuToTray(early.id())));

        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = {
            let tray = tray.clone();
            thread::spawn(move || {
                tray.run(
                    Some(Box::new(move || {
                        let _ = ready_tx.send(());
                    })),
                    None,
                )
            })
        };
        ready_rx.recv().unwrap();

        let late = tray.add_submenu("late");
        assert!(handle
            .ops()
            .into_iter()
            .any(|op| op == NativeOp::AddSubmenuToTray(late.id())));

        tray.quit();
        worker.join().unwrap();
    }
}
