//! A native layer without a windowing system.
//!
//! Records every operation the registry issues and replays externally
//! injected selections through the event sink, on the loop thread, the same
//! way a real platform layer dispatches its callbacks. Used by the test
//! suite and by scripted demo runs; also a reference for what a backend has
//! to do.

use crate::item::ItemSnapshot;
use crate::native::{EventSink, NativeTray};
use log::{debug, warn};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// One recorded native-layer operation, in issuance order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeOp {
    CreateSubmenu(u32),
    AddSubmenuToTray(u32),
    Upsert(u32),
    Separator(u32),
    Hide(u32),
    Show(u32),
    Quit,
}

enum Cmd {
    Select(u32),
    Quit,
}

pub struct HeadlessBackend {
    ops: Arc<Mutex<Vec<NativeOp>>>,
    cmd_tx: Sender<Cmd>,
    // Taken by the first native_loop call.
    cmd_rx: Mutex<Option<Receiver<Cmd>>>,
}

/// Detached control over a [`HeadlessBackend`]: inject selections and read
/// the recorded operations from outside the loop.
#[derive(Clone)]
pub struct HeadlessHandle {
    ops: Arc<Mutex<Vec<NativeOp>>>,
    cmd_tx: Sender<Cmd>,
}

impl HeadlessBackend {
    pub fn new() -> HeadlessBackend {
        let (cmd_tx, cmd_rx) = channel();
        HeadlessBackend {
            ops: Arc::new(Mutex::new(Vec::new())),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
        }
    }

    /// A handle to keep after the backend has been handed to the tray.
    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle {
            ops: Arc::clone(&self.ops),
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    fn record(&self, op: NativeOp) {
        debug!("native op: {:?}", op);
        self.ops.lock().unwrap().push(op);
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHandle {
    /// Simulates the user activating the item with the given id. Selections
    /// injected before the loop runs are buffered and delivered after it is
    /// up.
    pub fn select(&self, id: u32) {
        let _ = self.cmd_tx.send(Cmd::Select(id));
    }

    /// Every native operation recorded so far, in issuance order.
    pub fn ops(&self) -> Vec<NativeOp> {
        self.ops.lock().unwrap().clone()
    }
}

impl NativeTray for HeadlessBackend {
    fn native_loop(&self, events: Arc<dyn EventSink>) {
        let rx = match self.cmd_rx.lock().unwrap().take() {
            Some(rx) => rx,
            None => {
                warn!("headless loop entered twice");
                return;
            }
        };

        events.ready();
        while let Ok(cmd) = rx.recv() {
            match cmd {
                Cmd::Select(id) => events.menu_item_selected(id),
                Cmd::Quit => break,
            }
        }
        events.exiting();
    }

    fn quit(&self) {
        self.record(NativeOp::Quit);
        let _ = self.cmd_tx.send(Cmd::Quit);
    }

    fn create_submenu(&self, menu_id: u32) {
        self.record(NativeOp::CreateSubmenu(menu_id));
    }

    fn add_submenu_to_tray(&self, item: &ItemSnapshot) {
        self.record(NativeOp::AddSubmenuToTray(item.id));
    }

    fn add_or_update_menu_item(&self, item: &ItemSnapshot) {
        self.record(NativeOp::Upsert(item.id));
    }

    fn add_separator(&self, id: u32) {
        self.record(NativeOp::Separator(id));
    }

    fn hide_menu_item(&self, item: &ItemSnapshot) {
        self.record(NativeOp::Hide(item.id));
    }

    fn show_menu_item(&self, item: &ItemSnapshot) {
        self.record(NativeOp::Show(item.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        log: Mutex<Vec<String>>,
    }

    impl EventSink for RecordingSink {
        fn ready(&self) {
            self.log.lock().unwrap().push("ready".to_owned());
        }

        fn menu_item_selected(&self, id: u32) {
            self.log.lock().unwrap().push(format!("select {}", id));
        }

        fn exiting(&self) {
            self.log.lock().unwrap().push("exiting".to_owned());
        }
    }

    fn snapshot(id: u32) -> ItemSnapshot {
        ItemSnapshot {
            id,
            menu_id: None,
            title: String::new(),
            tooltip: String::new(),
            disabled: false,
            checked: false,
            checkable: false,
            separator: false,
            submenu: false,
            submenu_item: false,
        }
    }

    #[test]
    fn records_ops_in_issuance_order() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();

        backend.create_submenu(1);
        backend.add_or_update_menu_item(&snapshot(2));
        backend.add_separator(3);
        backend.hide_menu_item(&snapshot(2));
        backend.show_menu_item(&snapshot(2));

        assert_eq!(
            handle.ops(),
            vec![
                NativeOp::CreateSubmenu(1),
                NativeOp::Upsert(2),
                NativeOp::Separator(3),
                NativeOp::Hide(2),
                NativeOp::Show(2),
            ]
        );
    }

    #[test]
    fn buffered_selections_replay_after_ready() {
        let backend = HeadlessBackend::new();
        let handle = backend.handle();

        // Injected before the loop runs.
        handle.select(7);
        handle.select(9);
        backend.quit();

        let sink = Arc::new(RecordingSink::default());
        backend.native_loop(Arc::clone(&sink) as Arc<dyn EventSink>);

        let log = sink.log.lock().unwrap().clone();
        assert_eq!(log, vec!["ready", "select 7", "select 9", "exiting"]);
    }

    #[test]
    fn second_loop_entry_is_refused() {
        let backend = HeadlessBackend::new();
        backend.quit();

        let sink = Arc::new(RecordingSink::default());
        backend.native_loop(Arc::clone(&sink) as Arc<dyn EventSink>);
        backend.native_loop(Arc::clone(&sink) as Arc<dyn EventSink>);

        let log = sink.log.lock().unwrap().clone();
        // Only one ready/exiting pair.
        assert_eq!(log, vec!["ready", "exiting"]);
    }
}
