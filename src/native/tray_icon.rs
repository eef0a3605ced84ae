//! Rendering backend on top of `tray-icon`/`muda` and the GTK main loop.
//!
//! Registry calls arrive on arbitrary threads and are queued as commands;
//! a forwarding thread hands them to the GTK main thread, where the menu is
//! actually mutated. Commands issued before the loop starts stay buffered
//! until it runs.

use crate::item::ItemSnapshot;
use crate::native::{EventSink, NativeTray};
use gtk::glib;
use gtk::glib::Priority;
use log::{error, warn};
use muda::{CheckMenuItem, IsMenuItem, PredefinedMenuItem, Submenu};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tray_icon::{
    menu::{Menu, MenuEvent},
    Icon, TrayIconBuilder,
};

/// Appearance of the tray icon itself, fixed at backend construction.
#[derive(Clone, Debug, Default)]
pub struct TrayConfig {
    pub tooltip: String,
    /// Image file decoded for the icon; a solid placeholder when absent or
    /// unreadable.
    pub icon_path: Option<PathBuf>,
}

enum Cmd {
    Upsert(ItemSnapshot),
    CreateSubmenu(u32),
    AddSubmenuToTray(ItemSnapshot),
    Separator(u32),
    Hide(ItemSnapshot),
    Show(ItemSnapshot),
    Quit,
}

enum Msg {
    Selected(MenuEvent),
    Cmd(Cmd),
}

pub struct TrayIconBackend {
    config: TrayConfig,
    cmd_tx: Sender<Cmd>,
    // Taken by the first native_loop call.
    cmd_rx: Mutex<Option<Receiver<Cmd>>>,
}

impl TrayIconBackend {
    pub fn new(config: TrayConfig) -> TrayIconBackend {
        let (cmd_tx, cmd_rx) = channel();
        TrayIconBackend {
            config,
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
        }
    }

    fn send(&self, cmd: Cmd) {
        let _ = self.cmd_tx.send(cmd);
    }
}

impl NativeTray for TrayIconBackend {
    fn native_loop(&self, events: Arc<dyn EventSink>) {
        let cmd_rx = match self.cmd_rx.lock().unwrap().take() {
            Some(rx) => rx,
            None => {
                warn!("tray-icon loop entered twice");
                return;
            }
        };

        if gtk::init().is_err() {
            error!("failed to initialize GTK");
            return;
        }

        let root = Menu::new();
        let _tray_icon = match TrayIconBuilder::new()
            .with_icon(load_icon(self.config.icon_path.as_deref()))
            .with_tooltip(&self.config.tooltip)
            .with_menu(Box::new(root.clone()))
            .build()
        {
            Ok(tray_icon) => tray_icon,
            Err(e) => {
                error!("failed to create tray icon: {}", e);
                return;
            }
        };

        // Channel into the GTK main thread
        let (tx, rx_gtk) = glib::MainContext::channel(Priority::DEFAULT);

        // Forward click events to the GTK main thread
        let menu_events = MenuEvent::receiver();
        let cloned_tx = tx.clone();
        thread::spawn(move || {
            while let Ok(event) = menu_events.recv() {
                let _ = cloned_tx.send(Msg::Selected(event));
            }
        });

        // Forward registry commands to the GTK main thread
        let cloned_tx = tx.clone();
        thread::spawn(move || {
            while let Ok(cmd) = cmd_rx.recv() {
                let _ = cloned_tx.send(Msg::Cmd(cmd));
            }
        });

        let mut menus = MenuTree::new(root);
        let sink = Arc::clone(&events);
        rx_gtk.attach(None, move |msg| {
            match msg {
                Msg::Selected(event) => match event.id.0.parse::<u32>() {
                    Ok(id) => sink.menu_item_selected(id),
                    Err(_) => warn!("menu event with foreign id {:?}", event.id),
                },
                Msg::Cmd(Cmd::Quit) => gtk::main_quit(),
                Msg::Cmd(cmd) => menus.apply(cmd),
            }
            glib::ControlFlow::Continue
        });

        events.ready();
        gtk::main();
        events.exiting();
    }

    fn quit(&self) {
        self.send(Cmd::Quit);
    }

    fn create_submenu(&self, menu_id: u32) {
        self.send(Cmd::CreateSubmenu(menu_id));
    }

    fn add_submenu_to_tray(&self, item: &ItemSnapshot) {
        self.send(Cmd::AddSubmenuToTray(item.clone()));
    }

    fn add_or_update_menu_item(&self, item: &ItemSnapshot) {
        self.send(Cmd::Upsert(item.clone()));
    }

    fn add_separator(&self, id: u32) {
        self.send(Cmd::Separator(id));
    }

    fn hide_menu_item(&self, item: &ItemSnapshot) {
        self.send(Cmd::Hide(item.clone()));
    }

    fn show_menu_item(&self, item: &ItemSnapshot) {
        self.send(Cmd::Show(item.clone()));
    }
}

enum Entry {
    Plain(muda::MenuItem),
    Check(CheckMenuItem),
    Separator(PredefinedMenuItem),
}

impl Entry {
    fn as_menu_item(&self) -> &dyn IsMenuItem {
        match self {
            Entry::Plain(item) => item,
            Entry::Check(item) => item,
            Entry::Separator(item) => item,
        }
    }
}

/// Menu state owned by the GTK main thread. Registry ids are carried as the
/// `muda` id strings, so click events map straight back.
struct MenuTree {
    root: Menu,
    entries: HashMap<u32, Entry>,
    submenus: HashMap<u32, Submenu>,
    attached: HashSet<u32>,
    hidden: HashSet<u32>,
}

impl MenuTree {
    fn new(root: Menu) -> MenuTree {
        MenuTree {
            root,
            entries: HashMap::new(),
            submenus: HashMap::new(),
            attached: HashSet::new(),
            hidden: HashSet::new(),
        }
    }

    fn apply(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::CreateSubmenu(menu_id) => {
                self.submenus
                    .entry(menu_id)
                    .or_insert_with(|| Submenu::with_id(menu_id.to_string(), "", true));
            }
            Cmd::AddSubmenuToTray(item) | Cmd::Upsert(item) if item.submenu => {
                self.upsert_submenu(&item);
            }
            Cmd::AddSubmenuToTray(item) | Cmd::Upsert(item) => self.upsert_entry(&item),
            Cmd::Separator(id) => {
                let separator = PredefinedMenuItem::separator();
                if let Err(e) = self.root.append(&separator) {
                    warn!("failed to append separator {}: {}", id, e);
                }
                self.entries.insert(id, Entry::Separator(separator));
            }
            Cmd::Hide(item) => self.set_visible(&item, false),
            Cmd::Show(item) => self.set_visible(&item, true),
            Cmd::Quit => gtk::main_quit(),
        }
    }

    /// The submenu container doubles as the rendered item that opens it.
    fn upsert_submenu(&mut self, item: &ItemSnapshot) {
        let menu_id = match item.menu_id {
            Some(menu_id) => menu_id,
            None => {
                warn!("submenu item {} without a menu id", item.id);
                return;
            }
        };
        let submenu = self
            .submenus
            .entry(menu_id)
            .or_insert_with(|| Submenu::with_id(menu_id.to_string(), "", true))
            .clone();
        submenu.set_text(&item.title);
        submenu.set_enabled(!item.disabled);
        if self.attached.insert(menu_id) {
            if let Err(e) = self.root.append(&submenu) {
                warn!("failed to attach submenu {}: {}", menu_id, e);
            }
        }
    }

    fn upsert_entry(&mut self, item: &ItemSnapshot) {
        match self.entries.get(&item.id) {
            Some(Entry::Plain(existing)) => {
                existing.set_text(&item.title);
                existing.set_enabled(!item.disabled);
            }
            Some(Entry::Check(existing)) => {
                existing.set_text(&item.title);
                existing.set_enabled(!item.disabled);
                existing.set_checked(item.checked);
            }
            Some(Entry::Separator(_)) => {}
            None => {
                let entry = if item.separator {
                    Entry::Separator(PredefinedMenuItem::separator())
                } else if item.checkable {
                    Entry::Check(CheckMenuItem::with_id(
                        item.id.to_string(),
                        &item.title,
                        !item.disabled,
                        item.checked,
                        None,
                    ))
                } else {
                    Entry::Plain(muda::MenuItem::with_id(
                        item.id.to_string(),
                        &item.title,
                        !item.disabled,
                        None,
                    ))
                };
                self.append(item, entry.as_menu_item());
                self.entries.insert(item.id, entry);
            }
        }
    }

    fn append(&self, item: &ItemSnapshot, entry: &dyn IsMenuItem) {
        let result = match item.menu_id.and_then(|menu_id| self.submenus.get(&menu_id)) {
            Some(submenu) if item.submenu_item => submenu.append(entry),
            None if item.submenu_item => {
                warn!("submenu item {} before its container; rendering top-level", item.id);
                self.root.append(entry)
            }
            _ => self.root.append(entry),
        };
        if let Err(e) = result {
            warn!("failed to append menu entry {}: {}", item.id, e);
        }
    }

    fn set_visible(&mut self, item: &ItemSnapshot, visible: bool) {
        // Hiding the item that opens a submenu detaches the whole submenu.
        if item.submenu {
            let submenu = match item.menu_id.and_then(|menu_id| self.submenus.get(&menu_id)) {
                Some(submenu) => submenu,
                None => return,
            };
            let menu_id = item.menu_id.unwrap_or_default();
            let result = if visible {
                if !self.attached.insert(menu_id) {
                    return;
                }
                self.root.append(submenu)
            } else {
                if !self.attached.remove(&menu_id) {
                    return;
                }
                self.root.remove(submenu)
            };
            if let Err(e) = result {
                warn!("failed to toggle submenu {}: {}", menu_id, e);
            }
            return;
        }

        let entry = match self.entries.get(&item.id) {
            Some(entry) => entry,
            None => {
                warn!("visibility change for unknown menu entry {}", item.id);
                return;
            }
        };
        // A re-shown entry lands at the end of its menu.
        let result = if visible {
            if !self.hidden.remove(&item.id) {
                return;
            }
            match item.menu_id.and_then(|menu_id| self.submenus.get(&menu_id)) {
                Some(submenu) if item.submenu_item => submenu.append(entry.as_menu_item()),
                _ => self.root.append(entry.as_menu_item()),
            }
        } else {
            if !self.hidden.insert(item.id) {
                return;
            }
            match item.menu_id.and_then(|menu_id| self.submenus.get(&menu_id)) {
                Some(submenu) if item.submenu_item => submenu.remove(entry.as_menu_item()),
                _ => self.root.remove(entry.as_menu_item()),
            }
        };
        if let Err(e) = result {
            warn!("failed to toggle menu entry {}: {}", item.id, e);
        }
    }
}

fn load_icon(path: Option<&Path>) -> Icon {
    if let Some(path) = path {
        match load_icon_file(path) {
            Ok(icon) => return icon,
            Err(e) => warn!("failed to load icon {}: {}", path.display(), e),
        }
    }
    // 16x16 solid placeholder
    Icon::from_rgba(vec![0x80; 16 * 16 * 4], 16, 16).expect("Failed to create fallback icon")
}

fn load_icon_file(path: &Path) -> io::Result<Icon> {
    let data = fs::read(path)?;

    let img = image::load_from_memory(&data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Icon::from_rgba(rgba.into_raw(), width, height)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
