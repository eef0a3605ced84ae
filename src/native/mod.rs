//! The boundary toward the platform layer that actually renders the tray.
//!
//! The registry drives a [`NativeTray`] implementation; the implementation
//! reports user activity back through an [`EventSink`]. The crate ships two
//! backends: [`HeadlessBackend`](headless::HeadlessBackend) for tests and
//! scripted runs, and (with the `gui` feature) a `tray-icon`/`muda` backend
//! on top of the GTK main loop.

pub mod headless;
#[cfg(feature = "gui")]
pub mod tray_icon;

use crate::item::ItemSnapshot;
use std::sync::Arc;

/// Operations a native rendering layer must support.
///
/// All methods except `native_loop` may be invoked from any thread, and may
/// be invoked before the loop has started — implementations buffer such
/// calls and apply them once the loop runs. Item-carrying methods are called
/// while the registry lock is held: implementations must not call back into
/// the registry synchronously from them.
pub trait NativeTray: Send + Sync {
    /// Runs the platform event loop until shutdown is requested.
    ///
    /// Must invoke `events.ready()` once the loop is up,
    /// `events.menu_item_selected(id)` for every activation, and
    /// `events.exiting()` on the shutdown path before returning.
    fn native_loop(&self, events: Arc<dyn EventSink>);

    /// Requests shutdown of the loop. Called at most once per process.
    fn quit(&self);

    /// Instantiates an empty submenu container with the given id.
    fn create_submenu(&self, menu_id: u32);

    /// Renders a submenu item into the already-visible tray (submenus added
    /// after startup).
    fn add_submenu_to_tray(&self, item: &ItemSnapshot);

    /// Creates or refreshes a rendered menu item from its current state.
    fn add_or_update_menu_item(&self, item: &ItemSnapshot);

    /// Renders a separator at the given id slot.
    fn add_separator(&self, id: u32);

    fn hide_menu_item(&self, item: &ItemSnapshot);

    fn show_menu_item(&self, item: &ItemSnapshot);
}

/// Callback surface the native layer drives.
pub trait EventSink: Send + Sync {
    /// The native loop is up and the menu is being rendered.
    fn ready(&self);

    /// A rendered item with the given id was activated by the user.
    fn menu_item_selected(&self, id: u32);

    /// The loop is shutting down; runs the exit hook.
    fn exiting(&self);
}
