//! # traymenu
//!
//! Place an icon and menu in the notification area.
//!
//! The [`Tray`] registry and its [`MenuItem`]s can be used from any thread
//! except [`Tray::run`], which must be called at the very beginning of
//! `main()` on the thread that owns the platform event loop. Each item
//! carries a single-slot click channel: consumers block on
//! [`MenuItem::clicked`], and rapid clicks coalesce instead of queueing.
//!
//! Rendering is pluggable through the [`native::NativeTray`] trait. The
//! `gui` feature enables the `tray-icon`/`muda` backend on top of the GTK
//! main loop; [`native::headless::HeadlessBackend`] runs the same protocol
//! without a windowing system.

mod flags;
mod item;
mod latch;
pub mod native;
mod tray;

pub use flags::ItemFlags;
pub use item::{ItemSnapshot, MenuItem};
pub use tray::{Callback, Tray};
