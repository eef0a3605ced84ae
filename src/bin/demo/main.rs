//! # traymenu-demo
//!
//! Sample application: registers a menu of services from a TOML config and
//! prints every click. `--simulate` drives the same menu through the
//! headless backend so the whole flow runs without a system tray.

mod config;

use anyhow::Result;
use clap::Parser;
use config::DemoConfig;
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use traymenu::native::headless::HeadlessBackend;
use traymenu::{ItemFlags, MenuItem, Tray};

#[derive(Parser)]
#[command(name = "traymenu-demo")]
struct Cli {
    /// Path to the TOML config file
    config: PathBuf,

    /// Validate the config file and exit
    #[arg(long)]
    check_only: bool,

    /// Drive the menu with a scripted headless backend instead of the
    /// system tray
    #[arg(long)]
    simulate: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .try_init()
        .expect("Failed to init logger");

    let cli = Cli::parse();
    let config = config::load(&cli.config)?;
    info!("using config {:?}", config);

    if cli.check_only {
        println!("config ok");
        return Ok(());
    }

    if cli.simulate {
        run_simulated(config)
    } else {
        run_native(config)
    }
}

struct ServiceMenu {
    start: MenuItem,
    stop: MenuItem,
}

/// Registers the demo menu: Exit, a separator, a plain item, a disabled
/// submenu, and one Start/Stop submenu per configured service. Consumers
/// print each click and report it on `done_tx`; Exit quits the loop.
fn build_menu(tray: &Tray, config: &DemoConfig, done_tx: &Sender<String>) -> (MenuItem, Vec<ServiceMenu>) {
    let exit = tray.add_menu_item("Exit", "", ItemFlags::NONE);
    tray.add_separator();
    tray.add_menu_item("Enabled", "Enabled", ItemFlags::NONE);

    let disabled = tray.add_submenu("Disabled");
    disabled.disable();

    let mut services = Vec::new();
    for name in &config.services {
        let submenu = tray.add_submenu(name);
        let start = submenu.add_submenu_item("Start", "", ItemFlags::NONE);
        let stop = submenu.add_submenu_item("Stop", "", ItemFlags::NONE);
        spawn_consumer(&start, "start", name, done_tx);
        spawn_consumer(&stop, "stop", name, done_tx);
        services.push(ServiceMenu { start, stop });
    }

    let exit_item = exit.clone();
    let exit_tray = tray.clone();
    thread::spawn(move || {
        exit_item.clicked();
        exit_tray.quit();
    });

    (exit, services)
}

fn spawn_consumer(item: &MenuItem, action: &str, service: &str, done_tx: &Sender<String>) {
    let item = item.clone();
    let action = action.to_owned();
    let service = service.to_owned();
    let done_tx = done_tx.clone();
    thread::spawn(move || loop {
        item.clicked();
        println!("{} {}", action, service);
        let _ = done_tx.send(format!("{} {}", action, service));
    });
}

fn run_simulated(config: DemoConfig) -> Result<()> {
    let backend = HeadlessBackend::new();
    let driver = backend.handle();
    let tray = Tray::new(backend);

    let (done_tx, done_rx) = mpsc::channel();
    let (exit, services) = build_menu(&tray, &config, &done_tx);

    let leaf_ids: Vec<u32> = services
        .iter()
        .flat_map(|s| [s.start.id(), s.stop.id()])
        .collect();
    let exit_id = exit.id();
    let (up_tx, up_rx) = mpsc::channel();
    thread::spawn(move || {
        // Drive clicks only once the loop is up, so Exit cannot outrun run().
        if up_rx.recv().is_err() {
            return;
        }
        for id in leaf_ids {
            driver.select(id);
            if done_rx.recv_timeout(Duration::from_secs(2)).is_err() {
                warn!("no reaction to selecting item {}", id);
            }
        }
        driver.select(exit_id);
    });

    tray.run(
        Some(Box::new(move || {
            info!("tray is up");
            let _ = up_tx.send(());
        })),
        Some(Box::new(|| println!("exiting"))),
    );
    Ok(())
}

#[cfg(feature = "gui")]
fn run_native(config: DemoConfig) -> Result<()> {
    use traymenu::native::tray_icon::{TrayConfig, TrayIconBackend};

    let backend = TrayIconBackend::new(TrayConfig {
        tooltip: config.tooltip.clone().unwrap_or_else(|| config.title.clone()),
        icon_path: config.icon.clone(),
    });
    let tray = Tray::new(backend);

    let (done_tx, _done_rx) = mpsc::channel();
    let _menu = build_menu(&tray, &config, &done_tx);

    tray.run(
        Some(Box::new(|| info!("tray is up"))),
        Some(Box::new(|| info!("exiting"))),
    );
    Ok(())
}

#[cfg(not(feature = "gui"))]
fn run_native(_config: DemoConfig) -> Result<()> {
    anyhow::bail!("built without the `gui` feature; run with --simulate")
}
