//! Nothing Screenshot - hotkey-triggered screen capture in the system tray
//!
//! Startup order:
//! - Load settings and create the screenshot folder
//! - Check that screen capture, global hotkeys and the tray are available
//! - Run the settings window (hidden when starting minimized)

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::{Context, Result};
use nothing_screenshot::config::{ensure_save_dir, ConfigStore};
use nothing_screenshot::events::EventBus;
use nothing_screenshot::gui::{self, AppContext};
use nothing_screenshot::hotkey::{self, HotkeyRegistrar};
use nothing_screenshot::{capture, dialogs, tray};

fn main() {
    tracing_subscriber::fmt::init();

    tracing::info!("Nothing Screenshot starting...");

    let context = match startup() {
        Ok(context) => context,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            let message = failure_message(&e);
            eprintln!("{}", message);
            dialogs::fatal("Nothing Screenshot", &message);
            std::process::exit(1);
        }
    };

    if let Err(e) = gui::run(context) {
        tracing::error!("GUI error: {}", e);
        eprintln!("Nothing Screenshot failed: {}", e);
        std::process::exit(1);
    }
}

/// Text shown to the user when startup fails
fn failure_message(error: &anyhow::Error) -> String {
    format!("Missing required capability: {:#}", error)
}

/// Build the application context, failing if an OS capability is missing
fn startup() -> Result<AppContext> {
    let store = ConfigStore::default_location();
    let config = store.load();

    if let Err(e) = ensure_save_dir(&config.save_path) {
        tracing::warn!(
            "Failed to create screenshot folder {}: {}",
            config.save_path.display(),
            e
        );
    }

    let monitors = capture::probe().context("screen capture unavailable")?;
    tracing::info!("Screen capture ready ({} monitors)", monitors);

    let manager = hotkey::create_manager().context("global hotkeys unavailable")?;

    let bus = EventBus::new();
    hotkey::forward_events(bus.sender());

    let tray = tray::spawn(bus.sender()).context("system tray unavailable")?;

    Ok(AppContext {
        config,
        store,
        registrar: HotkeyRegistrar::new(manager),
        tray,
        events: bus.receiver(),
    })
}
