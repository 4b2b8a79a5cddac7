//! Nothing Screenshot Library
//!
//! Background screenshot utility: a global hotkey or the tray menu captures
//! the screen to a timestamped PNG, optionally followed by a white flash.
//!
//! Threads:
//! - UI loop (iced) owns all state and the hotkey manager
//! - Hotkey listener and tray loop only push events onto the queue

pub mod capture;
pub mod config;
pub mod dialogs;
pub mod events;
pub mod gui;
pub mod hotkey;
pub mod tray;
