/// System tray presence
///
/// The tray lives on its own thread with its own blocking loop, independent
/// of the settings window. Menu activations are pushed onto the event queue;
/// nothing here touches UI state.
///
/// Backends:
/// - Windows: tray-icon with a Win32 message pump
/// - Linux: ksni StatusNotifierItem on a current-thread tokio runtime
use crate::events::{AppEvent, TrayAction};
use anyhow::Result;
use crossbeam::channel::Sender;
use image::{Rgba, RgbaImage};
use std::thread::JoinHandle;

pub const TOOLTIP: &str = "Nothing Screenshot";
pub const ICON_SIZE: u32 = 32;

/// Menu entries in display order
pub const MENU_ITEMS: [(&str, TrayAction); 3] = [
    ("Show Window", TrayAction::ShowWindow),
    ("Capture Now", TrayAction::CaptureNow),
    ("Quit", TrayAction::Quit),
];

/// Render the tray glyph: a dark aperture ring on a white tile
pub fn render_icon() -> RgbaImage {
    let center = (ICON_SIZE as f32 - 1.0) / 2.0;
    let outer = ICON_SIZE as f32 * 0.42;
    let inner = ICON_SIZE as f32 * 0.24;
    let dot = ICON_SIZE as f32 * 0.08;

    RgbaImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        let dist = (dx * dx + dy * dy).sqrt();

        if (dist <= outer && dist >= inner) || dist <= dot {
            Rgba([0x33, 0x33, 0x33, 0xFF])
        } else {
            Rgba([0xFF, 0xFF, 0xFF, 0xFF])
        }
    })
}

/// Owner of the tray thread
pub struct TrayHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
    thread: Option<JoinHandle<()>>,
}

impl TrayHandle {
    fn new(stop: Box<dyn FnOnce() + Send>, thread: JoinHandle<()>) -> Self {
        Self {
            stop: Some(stop),
            thread: Some(thread),
        }
    }

    /// Handle for a tray that was never started
    pub fn inactive() -> Self {
        Self {
            stop: None,
            thread: None,
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the tray loop and join its thread. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Tray thread panicked");
            } else {
                tracing::info!("Tray stopped");
            }
        }
    }
}

impl Drop for TrayHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start the tray on a dedicated thread
#[cfg(windows)]
pub fn spawn(events: Sender<AppEvent>) -> Result<TrayHandle> {
    let (stop_tx, stop_rx) = crossbeam::channel::bounded::<()>(1);

    let thread = std::thread::Builder::new()
        .name("tray".into())
        .spawn(move || {
            if let Err(e) = windows_tray::run(events, stop_rx) {
                tracing::error!("Tray loop failed: {:#}", e);
            }
        })?;

    Ok(TrayHandle::new(
        Box::new(move || {
            let _ = stop_tx.try_send(());
        }),
        thread,
    ))
}

/// Start the tray on a dedicated thread
#[cfg(target_os = "linux")]
pub fn spawn(events: Sender<AppEvent>) -> Result<TrayHandle> {
    use std::sync::Arc;
    use tokio::sync::Notify;

    let shutdown = Arc::new(Notify::new());
    let shutdown_rx = shutdown.clone();

    let thread = std::thread::Builder::new()
        .name("tray".into())
        .spawn(move || {
            if let Err(e) = linux_tray::run(events, shutdown_rx) {
                tracing::error!("Tray loop failed: {:#}", e);
            }
        })?;

    Ok(TrayHandle::new(
        Box::new(move || shutdown.notify_one()),
        thread,
    ))
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn spawn(_events: Sender<AppEvent>) -> Result<TrayHandle> {
    anyhow::bail!("system tray is not supported on this platform")
}

#[cfg(windows)]
mod windows_tray {
    use super::{render_icon, AppEvent, MENU_ITEMS, TOOLTIP};
    use anyhow::{anyhow, Result};
    use crossbeam::channel::{Receiver, Sender, TryRecvError};
    use std::time::Duration;
    use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
    use tray_icon::{Icon, TrayIconBuilder};
    use windows::Win32::UI::WindowsAndMessaging::*;

    pub fn run(events: Sender<AppEvent>, stop: Receiver<()>) -> Result<()> {
        let glyph = render_icon();
        let (w, h) = glyph.dimensions();
        let icon = Icon::from_rgba(glyph.into_raw(), w, h)
            .map_err(|e| anyhow!("Failed to create tray icon image: {:?}", e))?;

        let menu = Menu::new();
        let mut ids = Vec::with_capacity(MENU_ITEMS.len());
        for (i, (label, action)) in MENU_ITEMS.iter().enumerate() {
            if i == MENU_ITEMS.len() - 1 {
                menu.append(&PredefinedMenuItem::separator())
                    .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
            }
            let item = MenuItem::new(*label, true, None);
            menu.append(&item)
                .map_err(|e| anyhow!("Failed to add '{}' item: {}", label, e))?;
            ids.push((item.id().clone(), *action));
        }

        // Menu events are delivered on this thread while the pump below runs
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            if let Some((_, action)) = ids.iter().find(|(id, _)| *id == event.id) {
                tracing::debug!("Tray menu: {:?}", action);
                let _ = events.send(AppEvent::Tray(*action));
            }
        }));

        let _tray_icon = TrayIconBuilder::new()
            .with_tooltip(TOOLTIP)
            .with_icon(icon)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| anyhow!("Failed to create tray icon: {}", e))?;

        tracing::info!("Tray icon created, entering message loop");

        unsafe {
            let mut msg = MSG::default();
            loop {
                while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                    if msg.message == WM_QUIT {
                        return Ok(());
                    }
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }

                match stop.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                std::thread::sleep(Duration::from_millis(15));
            }
        }

        MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod linux_tray {
    use super::{render_icon, AppEvent, TrayAction, MENU_ITEMS, TOOLTIP};
    use anyhow::{anyhow, Context, Result};
    use crossbeam::channel::Sender;
    use ksni::TrayMethods;
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct NothingTray {
        events: Sender<AppEvent>,
    }

    impl ksni::Tray for NothingTray {
        fn id(&self) -> String {
            "nothing-screenshot".into()
        }

        fn title(&self) -> String {
            TOOLTIP.into()
        }

        fn icon_pixmap(&self) -> Vec<ksni::Icon> {
            let glyph = render_icon();
            let (width, height) = glyph.dimensions();
            // RGBA -> ARGB
            let data = glyph
                .pixels()
                .flat_map(|p| [p[3], p[0], p[1], p[2]])
                .collect();
            vec![ksni::Icon {
                width: width as i32,
                height: height as i32,
                data,
            }]
        }

        fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
            use ksni::menu::*;

            let mut items = Vec::with_capacity(MENU_ITEMS.len() + 1);
            for (label, action) in MENU_ITEMS {
                if action == TrayAction::Quit {
                    items.push(MenuItem::Separator);
                }
                items.push(
                    StandardItem {
                        label: label.into(),
                        activate: Box::new(move |this: &mut NothingTray| {
                            tracing::debug!("Tray menu: {:?}", action);
                            let _ = this.events.send(AppEvent::Tray(action));
                        }),
                        ..Default::default()
                    }
                    .into(),
                );
            }
            items
        }
    }

    pub fn run(events: Sender<AppEvent>, shutdown: Arc<Notify>) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build runtime for tray")?;

        runtime.block_on(async move {
            let handle = NothingTray { events }
                .spawn()
                .await
                .map_err(|e| anyhow!("Failed to create tray icon (D-Bus unavailable?): {}", e))?;

            tracing::info!("Tray icon created via ksni");
            shutdown.notified().await;
            handle.shutdown().await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_menu_order() {
        let actions: Vec<TrayAction> = MENU_ITEMS.iter().map(|(_, a)| *a).collect();
        assert_eq!(
            actions,
            vec![TrayAction::ShowWindow, TrayAction::CaptureNow, TrayAction::Quit]
        );
    }

    #[test]
    fn test_icon_has_ring_and_background() {
        let icon = render_icon();
        assert_eq!(icon.dimensions(), (ICON_SIZE, ICON_SIZE));
        assert_eq!(icon.get_pixel(0, 0), &Rgba([0xFF, 0xFF, 0xFF, 0xFF]));
        assert_eq!(icon.get_pixel(ICON_SIZE / 2, 3), &Rgba([0x33, 0x33, 0x33, 0xFF]));
    }

    #[test]
    fn test_shutdown_without_tray_is_noop() {
        let mut handle = TrayHandle::inactive();
        assert!(!handle.is_running());
        handle.shutdown();
        handle.shutdown();
    }

    #[test]
    fn test_shutdown_stops_blocking_loop() {
        let (tx, rx) = crossbeam::channel::bounded::<()>(1);
        let thread = std::thread::spawn(move || {
            // stands in for a tray event loop that only ends when told to
            let _ = rx.recv();
        });
        let mut handle = TrayHandle::new(
            Box::new(move || {
                let _ = tx.send(());
            }),
            thread,
        );
        assert!(handle.is_running());

        handle.shutdown();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_shutdown_after_loop_already_failed() {
        let thread = std::thread::spawn(|| {});
        std::thread::sleep(Duration::from_millis(20));
        let mut handle = TrayHandle::new(Box::new(|| {}), thread);

        handle.shutdown();
        assert!(!handle.is_running());
    }
}
