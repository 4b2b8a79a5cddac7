/// Cross-thread event queue feeding the UI loop
///
/// The hotkey listener and the tray thread never touch UI state. They push an
/// [`AppEvent`] here and the settings window drains the queue from its own
/// loop.
use crossbeam::channel::{self, Receiver, Sender};

/// Actions offered by the tray menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    ShowWindow,
    CaptureNow,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A registered global hotkey was pressed
    Hotkey { id: u32 },
    /// A tray menu item was activated
    Tray(TrayAction),
}

/// Unbounded multi-producer queue of [`AppEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<AppEvent> {
        self.rx.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_events_from_other_threads_arrive_in_order() {
        let bus = EventBus::new();
        let tx = bus.sender();

        thread::spawn(move || {
            tx.send(AppEvent::Hotkey { id: 7 }).unwrap();
            tx.send(AppEvent::Tray(TrayAction::CaptureNow)).unwrap();
        })
        .join()
        .unwrap();

        let rx = bus.receiver();
        assert_eq!(rx.recv().unwrap(), AppEvent::Hotkey { id: 7 });
        assert_eq!(rx.recv().unwrap(), AppEvent::Tray(TrayAction::CaptureNow));
        assert!(rx.try_recv().is_err());
    }
}
