//! Hotkey Registrar - global hotkey binding for the capture action
//!
//! Uses the global-hotkey crate for cross-platform hotkey handling.
//! On Windows, the manager's hidden window is serviced by the UI thread's
//! message loop, so the manager must be created on that thread.
//!
//! At most two registrations exist at a time:
//! - the persistent binding, which triggers a capture
//! - a transient test binding, installed by the settings window and expired
//!   after [`TEST_TIMEOUT`]

use crate::events::AppEvent;
use crossbeam::channel::Sender;
use global_hotkey::{hotkey::HotKey, GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a test binding stays installed
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("invalid hotkey \"{combo}\": {reason}")]
    Invalid { combo: String, reason: String },

    #[error("failed to register \"{combo}\": {reason}")]
    Register { combo: String, reason: String },

    #[error("hotkey manager unavailable: {0}")]
    Unavailable(String),
}

/// OS side of hotkey registration
pub trait HotkeyBackend {
    fn register(&mut self, hotkey: HotKey) -> Result<(), String>;
    fn unregister(&mut self, hotkey: HotKey) -> Result<(), String>;
}

impl HotkeyBackend for GlobalHotKeyManager {
    fn register(&mut self, hotkey: HotKey) -> Result<(), String> {
        GlobalHotKeyManager::register(self, hotkey).map_err(|e| e.to_string())
    }

    fn unregister(&mut self, hotkey: HotKey) -> Result<(), String> {
        GlobalHotKeyManager::unregister(self, hotkey).map_err(|e| e.to_string())
    }
}

/// Create the OS hotkey manager. Must run on the UI thread.
pub fn create_manager() -> Result<GlobalHotKeyManager, HotkeyError> {
    GlobalHotKeyManager::new().map_err(|e| HotkeyError::Unavailable(e.to_string()))
}

/// Route key-press events from the listener thread into the event queue
pub fn forward_events(tx: Sender<AppEvent>) {
    GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
        if event.state == HotKeyState::Pressed {
            debug!("Hotkey pressed: {}", event.id);
            let _ = tx.send(AppEvent::Hotkey { id: event.id });
        }
    }));
}

/// Parse a combo like "ctrl+shift+s"
pub fn parse_combo(combo: &str) -> Result<HotKey, HotkeyError> {
    let trimmed = combo.trim();
    if trimmed.is_empty() {
        return Err(HotkeyError::Invalid {
            combo: combo.to_string(),
            reason: "empty key combination".to_string(),
        });
    }

    HotKey::from_str(trimmed).map_err(|e| HotkeyError::Invalid {
        combo: combo.to_string(),
        reason: e.to_string(),
    })
}

/// What a hotkey event id is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Capture,
    Test,
}

/// Identifies one test session; stale tokens are ignored on expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestToken(u64);

#[derive(Debug, Clone)]
struct Binding {
    combo: String,
    hotkey: HotKey,
    /// False while a test binding borrows the same key combination
    registered: bool,
}

#[derive(Debug, Clone)]
struct TestBinding {
    combo: String,
    hotkey: HotKey,
    token: TestToken,
}

pub struct HotkeyRegistrar<B> {
    backend: B,
    persistent: Option<Binding>,
    test: Option<TestBinding>,
    next_token: u64,
}

impl<B: HotkeyBackend> HotkeyRegistrar<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            persistent: None,
            test: None,
            next_token: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    fn active_combo(&self) -> Option<&str> {
        self.persistent.as_ref().map(|b| b.combo.as_str())
    }

    pub fn is_testing(&self) -> bool {
        self.test.is_some()
    }

    /// Combo of the running test binding
    pub fn test_combo(&self) -> Option<&str> {
        self.test.as_ref().map(|t| t.combo.as_str())
    }

    /// Replace every binding with a persistent binding for `combo`.
    ///
    /// An unparseable combo leaves the current bindings untouched. If the OS
    /// refuses the new combo, the previous persistent binding is restored.
    pub fn bind(&mut self, combo: &str) -> Result<(), HotkeyError> {
        let hotkey = parse_combo(combo)?;
        let previous = self.persistent.clone();

        self.unbind_all();

        if let Err(reason) = self.backend.register(hotkey) {
            warn!("Failed to register hotkey '{}': {}", combo, reason);
            if let Some(mut prev) = previous {
                prev.registered = self.backend.register(prev.hotkey).is_ok();
                if prev.registered {
                    self.persistent = Some(prev);
                }
            }
            return Err(HotkeyError::Register {
                combo: combo.trim().to_string(),
                reason,
            });
        }

        info!("Registered hotkey: {}", combo.trim());
        self.persistent = Some(Binding {
            combo: combo.trim().to_string(),
            hotkey,
            registered: true,
        });
        Ok(())
    }

    /// Install a transient binding for `combo` alongside the persistent one
    pub fn begin_test(&mut self, combo: &str) -> Result<TestToken, HotkeyError> {
        let hotkey = parse_combo(combo)?;

        if let Some(previous) = self.test.take() {
            let _ = self.backend.unregister(previous.hotkey);
            // Hand a borrowed persistent registration back unless the new
            // test borrows it again below.
            if previous.hotkey != hotkey {
                let _ = self.restore_persistent();
            }
        }

        // The OS holds one registration per combo, so a test of the active
        // combo temporarily takes over the persistent registration.
        if let Some(binding) = self.persistent.as_mut() {
            if binding.hotkey == hotkey && binding.registered {
                let _ = self.backend.unregister(binding.hotkey);
                binding.registered = false;
            }
        }

        if let Err(reason) = self.backend.register(hotkey) {
            let _ = self.restore_persistent();
            return Err(HotkeyError::Register {
                combo: combo.trim().to_string(),
                reason,
            });
        }

        self.next_token += 1;
        let token = TestToken(self.next_token);
        self.test = Some(TestBinding {
            combo: combo.trim().to_string(),
            hotkey,
            token,
        });
        info!("Test hotkey installed: {}", combo.trim());
        Ok(token)
    }

    /// Remove the test binding started with `token` and restore the
    /// persistent binding. Returns `Ok(false)` if a newer test replaced it.
    pub fn expire_test(&mut self, token: TestToken) -> Result<bool, HotkeyError> {
        match self.test.take() {
            Some(test) if test.token == token => {
                let _ = self.backend.unregister(test.hotkey);
                debug!("Test hotkey expired");
                self.restore_persistent().map(|_| true)
            }
            newer => {
                self.test = newer;
                Ok(false)
            }
        }
    }

    /// Drop every binding. Safe to call repeatedly.
    pub fn unbind_all(&mut self) {
        if let Some(test) = self.test.take() {
            let _ = self.backend.unregister(test.hotkey);
        }
        if let Some(binding) = self.persistent.take() {
            if binding.registered {
                let _ = self.backend.unregister(binding.hotkey);
            }
        }
    }

    /// Map an incoming hotkey event id to its action
    pub fn classify(&self, id: u32) -> Option<HotkeyAction> {
        if self.test.as_ref().is_some_and(|t| t.hotkey.id() == id) {
            return Some(HotkeyAction::Test);
        }
        match &self.persistent {
            Some(binding) if binding.registered && binding.hotkey.id() == id => {
                Some(HotkeyAction::Capture)
            }
            _ => None,
        }
    }

    fn restore_persistent(&mut self) -> Result<(), HotkeyError> {
        let Some(binding) = self.persistent.as_mut() else {
            return Ok(());
        };
        if binding.registered {
            return Ok(());
        }

        match self.backend.register(binding.hotkey) {
            Ok(()) => {
                binding.registered = true;
                Ok(())
            }
            Err(reason) => {
                warn!("Failed to restore hotkey '{}': {}", binding.combo, reason);
                Err(HotkeyError::Register {
                    combo: binding.combo.clone(),
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Records live registrations; ids in `claimed` are refused like a combo
    /// owned by another application.
    #[derive(Default)]
    struct FakeBackend {
        live: HashSet<u32>,
        claimed: HashSet<u32>,
    }

    impl HotkeyBackend for FakeBackend {
        fn register(&mut self, hotkey: HotKey) -> Result<(), String> {
            if self.claimed.contains(&hotkey.id()) {
                return Err("already registered by another application".into());
            }
            if !self.live.insert(hotkey.id()) {
                return Err("already registered".into());
            }
            Ok(())
        }

        fn unregister(&mut self, hotkey: HotKey) -> Result<(), String> {
            if self.live.remove(&hotkey.id()) {
                Ok(())
            } else {
                Err("not registered".into())
            }
        }
    }

    fn id_of(combo: &str) -> u32 {
        parse_combo(combo).unwrap().id()
    }

    #[test]
    fn test_parse_combo() {
        assert!(parse_combo("ctrl+shift+s").is_ok());
        assert!(parse_combo("  Alt+F9 ").is_ok());
        assert!(matches!(parse_combo(""), Err(HotkeyError::Invalid { .. })));
        assert!(matches!(parse_combo("ctrl+banana"), Err(HotkeyError::Invalid { .. })));
    }

    #[test]
    fn test_bind_registers_capture_binding() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());

        registrar.bind("ctrl+shift+s").unwrap();

        assert_eq!(registrar.active_combo(), Some("ctrl+shift+s"));
        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Capture)
        );
        assert_eq!(registrar.backend().live.len(), 1);
    }

    #[test]
    fn test_rebind_replaces_previous_binding() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();

        registrar.bind("alt+f9").unwrap();

        assert_eq!(registrar.classify(id_of("ctrl+shift+s")), None);
        assert_eq!(registrar.classify(id_of("alt+f9")), Some(HotkeyAction::Capture));
        assert_eq!(registrar.backend().live.len(), 1);
    }

    #[test]
    fn test_invalid_combo_leaves_binding_untouched() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();

        let err = registrar.bind("ctrl+banana").unwrap_err();

        assert!(matches!(err, HotkeyError::Invalid { .. }));
        assert_eq!(registrar.active_combo(), Some("ctrl+shift+s"));
        assert!(registrar.backend().live.contains(&id_of("ctrl+shift+s")));
    }

    #[test]
    fn test_os_refusal_restores_previous_binding() {
        let mut backend = FakeBackend::default();
        backend.claimed.insert(id_of("alt+f4"));
        let mut registrar = HotkeyRegistrar::new(backend);
        registrar.bind("ctrl+shift+s").unwrap();

        let err = registrar.bind("alt+f4").unwrap_err();

        assert!(matches!(err, HotkeyError::Register { .. }));
        assert_eq!(registrar.active_combo(), Some("ctrl+shift+s"));
        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Capture)
        );
    }

    #[test]
    fn test_unbind_all_is_idempotent() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();
        registrar.begin_test("alt+t").unwrap();

        registrar.unbind_all();
        registrar.unbind_all();

        assert!(registrar.backend().live.is_empty());
        assert_eq!(registrar.active_combo(), None);
        assert!(!registrar.is_testing());
    }

    #[test]
    fn test_unfired_test_restores_persistent_on_expiry() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();

        let token = registrar.begin_test("alt+t").unwrap();
        assert_eq!(registrar.classify(id_of("alt+t")), Some(HotkeyAction::Test));

        assert!(registrar.expire_test(token).unwrap());

        assert!(!registrar.is_testing());
        assert_eq!(registrar.classify(id_of("alt+t")), None);
        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Capture)
        );
        assert_eq!(registrar.backend().live.len(), 1);
    }

    #[test]
    fn test_testing_the_active_combo_borrows_its_registration() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();

        let token = registrar.begin_test("ctrl+shift+s").unwrap();
        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Test)
        );

        registrar.expire_test(token).unwrap();
        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Capture)
        );
        assert!(registrar.backend().live.contains(&id_of("ctrl+shift+s")));
    }

    #[test]
    fn test_stale_token_does_not_cancel_newer_test() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();

        let first = registrar.begin_test("alt+t").unwrap();
        let second = registrar.begin_test("alt+y").unwrap();

        assert!(!registrar.expire_test(first).unwrap());
        assert!(registrar.is_testing());
        assert_eq!(registrar.classify(id_of("alt+y")), Some(HotkeyAction::Test));
        assert_eq!(registrar.classify(id_of("alt+t")), None);

        assert!(registrar.expire_test(second).unwrap());
        assert!(!registrar.is_testing());
    }

    #[test]
    fn test_replacing_a_borrowing_test_returns_capture_binding() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();

        registrar.begin_test("ctrl+shift+s").unwrap();
        let token = registrar.begin_test("alt+t").unwrap();

        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Capture)
        );
        assert_eq!(registrar.classify(id_of("alt+t")), Some(HotkeyAction::Test));
        assert_eq!(registrar.test_combo(), Some("alt+t"));
        assert_eq!(registrar.backend().live.len(), 2);

        assert!(registrar.expire_test(token).unwrap());
        assert_eq!(registrar.backend().live.len(), 1);
    }

    #[test]
    fn test_retesting_the_active_combo_keeps_the_borrow() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());
        registrar.bind("ctrl+shift+s").unwrap();

        registrar.begin_test("ctrl+shift+s").unwrap();
        let token = registrar.begin_test(" ctrl+shift+s ").unwrap();

        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Test)
        );
        assert_eq!(registrar.test_combo(), Some("ctrl+shift+s"));

        registrar.expire_test(token).unwrap();
        assert_eq!(
            registrar.classify(id_of("ctrl+shift+s")),
            Some(HotkeyAction::Capture)
        );
    }

    #[test]
    fn test_expiry_without_persistent_binding() {
        let mut registrar = HotkeyRegistrar::new(FakeBackend::default());

        let token = registrar.begin_test("alt+t").unwrap();
        assert!(registrar.expire_test(token).unwrap());
        assert!(registrar.backend().live.is_empty());
    }
}
