/// ICED GUI Application Module
///
/// Architecture:
/// - The settings window is the main iced window; closing it only hides it
/// - Hotkey and tray threads push events onto the event queue, which a
///   subscription drains into UI messages
/// - Captures run on the blocking pool and report back as messages, so the
///   counter and status line are only touched from the UI loop
/// - Timers (flash, hotkey test expiry) are `Command::perform` sleeps
pub mod flash;

use crate::capture::{Capturer, XcapScreen};
use crate::config::{ensure_save_dir, AppConfig, ConfigStore};
use crate::dialogs;
use crate::events::{AppEvent, TrayAction};
use crate::hotkey::{HotkeyAction, HotkeyRegistrar, TestToken, TEST_TIMEOUT};
use crate::tray::TrayHandle;
use crossbeam::channel::Receiver;
use global_hotkey::GlobalHotKeyManager;
use iced::{
    executor, multi_window,
    widget::{Button, Checkbox, Column, Container, Row, Space, Text, TextInput},
    window, Alignment, Command, Element, Length, Settings, Size, Subscription, Theme,
};
use std::path::PathBuf;
use std::sync::Arc;

pub const WINDOW_TITLE: &str = "Nothing Screenshot";

/// Everything the settings window owns, assembled by `main`
pub struct AppContext {
    pub config: AppConfig,
    pub store: ConfigStore,
    pub registrar: HotkeyRegistrar<GlobalHotKeyManager>,
    pub tray: TrayHandle,
    pub events: Receiver<AppEvent>,
}

/// Where a capture request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOrigin {
    Hotkey,
    Tray,
    Test,
}

#[derive(Debug, Clone)]
pub enum Message {
    // Form fields
    HotkeyChanged(String),
    SavePathChanged(String),
    FlashToggled(bool),
    StartMinimizedToggled(bool),
    QuietToggled(bool),

    // Buttons
    Save,
    Browse,
    FolderPicked(Option<PathBuf>),
    TestHotkey,
    TestHotkeyExpired(TestToken),
    TestCapture,
    OpenFolder,
    Quit,

    // Capture pipeline
    CaptureFinished(CaptureOrigin, Result<PathBuf, String>),
    FlashStart,
    FlashEnd(window::Id),

    // Hotkey / tray events and window management
    External(AppEvent),
    CloseRequested(window::Id),
    DialogClosed,
}

/// Uncommitted copy of the settings being edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub hotkey: String,
    pub save_path: String,
    pub flash_screen: bool,
    pub start_minimized: bool,
    pub quiet_when_minimized: bool,
}

impl Draft {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            hotkey: config.hotkey.clone(),
            save_path: config.save_path.to_string_lossy().to_string(),
            flash_screen: config.flash_screen,
            start_minimized: config.start_minimized,
            quiet_when_minimized: config.quiet_when_minimized,
        }
    }

    /// Produce the committed config this draft describes
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            hotkey: self.hotkey.trim().to_string(),
            save_path: PathBuf::from(&self.save_path),
            start_minimized: self.start_minimized,
            flash_screen: self.flash_screen,
            quiet_when_minimized: self.quiet_when_minimized,
        }
    }
}

/// Status text shown in the bottom bar
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    text: String,
}

impl StatusLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text unless `config` asks for a quiet status line
    pub fn set(&mut self, config: &AppConfig, text: impl Into<String>) {
        let text = text.into();
        if config.status_suppressed() {
            tracing::debug!("Status suppressed: {}", text);
            return;
        }
        tracing::debug!("Status: {}", text);
        self.text = text;
    }
}

pub struct NothingScreenshot {
    config: AppConfig,
    draft: Draft,
    store: ConfigStore,
    registrar: HotkeyRegistrar<GlobalHotKeyManager>,
    capturer: Arc<Capturer<XcapScreen>>,
    tray: TrayHandle,
    events: Receiver<AppEvent>,

    status: StatusLine,
    capture_count: u64,
    flash_window: Option<window::Id>,
    capture_in_flight: bool,
}

impl NothingScreenshot {
    fn set_status(&mut self, text: impl Into<String>) {
        self.status.set(&self.config, text);
    }

    fn register_hotkey(&mut self) {
        let combo = self.config.hotkey.clone();
        match self.registrar.bind(&combo) {
            Ok(()) => self.set_status(format!("Hotkey registered: {}", combo)),
            Err(e) => {
                tracing::warn!("{}", e);
                self.set_status(format!("Hotkey registration failed: {}", e));
            }
        }
    }

    fn start_capture(&mut self, origin: CaptureOrigin) -> Command<Message> {
        if self.capture_in_flight {
            tracing::debug!("Capture already running, ignoring {:?} request", origin);
            return Command::none();
        }
        self.capture_in_flight = true;

        let capturer = self.capturer.clone();
        let save_path = self.config.save_path.clone();

        Command::perform(
            async move {
                tokio::task::spawn_blocking(move || {
                    capturer.capture(&save_path).map_err(|e| e.to_string())
                })
                .await
                .unwrap_or_else(|e| Err(format!("capture task failed: {}", e)))
            },
            move |result| Message::CaptureFinished(origin, result),
        )
    }

    fn finish_capture(
        &mut self,
        origin: CaptureOrigin,
        result: Result<PathBuf, String>,
    ) -> Command<Message> {
        self.capture_in_flight = false;

        match result {
            Ok(path) => {
                self.capture_count += 1;

                if origin == CaptureOrigin::Test {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    self.set_status(format!("Test capture saved: {}", name));
                }

                if self.config.flash_screen {
                    Command::perform(tokio::time::sleep(flash::FLASH_DELAY), |_| {
                        Message::FlashStart
                    })
                } else {
                    Command::none()
                }
            }
            Err(e) => {
                tracing::warn!("Capture failed: {}", e);
                self.set_status(format!("Capture failed: {}", e));
                Command::none()
            }
        }
    }

    fn save_settings(&mut self) -> Command<Message> {
        if self.registrar.is_testing() {
            tracing::debug!("Saving settings cancels the running hotkey test");
        }
        self.config = self.draft.to_config();
        self.draft = Draft::from_config(&self.config);

        if let Err(e) = ensure_save_dir(&self.config.save_path) {
            tracing::warn!(
                "Failed to create {}: {}",
                self.config.save_path.display(),
                e
            );
        }

        let persisted = self.store.save(&self.config);
        self.register_hotkey();

        match persisted {
            Ok(()) => {
                tracing::info!("Settings saved");
                self.set_status("Settings saved");
                Command::perform(
                    dialogs::info("Saved".into(), "Settings saved!".into()),
                    |_| Message::DialogClosed,
                )
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.set_status(format!("Failed to save settings: {}", e));
                Command::perform(
                    dialogs::error("Error".into(), format!("Failed to save settings:\n{}", e)),
                    |_| Message::DialogClosed,
                )
            }
        }
    }

    fn test_hotkey(&mut self) -> Command<Message> {
        let combo = self.draft.hotkey.trim().to_string();

        match self.registrar.begin_test(&combo) {
            Ok(token) => {
                self.set_status(format!("Press {} now", combo));
                Command::perform(tokio::time::sleep(TEST_TIMEOUT), move |_| {
                    Message::TestHotkeyExpired(token)
                })
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.set_status(format!("Hotkey test failed: {}", e));
                Command::none()
            }
        }
    }

    fn handle_event(&mut self, event: AppEvent) -> Command<Message> {
        match event {
            AppEvent::Hotkey { id } => match self.registrar.classify(id) {
                Some(HotkeyAction::Capture) => self.start_capture(CaptureOrigin::Hotkey),
                Some(HotkeyAction::Test) => {
                    let combo = self.registrar.test_combo().unwrap_or_default().to_string();
                    self.set_status("Hotkey test succeeded!");
                    Command::perform(
                        dialogs::info("Test passed".into(), format!("Hotkey {} works!", combo)),
                        |_| Message::DialogClosed,
                    )
                }
                None => Command::none(),
            },
            AppEvent::Tray(TrayAction::ShowWindow) => show_main_window(),
            AppEvent::Tray(TrayAction::CaptureNow) => self.start_capture(CaptureOrigin::Tray),
            AppEvent::Tray(TrayAction::Quit) => self.quit(),
        }
    }

    /// Stop the tray, release hotkeys and exit
    fn quit(&mut self) -> Command<Message> {
        tracing::info!("Quitting after {} captures", self.capture_count);
        self.tray.shutdown();
        self.registrar.unbind_all();
        std::process::exit(0)
    }

    fn view_settings(&self) -> Element<'_, Message> {
        let hotkey_row = Row::new()
            .spacing(10)
            .align_items(Alignment::Center)
            .push(Text::new("Capture hotkey").width(Length::Fixed(120.0)))
            .push(
                TextInput::new("ctrl+shift+s", &self.draft.hotkey)
                    .on_input(Message::HotkeyChanged)
                    .padding(8)
                    .width(Length::Fill),
            )
            .push(
                Button::new(Text::new("Test Hotkey"))
                    .on_press(Message::TestHotkey)
                    .padding(8),
            );

        let path_row = Row::new()
            .spacing(10)
            .align_items(Alignment::Center)
            .push(Text::new("Save folder").width(Length::Fixed(120.0)))
            .push(
                TextInput::new("Folder for screenshots...", &self.draft.save_path)
                    .on_input(Message::SavePathChanged)
                    .padding(8)
                    .width(Length::Fill),
            )
            .push(
                Button::new(Text::new("Browse"))
                    .on_press(Message::Browse)
                    .padding(8),
            );

        let options = Column::new()
            .spacing(8)
            .push(
                Checkbox::new("Flash the screen after each capture", self.draft.flash_screen)
                    .on_toggle(Message::FlashToggled),
            )
            .push(
                Checkbox::new("Start minimized to tray", self.draft.start_minimized)
                    .on_toggle(Message::StartMinimizedToggled),
            )
            .push(
                Checkbox::new(
                    "Keep status line quiet while minimized",
                    self.draft.quiet_when_minimized,
                )
                .on_toggle(Message::QuietToggled),
            );

        let buttons = Row::new()
            .spacing(10)
            .push(
                Button::new(Text::new("Test Capture"))
                    .on_press(Message::TestCapture)
                    .padding(10),
            )
            .push(
                Button::new(Text::new("Open Folder"))
                    .on_press(Message::OpenFolder)
                    .padding(10),
            )
            .push(Space::new(Length::Fill, Length::Shrink))
            .push(
                Button::new(Text::new("Quit"))
                    .on_press(Message::Quit)
                    .padding(10),
            )
            .push(
                Button::new(Text::new("Save Settings"))
                    .on_press(Message::Save)
                    .padding(10),
            );

        let status_bar = Row::new()
            .spacing(20)
            .push(Text::new(self.status.text()).size(14))
            .push(Space::new(Length::Fill, Length::Shrink))
            .push(Text::new(format!("Captures: {}", self.capture_count)).size(14));

        let content = Column::new()
            .spacing(15)
            .padding(20)
            .push(Text::new(WINDOW_TITLE).size(24))
            .push(hotkey_row)
            .push(path_row)
            .push(options)
            .push(Space::new(Length::Fill, Length::Fill))
            .push(buttons)
            .push(status_bar);

        Container::new(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

fn show_main_window() -> Command<Message> {
    Command::batch([
        window::change_mode(window::Id::MAIN, window::Mode::Windowed),
        window::gain_focus(window::Id::MAIN),
    ])
}

impl multi_window::Application for NothingScreenshot {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = AppContext;

    fn new(context: AppContext) -> (Self, Command<Message>) {
        let AppContext {
            config,
            store,
            registrar,
            tray,
            events,
        } = context;

        let mut app = NothingScreenshot {
            draft: Draft::from_config(&config),
            config,
            store,
            registrar,
            capturer: Arc::new(Capturer::new(XcapScreen)),
            tray,
            events,
            status: StatusLine::new("Ready"),
            capture_count: 0,
            flash_window: None,
            capture_in_flight: false,
        };
        app.register_hotkey();

        tracing::info!("Settings window initialized");
        (app, Command::none())
    }

    fn title(&self, window: window::Id) -> String {
        if Some(window) == self.flash_window {
            String::new()
        } else {
            WINDOW_TITLE.to_string()
        }
    }

    fn theme(&self, window: window::Id) -> Theme {
        if Some(window) == self.flash_window {
            flash::theme()
        } else {
            Theme::Light
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        struct EventPump;

        let pump = iced::subscription::unfold(
            std::any::TypeId::of::<EventPump>(),
            self.events.clone(),
            |rx| async move {
                // crossbeam's recv blocks, so wait on the blocking pool
                match tokio::task::spawn_blocking(move || (rx.recv(), rx)).await {
                    Ok((Ok(event), rx)) => (Message::External(event), rx),
                    _ => iced::futures::future::pending().await,
                }
            },
        );

        let close_requests = iced::event::listen_with(|event, _status| match event {
            iced::Event::Window(id, window::Event::CloseRequested) => {
                Some(Message::CloseRequested(id))
            }
            _ => None,
        });

        Subscription::batch([pump, close_requests])
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::HotkeyChanged(value) => {
                self.draft.hotkey = value;
            }

            Message::SavePathChanged(value) => {
                self.draft.save_path = value;
            }

            Message::FlashToggled(enabled) => {
                self.draft.flash_screen = enabled;
            }

            Message::StartMinimizedToggled(enabled) => {
                self.draft.start_minimized = enabled;
            }

            Message::QuietToggled(enabled) => {
                self.draft.quiet_when_minimized = enabled;
            }

            Message::Save => return self.save_settings(),

            Message::Browse => {
                let start = PathBuf::from(self.draft.save_path.trim());
                return Command::perform(dialogs::pick_folder(start), Message::FolderPicked);
            }

            Message::FolderPicked(Some(path)) => {
                self.draft.save_path = path.to_string_lossy().to_string();
            }

            Message::FolderPicked(None) => {
                // User cancelled - nothing to do
            }

            Message::TestHotkey => return self.test_hotkey(),

            Message::TestHotkeyExpired(token) => {
                if let Err(e) = self.registrar.expire_test(token) {
                    self.set_status(format!("Hotkey registration failed: {}", e));
                }
            }

            Message::TestCapture => return self.start_capture(CaptureOrigin::Test),

            Message::OpenFolder => {
                if let Err(e) = dialogs::open_folder(&self.config.save_path) {
                    tracing::warn!("{}", e);
                    return Command::perform(
                        dialogs::error("Error".into(), "Screenshot folder does not exist".into()),
                        |_| Message::DialogClosed,
                    );
                }
            }

            Message::Quit => return self.quit(),

            Message::CaptureFinished(origin, result) => {
                return self.finish_capture(origin, result);
            }

            Message::FlashStart => {
                if self.flash_window.is_none() {
                    if let Some((id, command)) = flash::open() {
                        self.flash_window = Some(id);
                        return command;
                    }
                }
            }

            Message::FlashEnd(id) => {
                if self.flash_window == Some(id) {
                    self.flash_window = None;
                }
                return window::close(id);
            }

            Message::External(event) => return self.handle_event(event),

            Message::CloseRequested(id) => {
                if id == window::Id::MAIN {
                    tracing::debug!("Hiding settings window");
                    return window::change_mode(window::Id::MAIN, window::Mode::Hidden);
                }
                return window::close(id);
            }

            Message::DialogClosed => {}
        }

        Command::none()
    }

    fn view(&self, window: window::Id) -> Element<'_, Message> {
        if Some(window) == self.flash_window {
            flash::view()
        } else {
            self.view_settings()
        }
    }
}

/// Run the settings window until the user quits
pub fn run(context: AppContext) -> iced::Result {
    let visible = !context.config.start_minimized;
    tracing::info!("Starting GUI, window visible: {}", visible);

    let mut settings = Settings::with_flags(context);
    settings.window = window::Settings {
        size: Size::new(560.0, 420.0),
        min_size: Some(Size::new(520.0, 380.0)),
        visible,
        exit_on_close_request: false,
        ..Default::default()
    };

    <NothingScreenshot as multi_window::Application>::run(settings)
}
