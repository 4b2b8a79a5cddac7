//! Flash overlay - brief translucent white window over the whole screen
//!
//! The overlay is an undecorated, always-on-top iced window covering the
//! virtual screen. It is opened a moment after a capture completes and closed
//! by a one-shot timer on the UI loop. Failures are swallowed; the flash is
//! feedback only.

use super::Message;
use crate::capture::{self, ScreenBounds};
use iced::theme::Palette;
use iced::widget::{Container, Space};
use iced::{window, Color, Command, Element, Length, Point, Size, Theme};
use std::time::Duration;

/// Delay between the capture finishing and the flash appearing
pub const FLASH_DELAY: Duration = Duration::from_millis(100);

/// How long the overlay stays up
pub const FLASH_DURATION: Duration = Duration::from_millis(50);

pub const FLASH_OPACITY: f32 = 0.7;

fn window_settings(bounds: ScreenBounds) -> window::Settings {
    window::Settings {
        size: Size::new(bounds.width, bounds.height),
        position: window::Position::Specific(Point::new(bounds.x, bounds.y)),
        visible: true,
        resizable: false,
        decorations: false,
        transparent: true,
        level: window::Level::AlwaysOnTop,
        exit_on_close_request: false,
        ..Default::default()
    }
}

/// Open the overlay and schedule its dismissal.
/// Returns `None` if the screen geometry couldn't be read.
pub fn open() -> Option<(window::Id, Command<Message>)> {
    let bounds = match capture::virtual_screen_bounds() {
        Ok(bounds) if bounds.width > 0.0 && bounds.height > 0.0 => bounds,
        Ok(_) => return None,
        Err(e) => {
            tracing::debug!("Skipping flash: {}", e);
            return None;
        }
    };

    let (id, spawn) = window::spawn(window_settings(bounds));
    let dismiss = Command::perform(tokio::time::sleep(FLASH_DURATION), move |_| {
        Message::FlashEnd(id)
    });

    Some((id, Command::batch([spawn, dismiss])))
}

/// Theme whose background is the translucent white fill
pub fn theme() -> Theme {
    Theme::custom(
        "Flash".to_string(),
        Palette {
            background: Color::from_rgba(1.0, 1.0, 1.0, FLASH_OPACITY),
            ..Palette::LIGHT
        },
    )
}

pub fn view<'a>() -> Element<'a, Message> {
    Container::new(Space::new(Length::Fill, Length::Fill))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_covers_bounds_without_decorations() {
        let settings = window_settings(ScreenBounds {
            x: -1280.0,
            y: 0.0,
            width: 3200.0,
            height: 1080.0,
        });

        assert_eq!(settings.size, Size::new(3200.0, 1080.0));
        assert!(matches!(
            settings.position,
            window::Position::Specific(p) if p == Point::new(-1280.0, 0.0)
        ));
        assert!(!settings.decorations);
        assert!(settings.transparent);
        assert_eq!(settings.level, window::Level::AlwaysOnTop);
    }

    #[test]
    fn test_theme_background_is_translucent_white() {
        let background = theme().palette().background;
        assert_eq!(background, Color::from_rgba(1.0, 1.0, 1.0, 0.7));
    }
}
