//! Full-screen capture to timestamped PNG files
//!
//! The capture is split in two halves so the naming contract can be exercised
//! without a display:
//! - [`ScreenSource`] grabs pixels (xcap in production)
//! - [`save_png`] names and writes the file for a given timestamp
//!
//! File names have second resolution (`screenshot_YYYYMMDD_HHMMSS.png`). Two
//! captures inside the same second land on the same name and the later one
//! replaces the earlier one.

use chrono::{DateTime, Local, TimeZone};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FILE_PREFIX: &str = "screenshot_";
pub const FILE_EXTENSION: &str = "png";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no monitors available")]
    NoMonitors,

    #[error("screen capture failed: {0}")]
    Screen(String),

    #[error("save folder {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Rectangle of the virtual screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Something that can produce an image of the whole screen
pub trait ScreenSource: Send + Sync {
    fn grab(&self) -> Result<RgbaImage, CaptureError>;
}

/// Build the file name for a capture taken at `at`
pub fn screenshot_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}{}.{}",
        FILE_PREFIX,
        at.format(TIMESTAMP_FORMAT),
        FILE_EXTENSION
    )
}

/// Whether `name` looks like a file produced by [`save_png`]
pub fn is_screenshot_file_name(name: &str) -> bool {
    let Some(stamp) = name
        .strip_prefix(FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(".png"))
    else {
        return false;
    };

    let bytes = stamp.as_bytes();
    bytes.len() == 15
        && bytes[8] == b'_'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit())
}

/// Write `image` into `dir` as a PNG named after `at`.
///
/// The encoder writes to a hidden `.part` sibling first, which is renamed over
/// the final name once complete.
pub fn save_png<Tz: TimeZone>(
    image: &RgbaImage,
    dir: &Path,
    at: &DateTime<Tz>,
) -> Result<PathBuf, CaptureError>
where
    Tz::Offset: std::fmt::Display,
{
    if !dir.is_dir() {
        return Err(CaptureError::MissingDirectory(dir.to_path_buf()));
    }

    let file_name = screenshot_file_name(at);
    let final_path = dir.join(&file_name);
    let part_path = dir.join(format!(".{}.part", file_name));

    if let Err(e) = image.save_with_format(&part_path, ImageFormat::Png) {
        let _ = fs::remove_file(&part_path);
        return Err(match e {
            image::ImageError::IoError(source) => CaptureError::Io {
                path: part_path,
                source,
            },
            other => CaptureError::Encode(other),
        });
    }

    fs::rename(&part_path, &final_path).map_err(|source| {
        let _ = fs::remove_file(&part_path);
        CaptureError::Io {
            path: final_path.clone(),
            source,
        }
    })?;

    Ok(final_path)
}

/// Grabs the screen and writes it to disk
pub struct Capturer<S> {
    source: S,
}

impl<S: ScreenSource> Capturer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Capture the screen into `save_path`, returning the written file
    pub fn capture(&self, save_path: &Path) -> Result<PathBuf, CaptureError> {
        let image = self.source.grab()?;
        let path = save_png(&image, save_path, &Local::now())?;
        tracing::info!(
            "Captured {}x{} to {}",
            image.width(),
            image.height(),
            path.display()
        );
        Ok(path)
    }
}

/// Screen source backed by xcap.
///
/// Every monitor is grabbed and composited onto one canvas covering the
/// bounding box of all monitors.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapScreen;

impl ScreenSource for XcapScreen {
    fn grab(&self) -> Result<RgbaImage, CaptureError> {
        let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Screen(e.to_string()))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoMonitors);
        }

        let mut tiles = Vec::with_capacity(monitors.len());
        for monitor in &monitors {
            let x = monitor.x().map_err(|e| CaptureError::Screen(e.to_string()))?;
            let y = monitor.y().map_err(|e| CaptureError::Screen(e.to_string()))?;
            let shot = monitor
                .capture_image()
                .map_err(|e| CaptureError::Screen(e.to_string()))?;
            let (width, height) = (shot.width(), shot.height());
            let tile = RgbaImage::from_raw(width, height, shot.into_raw())
                .ok_or_else(|| CaptureError::Screen("monitor returned a short buffer".into()))?;
            tiles.push((x, y, tile));
        }

        Ok(composite(tiles))
    }
}

/// Paste monitor tiles onto one canvas spanning all of them
fn composite(mut tiles: Vec<(i32, i32, RgbaImage)>) -> RgbaImage {
    if tiles.len() == 1 {
        return tiles.remove(0).2;
    }

    let left = tiles.iter().map(|(x, _, _)| *x).min().unwrap_or(0);
    let top = tiles.iter().map(|(_, y, _)| *y).min().unwrap_or(0);
    let right = tiles
        .iter()
        .map(|(x, _, t)| *x as i64 + t.width() as i64)
        .max()
        .unwrap_or(0);
    let bottom = tiles
        .iter()
        .map(|(_, y, t)| *y as i64 + t.height() as i64)
        .max()
        .unwrap_or(0);

    let mut canvas = RgbaImage::new(
        (right - left as i64).max(0) as u32,
        (bottom - top as i64).max(0) as u32,
    );
    for (x, y, tile) in &tiles {
        image::imageops::replace(
            &mut canvas,
            tile,
            (*x - left) as i64,
            (*y - top) as i64,
        );
    }
    canvas
}

/// Virtual screen rectangle in logical units, for sizing overlays.
///
/// Each monitor is scaled by its own factor, so with mixed DPI the logical
/// rectangles don't tile and the union may leave gaps or overlaps.
pub fn virtual_screen_bounds() -> Result<ScreenBounds, CaptureError> {
    let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Screen(e.to_string()))?;

    let mut rects = Vec::with_capacity(monitors.len());
    for monitor in &monitors {
        let scale = monitor.scale_factor().unwrap_or(1.0).max(0.1);
        let x = monitor.x().unwrap_or(0) as f32 / scale;
        let y = monitor.y().unwrap_or(0) as f32 / scale;
        let w = monitor.width().unwrap_or(0) as f32 / scale;
        let h = monitor.height().unwrap_or(0) as f32 / scale;
        rects.push((x, y, w, h));
    }

    union_bounds(&rects).ok_or(CaptureError::NoMonitors)
}

fn union_bounds(rects: &[(f32, f32, f32, f32)]) -> Option<ScreenBounds> {
    let first = rects.first()?;
    let (mut left, mut top) = (first.0, first.1);
    let (mut right, mut bottom) = (first.0 + first.2, first.1 + first.3);

    for &(x, y, w, h) in &rects[1..] {
        left = left.min(x);
        top = top.min(y);
        right = right.max(x + w);
        bottom = bottom.max(y + h);
    }

    Some(ScreenBounds {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}

/// Startup check that the capture API can see at least one monitor
pub fn probe() -> Result<usize, CaptureError> {
    let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Screen(e.to_string()))?;
    if monitors.is_empty() {
        return Err(CaptureError::NoMonitors);
    }
    Ok(monitors.len())
}
