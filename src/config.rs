/// Configuration module for Nothing Screenshot.
///
/// This module provides functionality for managing user settings,
/// including:
/// - The global hotkey that triggers a capture
/// - The directory screenshots are written to
/// - Startup visibility and flash feedback toggles
/// - Persisting configuration to disk as JSON
///
/// The configuration lives in `nothing_screenshot_config.json` relative to the
/// working directory. Missing keys fall back to their defaults one by one; a
/// file that fails to parse is ignored entirely.
///
/// # Example
///
/// ```no_run
/// use nothing_screenshot::config::{AppConfig, ConfigStore};
///
/// let store = ConfigStore::default_location();
/// let mut config = store.load();
///
/// config.flash_screen = false;
///
/// store.save(&config).expect("Failed to save config");
/// ```
use directories::{BaseDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the persisted settings document
pub const CONFIG_FILE_NAME: &str = "nothing_screenshot_config.json";

/// Default capture combo
pub const DEFAULT_HOTKEY: &str = "ctrl+shift+s";

const SCREENSHOT_DIR_NAME: &str = "NothingScreenshots";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// User settings
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Key combination, e.g. "ctrl+shift+s"
    pub hotkey: String,
    /// Directory screenshots are written to
    pub save_path: PathBuf,
    /// Start with the settings window hidden
    pub start_minimized: bool,
    /// Flash the screen after each successful capture
    pub flash_screen: bool,
    /// Keep the status line untouched while running minimized
    pub quiet_when_minimized: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            hotkey: DEFAULT_HOTKEY.to_string(),
            save_path: default_save_path(),
            start_minimized: true,
            flash_screen: true,
            quiet_when_minimized: true,
        }
    }
}

impl AppConfig {
    /// Whether status line updates should be dropped
    pub fn status_suppressed(&self) -> bool {
        self.start_minimized && self.quiet_when_minimized
    }
}

/// `<Pictures>/NothingScreenshots`, falling back to `~/Pictures` and then a
/// relative directory when no home is known.
pub fn default_save_path() -> PathBuf {
    let pictures = UserDirs::new().and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf));
    if let Some(pictures) = pictures {
        return pictures.join(SCREENSHOT_DIR_NAME);
    }

    match BaseDirs::new() {
        Some(base) => base.home_dir().join("Pictures").join(SCREENSHOT_DIR_NAME),
        None => PathBuf::from(SCREENSHOT_DIR_NAME),
    }
}

/// Create the screenshot directory (and parents) if it doesn't exist
pub fn ensure_save_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Reads and writes the settings document at a fixed location
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `nothing_screenshot_config.json` in the working directory
    pub fn default_location() -> Self {
        Self::new(CONFIG_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, merging stored values over defaults.
    /// Returns the default config if the file doesn't exist or can't be parsed.
    pub fn load(&self) -> AppConfig {
        match self.try_load() {
            Ok(Some(config)) => {
                tracing::info!("Loaded config from {}", self.path.display());
                config
            }
            Ok(None) => {
                tracing::info!("No config at {}, using defaults", self.path.display());
                AppConfig::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                AppConfig::default()
            }
        }
    }

    /// Strict variant of [`load`](Self::load): `Ok(None)` when no file exists
    pub fn try_load(&self) -> Result<Option<AppConfig>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Save settings as pretty-printed JSON
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(config)?;

        fs::write(&self.path, json).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!("Config written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join(CONFIG_FILE_NAME))
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.hotkey, "ctrl+shift+s");
        assert!(config.start_minimized);
        assert!(config.flash_screen);
        assert!(config.save_path.ends_with("NothingScreenshots"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.try_load().unwrap().is_none());
        assert_eq!(store.load(), AppConfig::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let config = AppConfig {
            hotkey: "alt+f9".to_string(),
            save_path: dir.path().join("shots"),
            start_minimized: false,
            flash_screen: false,
            quiet_when_minimized: false,
        };
        store.save(&config).unwrap();

        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_missing_key_falls_back_for_that_key_only() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"hotkey": "ctrl+alt+p", "save_path": "/tmp/caps", "start_minimized": false}"#,
        )
        .unwrap();

        let config = store.load();
        assert_eq!(config.hotkey, "ctrl+alt+p");
        assert_eq!(config.save_path, PathBuf::from("/tmp/caps"));
        assert!(!config.start_minimized);
        assert_eq!(config.flash_screen, AppConfig::default().flash_screen);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"hotkey": "f8", "theme": "dark"}"#).unwrap();

        assert_eq!(store.load().hotkey, "f8");
    }

    #[test]
    fn test_malformed_file_yields_full_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "hotkey = ctrl+shift+s").unwrap();

        assert!(matches!(store.try_load(), Err(ConfigError::Parse { .. })));
        assert_eq!(store.load(), AppConfig::default());
    }

    #[test]
    fn test_wrong_value_type_yields_full_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"hotkey": "f8", "flash_screen": "yes"}"#).unwrap();

        assert_eq!(store.load(), AppConfig::default());
    }

    #[test]
    fn test_status_suppression_follows_both_flags() {
        let mut config = AppConfig::default();
        assert!(config.status_suppressed());

        config.quiet_when_minimized = false;
        assert!(!config.status_suppressed());

        config.quiet_when_minimized = true;
        config.start_minimized = false;
        assert!(!config.status_suppressed());
    }

    #[test]
    fn test_ensure_save_dir_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");

        ensure_save_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // idempotent
        ensure_save_dir(&nested).unwrap();
    }
}
