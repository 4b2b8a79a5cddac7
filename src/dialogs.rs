/// Native dialogs and shell calls used by the settings window
use anyhow::{anyhow, Result};
use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageDialog, MessageLevel};
use std::path::{Path, PathBuf};

/// Open the native directory picker seeded at `start`.
/// Resolves to `None` if the user cancelled.
pub async fn pick_folder(start: PathBuf) -> Option<PathBuf> {
    let mut dialog = AsyncFileDialog::new().set_title("Choose screenshot folder");
    if start.is_dir() {
        dialog = dialog.set_directory(&start);
    }

    dialog.pick_folder().await.map(|handle| handle.path().to_path_buf())
}

/// Show an informational message box
pub async fn info(title: String, message: String) {
    AsyncMessageDialog::new()
        .set_level(MessageLevel::Info)
        .set_title(title)
        .set_description(message)
        .set_buttons(MessageButtons::Ok)
        .show()
        .await;
}

/// Show an error message box
pub async fn error(title: String, message: String) {
    AsyncMessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title(title)
        .set_description(message)
        .set_buttons(MessageButtons::Ok)
        .show()
        .await;
}

/// Blocking error box for failures before the UI loop exists.
/// Release builds on Windows have no console to print to.
pub fn fatal(title: &str, message: &str) {
    MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title(title)
        .set_description(message)
        .set_buttons(MessageButtons::Ok)
        .show();
}

/// Open `path` in the system file browser
pub fn open_folder(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(anyhow!("Screenshot folder does not exist: {}", path.display()));
    }

    open::that(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_folder_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = open_folder(&dir.path().join("missing")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
