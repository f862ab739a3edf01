//! Filesystem locations used by modelvault

use std::path::{Path, PathBuf};

/// Name of the per-user directory under `$HOME`
pub const APP_DIR_NAME: &str = ".modelvault";

/// Subdirectory of the data root holding per-process scratch space
pub const TEMP_DIR_NAME: &str = "temp";

/// Subdirectory of the data root receiving saved inputs
pub const INPUTS_DIR_NAME: &str = "inputs";

/// Subdirectory of the data root receiving saved transcripts
pub const TRANSCRIPTS_DIR_NAME: &str = "transcripts";

/// Default models root name under the data root
pub const MODELS_DIR_NAME: &str = "models";

/// Per-user state directory (~/.modelvault)
///
/// Falls back to the current directory when the platform has no home.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Default data root for the desktop profile (~/.modelvault/data)
pub fn default_data_root() -> PathBuf {
    data_dir().join("data")
}

/// Ensure directory exists
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Expand a leading `~` or `~/` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Replace characters that are unsafe in a single filename component
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '\0' => '_',
            _ => c,
        })
        .collect()
}
