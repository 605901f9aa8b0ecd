use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("keydrill"),
            )
        } else {
            ProjectDirs::from("", "", "keydrill")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    /// Lesson history database.
    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.db"))
    }

    /// Directory holding the saved plan and practice-text files.
    pub fn store_dir() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("store"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "keydrill").map(|pd| pd.config_dir().join("config.json"))
    }
}
