//! Application paths for config and data.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application paths.
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory.
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the fwq application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("ai", "firmware", "firmware-quota") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/firmware-quota"),
                data: home.join(".local/share/firmware-quota"),
            }
        }
    }

    /// Path to the API key file.
    #[must_use]
    pub fn key_file(&self) -> PathBuf {
        self.config.join("env")
    }

    /// Default path to the CSV quota log.
    #[must_use]
    pub fn quota_log_file(&self) -> PathBuf {
        self.data.join("quota-log.csv")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_distinct() {
        let paths = AppPaths::new();
        assert_ne!(paths.key_file(), paths.quota_log_file());
        assert!(paths.key_file().ends_with("env"));
        assert!(paths.quota_log_file().ends_with("quota-log.csv"));
    }
}
