//! Per-user settings. The only thing remembered between runs is which database
//! file was opened last, kept as plain text under the platform config dir.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories::BaseDirs;
use tracing::warn;

/// Vendor folder inside the platform configuration directory.
const VENDOR_DIR_NAME: &str = "nohales.org";
/// Application folder beneath the vendor folder.
const APP_DIR_NAME: &str = "people-registry";
const LATEST_DATABASE_FILE_NAME: &str = "latest-database-filename";
const LOG_FILE_NAME: &str = "people-registry.log";

#[derive(Debug, Clone)]
pub struct Config {
    dir: PathBuf,
}

impl Config {
    /// Resolve the configuration directory for the current user.
    pub fn new() -> Result<Self> {
        let base_dirs =
            BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
        Ok(Self::at(
            base_dirs.config_dir().join(VENDOR_DIR_NAME).join(APP_DIR_NAME),
        ))
    }

    /// Use an explicit directory instead of the platform default.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    /// Path of the database opened most recently, if one was ever recorded.
    pub fn latest_database_filename(&self) -> Option<PathBuf> {
        let contents = fs::read_to_string(self.latest_database_path()).ok()?;
        let trimmed = contents.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    /// Remember `path` for the next start. Failures only cost the user a
    /// prompt on the next launch, so they are logged and dropped.
    pub fn save_latest_database_filename(&self, path: &Path) {
        if let Err(err) = self.try_save_latest(path) {
            warn!(error = %err, "could not remember latest database");
        }
    }

    fn try_save_latest(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.latest_database_path(), path.to_string_lossy().as_bytes())
    }

    fn latest_database_path(&self) -> PathBuf {
        self.dir.join(LATEST_DATABASE_FILE_NAME)
    }
}
