//! Application configuration.
//!
//! Stored as JSON at `<config dir>/mailcache/config.json`. A missing file
//! yields the defaults; missing fields take their defaults and unknown
//! fields are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::Account;
use crate::error::{Error, Result};

/// Search strategy as written in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncModeSetting {
    /// Search the whole folder on every sync.
    #[default]
    Full,
    /// Search from the last stored email date minus an overlap.
    Incremental,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configured accounts.
    pub accounts: Vec<Account>,
    /// Account used when none is named.
    pub default_account: Option<String>,
    /// Root of per-account data; defaults to `<data dir>/mailcache`.
    pub data_dir: Option<PathBuf>,
    /// Start a background sync from read commands when the cache is old.
    pub auto_sync: bool,
    /// Age after which the cache counts as old.
    pub auto_sync_interval_hours: u64,
    /// Message limit for background syncs.
    pub auto_sync_limit: usize,
    /// Deadline for the remote part of a sync, 0 for none.
    pub sync_timeout_secs: u64,
    /// Search strategy.
    pub sync_mode: SyncModeSetting,
    /// Overlap window for incremental syncs.
    pub incremental_overlap_hours: u64,
    /// Refresh the archive mirror after each sync.
    pub mirror_after_sync: bool,
    /// Remote folder to mirror.
    pub folder: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            default_account: None,
            data_dir: None,
            auto_sync: true,
            auto_sync_interval_hours: 24,
            auto_sync_limit: 50,
            sync_timeout_secs: 300,
            sync_mode: SyncModeSetting::Full,
            incremental_overlap_hours: 6,
            mirror_after_sync: false,
            folder: "INBOX".to_string(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailcache")
            .join("config.json")
    }

    /// Loads the config at `path`, or the defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Writes the config to `path` as pretty JSON, creating parent dirs.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// Root directory for per-account data.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mailcache")
        })
    }

    /// Looks up an account by email, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if no account matches.
    pub fn account(&self, email: &str) -> Result<&Account> {
        self.accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .ok_or_else(|| Error::AccountNotFound(email.to_string()))
    }

    /// The named account, else the default account, else the only one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if nothing can be chosen.
    pub fn select_account(&self, email: Option<&str>) -> Result<&Account> {
        if let Some(email) = email.or(self.default_account.as_deref()) {
            return self.account(email);
        }
        match self.accounts.as_slice() {
            [only] => Ok(only),
            [] => Err(Error::AccountNotFound("no accounts configured".to_string())),
            _ => Err(Error::AccountNotFound(
                "several accounts configured; pass --account or set default_account".to_string(),
            )),
        }
    }

    /// Auto-sync interval as a duration.
    #[must_use]
    pub const fn auto_sync_interval(&self) -> Duration {
        Duration::from_secs(self.auto_sync_interval_hours * 3600)
    }
}
