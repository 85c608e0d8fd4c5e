//! File-backed inbox store, one directory per account.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/<account email>/inbox.json
//! <data_dir>/<account email>/inbox.lock
//! <data_dir>/<account email>/archive.db
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::lock::{AccountLock, LockRegistry};
use super::model::InboxData;
use crate::account::is_path_safe;
use crate::error::{Error, Result};

/// Snapshot file name.
pub const INBOX_FILE: &str = "inbox.json";
/// Archive mirror database file name.
pub const ARCHIVE_FILE: &str = "archive.db";
const LOCK_FILE: &str = "inbox.lock";

/// Owns the per-account JSON snapshots.
///
/// Clones share the same in-process lock registry.
#[derive(Debug, Clone)]
pub struct InboxStore {
    data_dir: PathBuf,
    locks: Arc<LockRegistry>,
}

impl InboxStore {
    /// Creates a store rooted at `data_dir`. Nothing is touched on disk yet.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Arc::new(LockRegistry::default()),
        }
    }

    /// Root data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one account's files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address cannot be a directory name.
    pub fn account_dir(&self, account: &str) -> Result<PathBuf> {
        if account.is_empty() || !is_path_safe(account) {
            return Err(Error::Config(format!(
                "account {account:?} cannot be used as a directory name"
            )));
        }
        Ok(self.data_dir.join(account))
    }

    /// Path of the account's snapshot.
    ///
    /// # Errors
    ///
    /// See [`Self::account_dir`].
    pub fn inbox_path(&self, account: &str) -> Result<PathBuf> {
        Ok(self.account_dir(account)?.join(INBOX_FILE))
    }

    /// Path of the account's archive mirror database.
    ///
    /// # Errors
    ///
    /// See [`Self::account_dir`].
    pub fn archive_path(&self, account: &str) -> Result<PathBuf> {
        Ok(self.account_dir(account)?.join(ARCHIVE_FILE))
    }

    /// Takes the single-writer lock for an account.
    ///
    /// Waits for other tasks in this process; fails fast if another process
    /// holds a fresh lock file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] or an I/O error.
    pub async fn lock(&self, account: &str) -> Result<AccountLock> {
        let dir = self.account_dir(account)?;
        create_private_dir(&dir).await?;
        self.locks.acquire(account, dir.join(LOCK_FILE)).await
    }

    /// Loads an account's snapshot, or an empty one if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self, account: &str) -> Result<InboxData> {
        let path = self.inbox_path(account)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(account, "no inbox snapshot yet");
                return Ok(InboxData::empty(account));
            }
            Err(e) => return Err(e.into()),
        };

        let mut data: InboxData = serde_json::from_slice(&bytes)?;
        if data.account_email.is_empty() {
            data.account_email = account.to_string();
        }
        debug!(account, count = data.emails.len(), "loaded inbox snapshot");
        Ok(data)
    }

    /// Writes an account's snapshot.
    ///
    /// Derived fields are recomputed first and `last_sync_version` is
    /// bumped. The file is written to a temporary sibling with owner-only
    /// permissions and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub async fn save(&self, account: &str, data: &mut InboxData) -> Result<()> {
        let dir = self.account_dir(account)?;
        create_private_dir(&dir).await?;

        data.account_email = account.to_string();
        data.refresh_derived();
        data.last_sync_version += 1;

        let json = serde_json::to_vec_pretty(data)?;
        let path = dir.join(INBOX_FILE);
        let tmp = dir.join(format!("{INBOX_FILE}.tmp"));

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;

        debug!(
            account,
            count = data.total_emails,
            version = data.last_sync_version,
            "saved inbox snapshot"
        );
        Ok(())
    }

    /// Lists accounts that have a snapshot on disk, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory exists but cannot be read.
    pub async fn list_accounts(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut accounts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if tokio::fs::try_exists(entry.path().join(INBOX_FILE)).await? {
                accounts.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        accounts.sort();
        Ok(accounts)
    }

    /// Removes emails older than `max_age`, returning how many were dropped.
    ///
    /// Emails dated exactly at the cutoff are removed. The snapshot is only
    /// rewritten when something changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock, load or save fails.
    pub async fn cleanup_older_than(&self, account: &str, max_age: Duration) -> Result<usize> {
        let _lock = self.lock(account).await?;
        let mut data = self.load(account).await?;

        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| Error::Config(format!("invalid cleanup age: {e}")))?;
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .ok_or_else(|| Error::Config(format!("cleanup age {max_age} is out of range")))?;

        let before = data.emails.len();
        data.emails.retain(|email| email.date > cutoff);
        let removed = before - data.emails.len();

        if removed > 0 {
            self.save(account, &mut data).await?;
            info!(account, removed, remaining = data.total_emails, "cleaned up old emails");
        }
        Ok(removed)
    }
}

async fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await?;
    Ok(())
}
