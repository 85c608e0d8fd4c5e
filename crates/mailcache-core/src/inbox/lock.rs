//! Single-writer lock per account.
//!
//! Two layers: an in-process async mutex keyed by account, and a lock file
//! next to the snapshot that keeps other processes out. A lock file older
//! than [`STALE_AFTER`] is assumed to belong to a crashed process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Age after which an abandoned lock file is broken.
pub const STALE_AFTER: Duration = Duration::from_secs(10 * 60);

/// Per-account async mutexes shared by every clone of a store.
///
/// Keyed by lock file path, so the mutex and the lock file always guard
/// the same account directory.
#[derive(Debug, Default)]
pub(crate) struct LockRegistry {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockRegistry {
    fn handle(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Waits for the in-process lock, then takes the lock file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] when a fresh lock file from another
    /// process exists.
    pub(crate) async fn acquire(&self, account: &str, path: PathBuf) -> Result<AccountLock> {
        let guard = self.handle(&path).lock_owned().await;
        create_lock_file(account, &path).await?;
        debug!(account, path = %path.display(), "acquired inbox lock");
        Ok(AccountLock {
            _guard: guard,
            path,
        })
    }
}

/// Held while an account's snapshot is being read, mutated and written.
///
/// Dropping it removes the lock file and releases the in-process mutex.
#[derive(Debug)]
pub struct AccountLock {
    _guard: OwnedMutexGuard<()>,
    path: PathBuf,
}

impl AccountLock {
    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AccountLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove inbox lock");
        }
    }
}

async fn create_lock_file(account: &str, path: &Path) -> Result<()> {
    for attempt in 0..2 {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(mut file) => {
                file.write_all(std::process::id().to_string().as_bytes())
                    .await?;
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt == 0 => {
                if !is_stale(path).await? {
                    return Err(Error::Locked(account.to_string()));
                }
                let holder = tokio::fs::read_to_string(path).await.unwrap_or_default();
                warn!(
                    account,
                    pid = holder.trim(),
                    "breaking stale inbox lock"
                );
                match tokio::fs::remove_file(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::Locked(account.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Locked(account.to_string()))
}

async fn is_stale(path: &Path) -> Result<bool> {
    let modified = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified()?,
        // Removed by its owner in the meantime.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    Ok(age > STALE_AFTER)
}
