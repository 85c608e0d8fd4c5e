//! Archive mirror.
//!
//! A per-account `SQLite` copy of the inbox snapshot for SQL-style queries.
//! It is eventually consistent: it only changes when [`sync_mirror`] (or
//! [`ArchiveRepository::sync_from_inbox`]) replays the snapshot, and
//! [`ArchiveRepository::is_stale`] reports when it lags behind.

mod model;
mod repository;

pub use model::{ArchiveQuery, ArchiveStats, MirrorReport, SyncMetadata};
pub use repository::ArchiveRepository;

use crate::Result;
use crate::inbox::InboxStore;

/// Replays an account's current snapshot into its archive database.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded or the mirror
/// transaction fails.
pub async fn sync_mirror(store: &InboxStore, account: &str) -> Result<MirrorReport> {
    let inbox = store.load(account).await?;
    let repo = ArchiveRepository::open(&store.archive_path(account)?).await?;
    let report = repo.sync_from_inbox(&inbox).await;
    repo.close().await;
    report
}

/// Opens an account's archive database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub async fn open_archive(store: &InboxStore, account: &str) -> Result<ArchiveRepository> {
    ArchiveRepository::open(&store.archive_path(account)?).await
}
