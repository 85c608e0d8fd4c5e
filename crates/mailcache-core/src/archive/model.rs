//! Archive mirror models.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Per-account row of the `sync_metadata` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMetadata {
    /// Account the row belongs to.
    pub account_email: String,
    /// When the mirror was last refreshed.
    pub last_sync_time: DateTime<Utc>,
    /// Snapshot size at that time.
    pub total_emails: i64,
    /// Snapshot's newest email date at that time.
    pub last_email_date: Option<DateTime<Utc>>,
    /// Snapshot `last_sync_version` that was mirrored.
    pub sync_version: i64,
}

/// Outcome of replaying a snapshot into the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    /// Rows inserted or rewritten.
    pub written: usize,
    /// Rows already identical.
    pub unchanged: usize,
    /// Rows that failed and were skipped.
    pub failed: usize,
}

/// Filters for querying the mirror. Empty fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveQuery {
    /// Substring of the From header.
    pub from: Option<String>,
    /// Substring of the subject.
    pub subject: Option<String>,
    /// Inclusive lower bound on the sent date.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the sent date.
    pub until: Option<DateTime<Utc>>,
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

/// Summary of the mirror database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Number of stored emails.
    pub total_emails: i64,
    /// Oldest sent date.
    pub oldest: Option<DateTime<Utc>>,
    /// Newest sent date.
    pub newest: Option<DateTime<Utc>>,
    /// Database size in bytes.
    pub size_bytes: u64,
    /// Database file, `None` for in-memory databases.
    pub path: Option<PathBuf>,
}
