//! Remote mailbox client seam.
//!
//! The sync engine only needs "connect, select, search, fetch". These
//! traits describe that surface so the IMAP implementation can be swapped
//! for a scripted one in tests.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::account::Account;

/// Errors that can occur during mail operations.
#[derive(Debug, thiserror::Error)]
pub enum MailServiceError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Folder could not be selected.
    #[error("Failed to select {folder}: {reason}")]
    Select {
        /// Folder name.
        folder: String,
        /// Server or transport error text.
        reason: String,
    },

    /// Search failed.
    #[error("Search failed: {0}")]
    Search(String),

    /// Fetch failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Other operation failed.
    #[error("Operation failed: {0}")]
    Operation(String),
}

/// Search criteria for candidate messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Only messages with an internal date on or after this day.
    pub since: Option<NaiveDate>,
}

impl SearchCriteria {
    /// Every message in the folder.
    #[must_use]
    pub const fn all() -> Self {
        Self { since: None }
    }

    /// Messages since the given day.
    #[must_use]
    pub const fn since(day: NaiveDate) -> Self {
        Self { since: Some(day) }
    }

    /// IMAP SEARCH query string.
    #[must_use]
    pub fn to_imap_query(&self) -> String {
        self.since.map_or_else(
            || "ALL".to_string(),
            |day| format!("SINCE {}", day.format("%-d-%b-%Y")),
        )
    }
}

/// One fetched message before decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    /// Sequence number in the session that fetched it.
    pub seq: u32,
    /// Flags as IMAP atoms, e.g. `\Seen`.
    pub flags: Vec<String>,
    /// Full RFC 5322 message, if the server returned one.
    pub body: Option<Vec<u8>>,
}

impl RawMessage {
    /// Whether the `\Seen` flag is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case("\\Seen"))
    }
}

/// Opens authenticated sessions for an account.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    /// Session type produced by this connector.
    type Session: MailboxSession;

    /// Connects and logs in.
    ///
    /// # Errors
    ///
    /// Returns [`MailServiceError::Connection`] or
    /// [`MailServiceError::Authentication`].
    async fn connect(&self, account: &Account) -> Result<Self::Session, MailServiceError>;
}

/// An authenticated mailbox session.
#[async_trait]
pub trait MailboxSession: Send {
    /// Selects a folder, returning its message count.
    async fn select(&mut self, folder: &str) -> Result<u32, MailServiceError>;

    /// Returns matching sequence numbers in ascending order.
    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>, MailServiceError>;

    /// Fetches flags and full bodies for the given sequence numbers.
    async fn fetch(&mut self, ids: &[u32]) -> Result<Vec<RawMessage>, MailServiceError>;

    /// Ends the session.
    async fn logout(&mut self) -> Result<(), MailServiceError>;
}

/// Formats sequence numbers as a compact IMAP sequence set (`1:3,7`).
#[must_use]
pub fn sequence_set(ids: &[u32]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut end) = (first, first);
    for id in iter {
        if id == end + 1 {
            end = id;
        } else {
            parts.push(format_range(start, end));
            (start, end) = (id, id);
        }
    }
    parts.push(format_range(start, end));
    parts.join(",")
}

fn format_range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}:{end}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn search_query_strings() {
        assert_eq!(SearchCriteria::all().to_imap_query(), "ALL");
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(SearchCriteria::since(day).to_imap_query(), "SINCE 5-Mar-2024");
    }

    #[test]
    fn sequence_set_compacts_runs() {
        assert_eq!(sequence_set(&[]), "");
        assert_eq!(sequence_set(&[4]), "4");
        assert_eq!(sequence_set(&[7, 1, 2, 3, 9, 10, 2]), "1:3,7,9:10");
    }

    #[test]
    fn seen_flag_detection() {
        let raw = RawMessage {
            flags: vec!["\\Flagged".to_string(), "\\seen".to_string()],
            ..RawMessage::default()
        };
        assert!(raw.is_seen());
        assert!(!RawMessage::default().is_seen());
    }
}
