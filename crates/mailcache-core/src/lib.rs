//! # mailcache-core
//!
//! Local email cache and sync engine.
//!
//! This crate provides:
//! - Account configuration, validation and keyring credentials
//! - An IMAP client behind the [`service::MailboxConnector`] seam
//! - MIME decoding into the cached [`inbox::Email`] model
//! - The per-account JSON inbox snapshot with atomic, locked writes
//! - Sync orchestration (full or incremental) with merge and dedup
//! - A per-account `SQLite` archive mirror
//! - In-memory query filters and statistics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod archive;
pub mod config;
mod error;
pub mod inbox;
pub mod query;
pub mod service;
pub mod stats;
pub mod sync;

pub use account::credentials;
pub use account::{
    Account, CredentialError, CredentialResult, ImapConfig, Security, ValidationError,
    ValidationResult, validate_account,
};
pub use archive::{ArchiveQuery, ArchiveRepository, ArchiveStats, MirrorReport, SyncMetadata};
pub use config::{Config, SyncModeSetting};
pub use error::{Error, Result};
pub use inbox::{Email, InboxData, InboxStore};
pub use query::{EmailFilter, QueryError, QueryRequest, TimeRange, format_size, parse_size};
pub use service::{ImapConnector, MailServiceError, MailboxConnector, MailboxSession};
pub use stats::{EmailStats, StatsOptions, aggregate, aggregate_with};
pub use sync::{SyncEngine, SyncMode, SyncOptions, SyncReport};
