//! Error types for the core library.

use std::time::Duration;

use thiserror::Error;

use crate::account::ValidationError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote mailbox operation failed.
    #[error("Mail service error: {0}")]
    Mail(#[from] crate::service::MailServiceError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Account failed validation.
    #[error("Invalid account {account}: {}", format_validation(.errors))]
    Validation {
        /// Account email the errors belong to.
        account: String,
        /// Every problem found.
        errors: Vec<ValidationError>,
    },

    /// A sync did not finish before its deadline.
    #[error("Sync for {account} timed out after {timeout:?}")]
    Timeout {
        /// Account being synced.
        account: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// Another writer holds the account's inbox lock.
    #[error("Inbox for {0} is locked by another process")]
    Locked(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::account::credentials::CredentialError),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field(), e.message()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
