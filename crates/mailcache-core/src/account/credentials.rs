//! Secure credential storage using system keyring.
//!
//! Account passwords may be left out of the configuration file and kept in
//! the platform's native credential storage instead:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

use super::Account;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailcache";

/// Credential type identifier for IMAP passwords.
const IMAP_CREDENTIAL: &str = "imap";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Neither the configuration nor the keyring holds a password.
    #[error("No IMAP password configured for {0}")]
    MissingPassword(String),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Generates the keyring entry key for an account's IMAP password.
fn credential_key(email: &str) -> String {
    format!("{IMAP_CREDENTIAL}_{}", email.to_lowercase())
}

/// Stores IMAP password securely in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_imap_password(email: &str, password: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, &credential_key(email))?;
    entry.set_password(password)?;
    debug!(account = email, "stored IMAP password in keyring");
    Ok(())
}

/// Retrieves IMAP password from the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn get_imap_password(email: &str) -> CredentialResult<Option<String>> {
    let entry = Entry::new(SERVICE_NAME, &credential_key(email))?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            debug!(account = email, "no IMAP password in keyring");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the password to log in with: the configured one, else the
/// keyring entry.
///
/// # Errors
///
/// Returns [`CredentialError::MissingPassword`] when neither source has one.
pub fn resolve_imap_password(account: &Account) -> CredentialResult<String> {
    if !account.imap.password.is_empty() {
        return Ok(account.imap.password.clone());
    }

    get_imap_password(&account.email)?
        .ok_or_else(|| CredentialError::MissingPassword(account.email.clone()))
}
