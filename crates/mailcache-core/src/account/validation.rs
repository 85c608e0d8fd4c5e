//! Account validation.

use super::model::Account;

/// Validation error for account configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Email address is empty.
    EmptyEmail,
    /// Email address format is invalid.
    InvalidEmail,
    /// Email address cannot be used as a directory name.
    UnsafeEmail,
    /// IMAP host is empty.
    EmptyImapHost,
    /// IMAP username is empty and cannot fall back to the email.
    EmptyImapUsername,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyEmail => "Email address is required",
            Self::InvalidEmail => "Invalid email address format",
            Self::UnsafeEmail => "Email address contains path characters",
            Self::EmptyImapHost => "IMAP server is required",
            Self::EmptyImapUsername => "IMAP username is required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyEmail | Self::InvalidEmail | Self::UnsafeEmail => "email",
            Self::EmptyImapHost => "imap_host",
            Self::EmptyImapUsername => "imap_username",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an account configuration.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
/// Passwords are not checked here since they may live in the keyring.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_account(account: &Account) -> ValidationResult {
    let mut errors = Vec::new();

    if account.email.trim().is_empty() {
        errors.push(ValidationError::EmptyEmail);
    } else {
        if !is_valid_email(&account.email) {
            errors.push(ValidationError::InvalidEmail);
        }
        if !is_path_safe(&account.email) {
            errors.push(ValidationError::UnsafeEmail);
        }
    }

    if account.imap.host.trim().is_empty() {
        errors.push(ValidationError::EmptyImapHost);
    }
    if account.login_username().trim().is_empty() {
        errors.push(ValidationError::EmptyImapUsername);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Basic email format validation.
fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

/// The email is used verbatim as a per-account directory name.
pub(crate) fn is_path_safe(email: &str) -> bool {
    !email.contains(['/', '\\', '\0']) && email != "." && email != ".." && !email.starts_with('.')
}
