//! Account management module.
//!
//! Provides account configuration, credential lookup, and validation.

pub mod credentials;
mod model;
mod validation;

pub use credentials::{CredentialError, CredentialResult};
pub use model::{Account, ImapConfig, Security};
pub(crate) use validation::is_path_safe;
pub use validation::{ValidationError, ValidationResult, validate_account};
