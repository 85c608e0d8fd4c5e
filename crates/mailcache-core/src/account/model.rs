//! Account model types.

use serde::{Deserialize, Serialize};

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
        }
    }
}

/// IMAP server configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 993 for TLS, 143 otherwise).
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Username for authentication. Empty means "use the account email".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Password for authentication. Empty means "look it up in the keyring".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl ImapConfig {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(security: Security) -> u16 {
        match security {
            Security::None => 143,
            Security::Tls => 993,
        }
    }
}

impl std::fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A mailbox account whose inbox is mirrored locally.
///
/// The email address is the partition key for everything stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Display name for the account.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Provider key (`gmail`, `fastmail`, ...), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// IMAP configuration.
    pub imap: ImapConfig,
}

impl Account {
    /// Create account with common defaults for well-known providers.
    #[must_use]
    pub fn with_email(email: &str) -> Self {
        let mut account = Self {
            email: email.to_string(),
            ..Default::default()
        };

        if let Some(domain) = email.split('@').nth(1) {
            let domain = domain.to_lowercase();
            let known = match domain.as_str() {
                "gmail.com" | "googlemail.com" => Some(("gmail", "Gmail", "imap.gmail.com")),
                "fastmail.com" | "fastmail.fm" => {
                    Some(("fastmail", "Fastmail", "imap.fastmail.com"))
                }
                "zoho.com" | "zohomail.com" => Some(("zoho", "Zoho Mail", "imap.zoho.com")),
                "outlook.com" | "hotmail.com" | "live.com" => {
                    Some(("outlook", "Outlook", "outlook.office365.com"))
                }
                "yahoo.com" | "ymail.com" => Some(("yahoo", "Yahoo", "imap.mail.yahoo.com")),
                "icloud.com" | "me.com" | "mac.com" => Some(("icloud", "iCloud", "imap.mail.me.com")),
                _ => None,
            };

            if let Some((provider, name, host)) = known {
                account.provider = Some(provider.to_string());
                account.name = name.to_string();
                account.imap.host = host.to_string();
                account.imap.port = ImapConfig::default_port(Security::Tls);
                account.imap.security = Security::Tls;
            } else {
                account.name = domain;
            }
        }

        account.imap.username = email.to_string();
        account
    }

    /// Username to authenticate with, falling back to the email address.
    #[must_use]
    pub fn login_username(&self) -> &str {
        if self.imap.username.trim().is_empty() {
            &self.email
        } else {
            &self.imap.username
        }
    }

    /// Port to connect to, falling back to the security mode's default.
    #[must_use]
    pub const fn imap_port(&self) -> u16 {
        if self.imap.port == 0 {
            ImapConfig::default_port(self.imap.security)
        } else {
            self.imap.port
        }
    }
}
