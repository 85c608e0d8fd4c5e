//! Inbox data models.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Current on-disk schema version of the inbox snapshot.
pub const INBOX_SCHEMA_VERSION: u32 = 1;

/// A cached email message.
///
/// Field aliases accept snapshots written by older releases, which used
/// Go-style capitalized keys and `null` for empty lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Email {
    /// Message-ID header without angle brackets. May be empty.
    #[serde(alias = "MessageID", deserialize_with = "nullable")]
    pub message_id: String,
    /// Raw From header (`Name <addr>` or bare address).
    #[serde(alias = "From", deserialize_with = "nullable")]
    pub from: String,
    /// To recipients.
    #[serde(alias = "To", deserialize_with = "nullable")]
    pub to: Vec<String>,
    /// CC recipients.
    #[serde(alias = "CC", deserialize_with = "nullable")]
    pub cc: Vec<String>,
    /// BCC recipients.
    #[serde(alias = "BCC", deserialize_with = "nullable")]
    pub bcc: Vec<String>,
    /// Subject line.
    #[serde(alias = "Subject", deserialize_with = "nullable")]
    pub subject: String,
    /// Server date; authoritative for ordering.
    #[serde(alias = "Date")]
    pub date: DateTime<FixedOffset>,
    /// In-Reply-To header without angle brackets.
    #[serde(alias = "InReplyTo", deserialize_with = "nullable")]
    pub in_reply_to: String,
    /// Plain text body (HTML when the message had no text part).
    #[serde(alias = "Body", deserialize_with = "nullable")]
    pub body: String,
    /// HTML body, if any.
    #[serde(alias = "BodyHTML", deserialize_with = "nullable_html")]
    pub body_html: Option<String>,
    /// Attachment filenames.
    #[serde(alias = "Attachments", deserialize_with = "nullable")]
    pub attachments: Vec<String>,
    /// Raw attachment bytes by filename, only kept when requested.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "nullable")]
    pub attachment_data: BTreeMap<String, Vec<u8>>,
    /// Whether the `\Seen` flag was set when fetched.
    pub is_read: bool,
    /// Sequence number from the session that fetched it. Never an identity.
    #[serde(skip)]
    pub seq: u32,
}

impl Default for Email {
    fn default() -> Self {
        Self {
            message_id: String::new(),
            from: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            date: unknown_date(),
            in_reply_to: String::new(),
            body: String::new(),
            body_html: None,
            attachments: Vec::new(),
            attachment_data: BTreeMap::new(),
            is_read: false,
            seq: 0,
        }
    }
}

impl Email {
    /// Key used to recognize the same message across fetches.
    ///
    /// The Message-ID (angle brackets ignored) when present, otherwise
    /// `subject_unixsecs_from`. The fallback is deterministic but can
    /// collide for distinct messages sharing all three fields.
    #[must_use]
    pub fn dedup_key(&self) -> Cow<'_, str> {
        let id = normalize_message_id(&self.message_id);
        if id.is_empty() {
            Cow::Owned(format!(
                "{}_{}_{}",
                self.subject,
                self.date.timestamp(),
                self.from
            ))
        } else {
            Cow::Borrowed(id)
        }
    }

    /// Bare sender address: the part inside `<...>` if present.
    #[must_use]
    pub fn sender_address(&self) -> &str {
        extract_address(&self.from)
    }

    /// Sender display name, empty when the header has none.
    #[must_use]
    pub fn sender_name(&self) -> &str {
        extract_name(&self.from)
    }

    /// Domain portion of the From header.
    #[must_use]
    pub fn sender_domain(&self) -> &str {
        crate::query::extract_domain(&self.from)
    }

    /// Body size in bytes.
    #[must_use]
    pub const fn body_size(&self) -> usize {
        self.body.len()
    }

    /// Whether any attachment is recorded.
    #[must_use]
    pub const fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Date used when a message carries no parseable Date header.
#[must_use]
pub fn unknown_date() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}

/// Strips surrounding whitespace and angle brackets from a Message-ID.
#[must_use]
pub fn normalize_message_id(value: &str) -> &str {
    value
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
}

/// Extracts the address between angle brackets, or the trimmed header.
#[must_use]
pub fn extract_address(header: &str) -> &str {
    if let (Some(start), Some(end)) = (header.find('<'), header.find('>'))
        && start < end
    {
        return header[start + 1..end].trim();
    }
    header.trim()
}

/// Extracts the display name in front of `<...>`, without quotes.
#[must_use]
pub fn extract_name(header: &str) -> &str {
    header
        .find('<')
        .map_or("", |idx| header[..idx].trim().trim_matches('"'))
}

/// Per-account snapshot persisted as `inbox.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxData {
    /// Snapshot schema version.
    pub version: u32,
    /// Account this snapshot belongs to.
    pub account_email: String,
    /// Wall-clock time of the last successful sync.
    pub last_fetch_time: Option<DateTime<Utc>>,
    /// Newest message date ever stored.
    pub last_email_date: Option<DateTime<FixedOffset>>,
    /// Always `emails.len()` after a save.
    pub total_emails: usize,
    /// Messages, newest first.
    #[serde(deserialize_with = "nullable")]
    pub emails: Vec<Email>,
    /// Incremented on every save; compared against the mirror.
    pub last_sync_version: u64,
}

impl Default for InboxData {
    fn default() -> Self {
        Self {
            version: INBOX_SCHEMA_VERSION,
            account_email: String::new(),
            last_fetch_time: None,
            last_email_date: None,
            total_emails: 0,
            emails: Vec::new(),
            last_sync_version: 0,
        }
    }
}

impl InboxData {
    /// Empty snapshot for an account that has never been synced.
    #[must_use]
    pub fn empty(account_email: &str) -> Self {
        Self {
            account_email: account_email.to_string(),
            ..Self::default()
        }
    }

    /// Recomputes the derived fields from `emails`.
    ///
    /// `last_email_date` never moves backwards: the previous value acts as
    /// a floor so that trimming old mail or a skewed server clock cannot
    /// regress it.
    pub fn refresh_derived(&mut self) {
        self.total_emails = self.emails.len();
        let newest = self.emails.iter().map(|e| e.date).max();
        self.last_email_date = match (self.last_email_date, newest) {
            (Some(prev), Some(newest)) => Some(prev.max(newest)),
            (prev, newest) => prev.or(newest),
        };
    }
}

/// Treats JSON `null` as the type's default value.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Older snapshots store a missing HTML body as `""`.
fn nullable_html<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|html| html.filter(|s| !s.is_empty()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn dedup_key_prefers_message_id() {
        let email = Email {
            message_id: "abc@host".to_string(),
            subject: "Hi".to_string(),
            ..Email::default()
        };
        assert_eq!(email.dedup_key(), "abc@host");

        let bracketed = Email {
            message_id: "<abc@host>".to_string(),
            ..Email::default()
        };
        assert_eq!(bracketed.dedup_key(), "abc@host");
    }

    #[test]
    fn dedup_key_falls_back_to_composite() {
        let email = Email {
            subject: "Hi".to_string(),
            from: "a@x.com".to_string(),
            date: at("2024-01-01T00:00:10Z"),
            ..Email::default()
        };
        assert_eq!(email.dedup_key(), "Hi_1704067210_a@x.com");
    }

    #[test]
    fn sender_parts() {
        let email = Email {
            from: "\"Jane Doe\" <jane@Example.com>".to_string(),
            ..Email::default()
        };
        assert_eq!(email.sender_address(), "jane@Example.com");
        assert_eq!(email.sender_name(), "Jane Doe");
        assert_eq!(email.sender_domain(), "Example.com");

        let bare = Email {
            from: " bob@y.org ".to_string(),
            ..Email::default()
        };
        assert_eq!(bare.sender_address(), "bob@y.org");
        assert_eq!(bare.sender_name(), "");
    }

    #[test]
    fn reads_legacy_snapshot_fields() {
        let json = r#"{
            "account_email": "me@x.com",
            "last_fetch_time": "0001-01-01T00:00:00Z",
            "emails": [{
                "ID": 7,
                "From": "a@x.com",
                "To": null,
                "Subject": "Old",
                "Date": "2024-01-02T03:04:05+02:00",
                "Body": "text",
                "BodyHTML": "",
                "Attachments": null,
                "AttachmentData": null,
                "MessageID": "m1",
                "InReplyTo": "",
                "Headers": null
            }],
            "some_future_field": true
        }"#;
        let data: InboxData = serde_json::from_str(json).unwrap();
        assert_eq!(data.version, INBOX_SCHEMA_VERSION);
        assert_eq!(data.emails.len(), 1);
        let email = &data.emails[0];
        assert_eq!(email.message_id, "m1");
        assert!(email.to.is_empty());
        assert!(email.body_html.is_none());
        assert_eq!(email.date, at("2024-01-02T01:04:05Z"));
        assert_eq!(email.seq, 0);
    }

    #[test]
    fn missing_fields_default() {
        let data: InboxData = serde_json::from_str("{}").unwrap();
        assert!(data.emails.is_empty());
        assert!(data.last_fetch_time.is_none());
        assert_eq!(data.last_sync_version, 0);
    }

    #[test]
    fn refresh_derived_never_regresses() {
        let mut data = InboxData::empty("me@x.com");
        data.last_email_date = Some(at("2024-05-01T00:00:00Z"));
        data.emails.push(Email {
            date: at("2024-04-01T00:00:00Z"),
            ..Email::default()
        });
        data.refresh_derived();
        assert_eq!(data.total_emails, 1);
        assert_eq!(data.last_email_date, Some(at("2024-05-01T00:00:00Z")));

        data.emails.push(Email {
            date: at("2024-06-01T00:00:00Z"),
            ..Email::default()
        });
        data.refresh_derived();
        assert_eq!(data.last_email_date, Some(at("2024-06-01T00:00:00Z")));
    }
}
