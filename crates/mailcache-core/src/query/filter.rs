//! Conjunctive email filter.

use chrono::{DateTime, Duration, FixedOffset};

use super::size::format_size;
use crate::inbox::Email;

/// Predicates over cached emails. Every set predicate must hold.
///
/// The default filter has no predicates and matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailFilter {
    /// Lower date bound (one second of tolerance).
    pub since: Option<DateTime<FixedOffset>>,
    /// Upper date bound (one second of tolerance).
    pub until: Option<DateTime<FixedOffset>>,
    /// Case-insensitive substring of the From header.
    pub from: Option<String>,
    /// Case-insensitive substring of any To or Cc recipient.
    pub to: Option<String>,
    /// Case-insensitive substring of the subject.
    pub subject: Option<String>,
    /// Only unread emails.
    pub unread_only: bool,
    /// Only emails with attachments.
    pub has_attachments: bool,
    /// Minimum body size in bytes.
    pub min_size: Option<usize>,
    /// Maximum body size in bytes.
    pub max_size: Option<usize>,
    /// Sender domain must contain one of these.
    pub domains: Vec<String>,
    /// Sender domain must contain none of these.
    pub exclude_domains: Vec<String>,
    /// Subject or body must contain one of these.
    pub keywords: Vec<String>,
    /// Subject or body must contain none of these.
    pub exclude_words: Vec<String>,
    /// Name of the time range the date bounds came from, for display.
    pub range_label: Option<String>,
}

impl EmailFilter {
    /// Whether no predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.since.is_none()
            && self.until.is_none()
            && is_blank(self.from.as_deref())
            && is_blank(self.to.as_deref())
            && is_blank(self.subject.as_deref())
            && !self.unread_only
            && !self.has_attachments
            && self.min_size.is_none()
            && self.max_size.is_none()
            && self.domains.is_empty()
            && self.exclude_domains.is_empty()
            && self.keywords.is_empty()
            && self.exclude_words.is_empty()
    }

    /// Whether `email` satisfies every predicate.
    #[must_use]
    pub fn matches(&self, email: &Email) -> bool {
        let tolerance = Duration::seconds(1);
        if let Some(since) = self.since
            && email.date <= since - tolerance
        {
            return false;
        }
        if let Some(until) = self.until
            && email.date >= until + tolerance
        {
            return false;
        }

        if !contains_ci(&email.from, self.from.as_deref()) {
            return false;
        }
        if let Some(to) = self.to.as_deref().filter(|s| !s.trim().is_empty())
            && !email
                .to
                .iter()
                .chain(&email.cc)
                .any(|recipient| contains_ci(recipient, Some(to)))
        {
            return false;
        }
        if !contains_ci(&email.subject, self.subject.as_deref()) {
            return false;
        }

        if self.unread_only && email.is_read {
            return false;
        }
        if self.has_attachments && !email.has_attachments() {
            return false;
        }

        let size = email.body_size();
        if self.min_size.is_some_and(|min| size < min) || self.max_size.is_some_and(|max| size > max)
        {
            return false;
        }

        if !self.domains.is_empty() || !self.exclude_domains.is_empty() {
            let domain = email.sender_domain().to_lowercase();
            if !self.domains.is_empty() && !any_contained(&domain, &self.domains) {
                return false;
            }
            if any_contained(&domain, &self.exclude_domains) {
                return false;
            }
        }

        if !self.keywords.is_empty() || !self.exclude_words.is_empty() {
            let content = format!("{} {}", email.subject, email.body).to_lowercase();
            if !self.keywords.is_empty() && !any_contained(&content, &self.keywords) {
                return false;
            }
            if any_contained(&content, &self.exclude_words) {
                return false;
            }
        }

        true
    }

    /// Returns the matching emails in their original order.
    #[must_use]
    pub fn filter(&self, emails: &[Email]) -> Vec<Email> {
        if self.is_empty() {
            return emails.to_vec();
        }
        emails.iter().filter(|e| self.matches(e)).cloned().collect()
    }

    /// Borrowing variant of [`Self::filter`].
    #[must_use]
    pub fn filter_refs<'a>(&self, emails: &'a [Email]) -> Vec<&'a Email> {
        emails.iter().filter(|e| self.matches(e)).collect()
    }

    /// Short human-readable summary, `"all emails"` when empty.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(from) = self.from.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("from:{from}"));
        }
        if let Some(to) = self.to.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("to:{to}"));
        }
        if let Some(subject) = self.subject.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("subject:{subject}"));
        }
        if self.unread_only {
            parts.push("unread".to_string());
        }
        if let Some(label) = &self.range_label {
            parts.push(label.clone());
        } else {
            match (self.since, self.until) {
                (Some(since), Some(until)) => parts.push(format!(
                    "{} - {}",
                    since.format("%Y-%m-%d"),
                    until.format("%Y-%m-%d")
                )),
                (Some(since), None) => parts.push(format!("since {}", since.format("%Y-%m-%d"))),
                (None, Some(until)) => parts.push(format!("until {}", until.format("%Y-%m-%d"))),
                (None, None) => {}
            }
        }
        if self.has_attachments {
            parts.push("with attachments".to_string());
        }
        if !self.domains.is_empty() {
            parts.push(format!("domains:{}", self.domains.join(",")));
        }
        if !self.exclude_domains.is_empty() {
            parts.push(format!("not domains:{}", self.exclude_domains.join(",")));
        }
        if !self.keywords.is_empty() {
            parts.push(format!("keywords:{}", self.keywords.join(",")));
        }
        if !self.exclude_words.is_empty() {
            parts.push(format!("excluding:{}", self.exclude_words.join(",")));
        }
        match (self.min_size, self.max_size) {
            (Some(min), Some(max)) => {
                parts.push(format!("size:{}-{}", format_size(min), format_size(max)));
            }
            (Some(min), None) => parts.push(format!("size>{}", format_size(min))),
            (None, Some(max)) => parts.push(format!("size<{}", format_size(max))),
            (None, None) => {}
        }

        if parts.is_empty() {
            "all emails".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Domain part of an address header: text after `@`, cut at `>`.
///
/// Returns `""` when there is no `@`.
#[must_use]
pub fn extract_domain(header: &str) -> &str {
    let Some(at) = header.find('@') else {
        return "";
    };
    let rest = &header[at + 1..];
    rest.find('>').map_or(rest, |end| &rest[..end]).trim()
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

/// Whether `lowered` contains any non-blank entry of `needles`.
fn any_contained(lowered: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .map(|n| n.trim().to_lowercase())
        .any(|n| !n.is_empty() && lowered.contains(&n))
}
