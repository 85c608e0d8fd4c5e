//! Statistics data types.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// How often one address appears, and when it last did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactFrequency {
    /// Lowercased bare address.
    pub email: String,
    /// First display name seen for the address.
    pub name: String,
    /// Number of emails.
    pub count: usize,
    /// Newest email date involving the address.
    pub last_email: DateTime<FixedOffset>,
}

/// A counted value: a domain or a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frequency {
    /// Counted value.
    pub value: String,
    /// Occurrences.
    pub count: usize,
}

/// Oldest and newest email dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// Oldest date.
    pub start: DateTime<FixedOffset>,
    /// Newest date.
    pub end: DateTime<FixedOffset>,
}

/// Aggregate over a set of emails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailStats {
    /// Account the emails belong to, when known.
    pub account_email: Option<String>,
    /// Number of emails aggregated.
    pub total_emails: usize,
    /// Emails per lowercased sender address.
    pub emails_by_sender: BTreeMap<String, usize>,
    /// Emails per lowercased sender domain.
    pub emails_by_domain: BTreeMap<String, usize>,
    /// Emails per hour of day in each email's own offset.
    pub hourly: [usize; 24],
    /// Emails per weekday, Monday first.
    pub weekday: [usize; 7],
    /// Emails per `YYYY-MM-DD`.
    pub daily: BTreeMap<String, usize>,
    /// Emails per `YYYY-MM`.
    pub monthly: BTreeMap<String, usize>,
    /// Most frequent senders.
    pub top_senders: Vec<ContactFrequency>,
    /// Most frequent `To` recipients, excluding the account itself.
    pub top_recipients: Vec<ContactFrequency>,
    /// Most frequent sender domains.
    pub top_domains: Vec<Frequency>,
    /// Most frequent subject keywords.
    pub top_keywords: Vec<Frequency>,
    /// Attachments across all emails.
    pub attachment_count: usize,
    /// Emails with at least one attachment.
    pub emails_with_attachments: usize,
    /// Mean body length in bytes, 0 for no emails.
    pub mean_body_bytes: f64,
    /// Date span, `None` for no emails.
    pub date_range: Option<DateRange>,
}

impl Default for EmailStats {
    fn default() -> Self {
        Self {
            account_email: None,
            total_emails: 0,
            emails_by_sender: BTreeMap::new(),
            emails_by_domain: BTreeMap::new(),
            hourly: [0; 24],
            weekday: [0; 7],
            daily: BTreeMap::new(),
            monthly: BTreeMap::new(),
            top_senders: Vec::new(),
            top_recipients: Vec::new(),
            top_domains: Vec::new(),
            top_keywords: Vec::new(),
            attachment_count: 0,
            emails_with_attachments: 0,
            mean_body_bytes: 0.0,
            date_range: None,
        }
    }
}

/// Settings for [`super::aggregate_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsOptions {
    /// Length of every top-N list.
    pub top_n: usize,
    /// Account address, excluded from recipient counts.
    pub account_email: Option<String>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            account_email: None,
        }
    }
}
