//! Single-pass aggregation.

use std::collections::HashMap;

use chrono::{Datelike, Timelike};

use super::model::{ContactFrequency, DateRange, EmailStats, Frequency, StatsOptions};
use crate::inbox::{Email, extract_address, extract_name};
use crate::query::extract_domain;

/// Subject words too common to be interesting.
const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "could", "does", "each", "from",
    "have", "here", "into", "just", "like", "more", "most", "only", "other", "over", "please",
    "some", "such", "than", "that", "their", "them", "then", "there", "these", "they", "this",
    "those", "very", "were", "what", "when", "where", "which", "while", "will", "with", "would",
    "your", "yours",
];

/// Aggregates with default options.
#[must_use]
pub fn aggregate(emails: &[Email]) -> EmailStats {
    aggregate_with(emails, &StatsOptions::default())
}

/// Aggregates `emails` in one pass.
///
/// Top-N lists are ordered by count descending, then by key ascending.
#[must_use]
pub fn aggregate_with(emails: &[Email], options: &StatsOptions) -> EmailStats {
    let mut stats = EmailStats {
        account_email: options.account_email.clone(),
        total_emails: emails.len(),
        ..EmailStats::default()
    };
    if emails.is_empty() {
        return stats;
    }

    let account = options.account_email.as_deref().map(str::to_lowercase);
    let mut senders: HashMap<String, ContactFrequency> = HashMap::new();
    let mut recipients: HashMap<String, ContactFrequency> = HashMap::new();
    let mut keywords: HashMap<String, usize> = HashMap::new();
    let mut body_bytes = 0usize;

    for email in emails {
        let sender = extract_address(&email.from).to_lowercase();
        if !sender.is_empty() {
            *stats.emails_by_sender.entry(sender.clone()).or_default() += 1;
            record_contact(&mut senders, sender, &email.from, email);
        }

        let domain = extract_domain(&email.from).to_lowercase();
        if !domain.is_empty() {
            *stats.emails_by_domain.entry(domain).or_default() += 1;
        }

        for recipient in &email.to {
            let address = extract_address(recipient).to_lowercase();
            if address.is_empty() || account.as_deref() == Some(address.as_str()) {
                continue;
            }
            record_contact(&mut recipients, address, recipient, email);
        }

        for word in subject_keywords(&email.subject) {
            *keywords.entry(word).or_default() += 1;
        }

        stats.hourly[email.date.hour() as usize] += 1;
        stats.weekday[email.date.weekday().num_days_from_monday() as usize] += 1;
        *stats
            .daily
            .entry(email.date.format("%Y-%m-%d").to_string())
            .or_default() += 1;
        *stats
            .monthly
            .entry(email.date.format("%Y-%m").to_string())
            .or_default() += 1;

        stats.attachment_count += email.attachments.len();
        if email.has_attachments() {
            stats.emails_with_attachments += 1;
        }
        body_bytes += email.body_size();

        stats.date_range = Some(match stats.date_range {
            None => DateRange {
                start: email.date,
                end: email.date,
            },
            Some(range) => DateRange {
                start: range.start.min(email.date),
                end: range.end.max(email.date),
            },
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let mean = body_bytes as f64 / emails.len() as f64;
    stats.mean_body_bytes = mean;

    stats.top_senders = top_contacts(senders, options.top_n);
    stats.top_recipients = top_contacts(recipients, options.top_n);
    stats.top_domains = top_counts(
        stats.emails_by_domain.iter().map(|(k, v)| (k.clone(), *v)),
        options.top_n,
    );
    stats.top_keywords = top_counts(keywords, options.top_n);
    stats
}

fn record_contact(
    counts: &mut HashMap<String, ContactFrequency>,
    address: String,
    header: &str,
    email: &Email,
) {
    let entry = counts
        .entry(address)
        .or_insert_with_key(|address| ContactFrequency {
            email: address.clone(),
            name: String::new(),
            count: 0,
            last_email: email.date,
        });
    entry.count += 1;
    entry.last_email = entry.last_email.max(email.date);
    if entry.name.is_empty() {
        extract_name(header).clone_into(&mut entry.name);
    }
}

/// Lowercased subject words longer than three characters, minus stop words.
fn subject_keywords(subject: &str) -> impl Iterator<Item = String> + '_ {
    subject
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 3)
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
}

fn top_contacts(counts: HashMap<String, ContactFrequency>, n: usize) -> Vec<ContactFrequency> {
    let mut contacts: Vec<_> = counts.into_values().collect();
    contacts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.email.cmp(&b.email)));
    contacts.truncate(n);
    contacts
}

fn top_counts(counts: impl IntoIterator<Item = (String, usize)>, n: usize) -> Vec<Frequency> {
    let mut entries: Vec<_> = counts
        .into_iter()
        .map(|(value, count)| Frequency { value, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries.truncate(n);
    entries
}
