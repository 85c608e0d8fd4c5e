//! Plain-text rendering for the terminal.

use chrono::{DateTime, Utc};
use mailcache_core::archive::{ArchiveStats, SyncMetadata};
use mailcache_core::sync::SyncReport;
use mailcache_core::{Email, format_size};

const FROM_WIDTH: usize = 28;
const SUBJECT_WIDTH: usize = 60;

pub struct AccountRow {
    pub email: String,
    pub configured: bool,
    pub is_default: bool,
    /// `host:port (security)` for configured accounts.
    pub server: Option<String>,
    pub total: usize,
    pub last_fetch: Option<DateTime<Utc>>,
}

pub fn print_sync_report(report: &SyncReport) {
    let newest = report
        .last_email_date
        .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string());
    print!(
        "{}: {} new, {} fetched, {} total (newest {newest})",
        report.account, report.new_count, report.fetched, report.total_emails
    );
    if report.skipped > 0 {
        print!(", {} undecodable", report.skipped);
    }
    println!();
}

pub fn print_email_table(emails: &[Email]) {
    if emails.is_empty() {
        println!("No emails found.");
        return;
    }
    for email in emails {
        let marker = if email.is_read { ' ' } else { '*' };
        let clip = if email.has_attachments() { '@' } else { ' ' };
        println!(
            "{marker}{clip} {}  {:<FROM_WIDTH$}  {}",
            email.date.format("%Y-%m-%d %H:%M"),
            truncate(&email.from, FROM_WIDTH),
            truncate(&email.subject, SUBJECT_WIDTH),
        );
    }
    println!("\n{} email(s)", emails.len());
}

pub fn print_archive_stats(
    account: &str,
    stats: &ArchiveStats,
    metadata: Option<&SyncMetadata>,
    stale: bool,
) {
    let day = |d: Option<DateTime<Utc>>| {
        d.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
    };
    println!("Archive for {account}");
    if let Some(path) = &stats.path {
        println!("  File:         {}", path.display());
    }
    println!(
        "  Size:         {}",
        format_size(usize::try_from(stats.size_bytes).unwrap_or(usize::MAX))
    );
    println!("  Emails:       {}", stats.total_emails);
    println!("  Oldest:       {}", day(stats.oldest));
    println!("  Newest:       {}", day(stats.newest));
    match metadata {
        Some(meta) => println!(
            "  Last mirror:  {} (inbox version {})",
            meta.last_sync_time.format("%Y-%m-%d %H:%M:%S"),
            meta.sync_version
        ),
        None => println!("  Last mirror:  never"),
    }
    if stale {
        println!("  Status:       behind the inbox, run `mailcache sync-db`");
    } else {
        println!("  Status:       up to date");
    }
}

pub fn print_accounts(rows: &[AccountRow]) {
    if rows.is_empty() {
        println!("No accounts configured or cached.");
        return;
    }
    for row in rows {
        let mut tags = Vec::new();
        if row.is_default {
            tags.push("default");
        }
        if !row.configured {
            tags.push("not configured");
        }
        let last = row.last_fetch.map_or_else(
            || "never synced".to_string(),
            |t| format!("synced {}", t.format("%Y-%m-%d %H:%M")),
        );
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        print!("{}{tags}: {} emails, {last}", row.email, row.total);
        match &row.server {
            Some(server) => println!(", {server}"),
            None => println!(),
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
