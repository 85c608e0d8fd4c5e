//! Markdown rendering of [`EmailStats`].

use std::fmt::Write as _;

use super::model::{ContactFrequency, EmailStats};

const BAR_WIDTH: usize = 20;

impl EmailStats {
    /// Renders the statistics as a Markdown report.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        match &self.account_email {
            Some(account) => {
                let _ = writeln!(md, "# Email Statistics for {account}\n");
            }
            None => md.push_str("# Email Statistics\n\n"),
        }

        md.push_str("## Overview\n\n");
        let _ = writeln!(md, "- **Total Emails**: {}", self.total_emails);
        if let Some(range) = self.date_range {
            let _ = writeln!(
                md,
                "- **Date Range**: {} to {}",
                range.start.format("%Y-%m-%d"),
                range.end.format("%Y-%m-%d")
            );
        }
        let _ = writeln!(
            md,
            "- **With Attachments**: {} ({} files)",
            self.emails_with_attachments, self.attachment_count
        );
        let _ = writeln!(md, "- **Mean Body Size**: {:.0} bytes\n", self.mean_body_bytes);

        contact_table(&mut md, "Top Senders", "Sender", &self.top_senders);
        contact_table(&mut md, "Top Recipients", "Recipient", &self.top_recipients);

        if !self.top_domains.is_empty() {
            md.push_str("## Top Domains\n\n| Rank | Domain | Emails |\n|------|--------|--------|\n");
            for (rank, domain) in self.top_domains.iter().enumerate() {
                let _ = writeln!(md, "| {} | {} | {} |", rank + 1, domain.value, domain.count);
            }
            md.push('\n');
        }

        if !self.top_keywords.is_empty() {
            md.push_str("## Top Subject Keywords\n\n| Keyword | Count |\n|---------|-------|\n");
            for keyword in &self.top_keywords {
                let _ = writeln!(md, "| {} | {} |", keyword.value, keyword.count);
            }
            md.push('\n');
        }

        if self.total_emails > 0 {
            self.hourly_table(&mut md);
        }

        if !self.monthly.is_empty() {
            md.push_str("## Emails by Month\n\n| Month | Emails |\n|-------|--------|\n");
            for (month, count) in &self.monthly {
                let _ = writeln!(md, "| {month} | {count} |");
            }
            md.push('\n');
        }

        md
    }

    fn hourly_table(&self, md: &mut String) {
        let max = self.hourly.iter().copied().max().unwrap_or(0);
        md.push_str("## Emails by Hour of Day\n\n| Hour | Emails | |\n|------|--------|---|\n");
        for (hour, &count) in self.hourly.iter().enumerate() {
            let bar = if max > 0 {
                "█".repeat(count * BAR_WIDTH / max)
            } else {
                String::new()
            };
            let _ = writeln!(md, "| {hour:02}:00 | {count} | {bar} |");
        }
        md.push('\n');
    }
}

fn contact_table(md: &mut String, title: &str, column: &str, contacts: &[ContactFrequency]) {
    if contacts.is_empty() {
        return;
    }
    let _ = writeln!(md, "## {title}\n");
    let _ = writeln!(md, "| Rank | {column} | Name | Emails | Last Email |");
    md.push_str("|------|------|------|--------|------------|\n");
    for (rank, contact) in contacts.iter().enumerate() {
        let name = if contact.name.is_empty() {
            "_No name_"
        } else {
            contact.name.as_str()
        };
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {} |",
            rank + 1,
            contact.email,
            name,
            contact.count,
            contact.last_email.format("%Y-%m-%d")
        );
    }
    md.push('\n');
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::DateTime;

    use crate::inbox::Email;
    use crate::stats::{StatsOptions, aggregate_with};

    #[test]
    fn renders_sections() {
        let email = Email {
            message_id: "1".to_string(),
            from: "Jane <jane@x.com>".to_string(),
            subject: "Budget review".to_string(),
            date: DateTime::parse_from_rfc3339("2024-03-04T09:15:00Z").unwrap(),
            ..Email::default()
        };
        let stats = aggregate_with(
            &[email],
            &StatsOptions {
                top_n: 5,
                account_email: Some("me@x.com".to_string()),
            },
        );
        let md = stats.to_markdown();
        assert!(md.starts_with("# Email Statistics for me@x.com"));
        assert!(md.contains("- **Total Emails**: 1"));
        assert!(md.contains("| 1 | jane@x.com | Jane | 1 | 2024-03-04 |"));
        assert!(md.contains("| 09:00 | 1 | ████████████████████ |"));
        assert!(md.contains("| 2024-03 | 1 |"));
        assert!(!md.contains("Top Recipients"));
    }

    #[test]
    fn empty_stats_render_overview_only() {
        let md = aggregate_with(&[], &StatsOptions::default()).to_markdown();
        assert!(md.contains("- **Total Emails**: 0"));
        assert!(!md.contains("Hour of Day"));
    }
}
