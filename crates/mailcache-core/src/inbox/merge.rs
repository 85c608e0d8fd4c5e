//! Merge and deduplication of email lists.
//!
//! Messages are immutable once sent, so two copies with the same dedup key
//! are treated as interchangeable. After the newest-first sort the first
//! copy wins. The sort is stable, so among copies with identical dates the
//! one from `existing` is kept.

use std::collections::HashSet;

use super::model::Email;

/// Merges `incoming` into `existing`, returning a deduplicated list
/// ordered newest first.
///
/// Idempotent: merging the same `incoming` twice yields the same list.
#[must_use]
pub fn merge(existing: Vec<Email>, incoming: Vec<Email>) -> Vec<Email> {
    let mut emails = existing;
    emails.extend(incoming);
    sort_newest_first(&mut emails);
    dedup_emails(&mut emails);
    emails
}

/// Stable sort by date, newest first.
pub fn sort_newest_first(emails: &mut [Email]) {
    emails.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Removes later occurrences of any dedup key already seen.
///
/// Returns the number of removed entries.
pub fn dedup_emails(emails: &mut Vec<Email>) -> usize {
    let before = emails.len();
    let mut seen = HashSet::with_capacity(before);
    emails.retain(|email| seen.insert(email.dedup_key().into_owned()));
    before - emails.len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, FixedOffset, TimeZone};
    use proptest::prelude::*;

    use super::*;

    fn email(id: &str, from: &str, date: &str) -> Email {
        Email {
            message_id: id.to_string(),
            from: from.to_string(),
            subject: format!("subject {id}"),
            date: DateTime::parse_from_rfc3339(date).unwrap(),
            ..Email::default()
        }
    }

    #[test]
    fn sorts_newest_first() {
        let merged = merge(
            Vec::new(),
            vec![
                email("1", "a@x.com", "2024-01-03T00:00:00Z"),
                email("2", "b@y.com", "2024-01-01T00:00:00Z"),
                email("3", "a@x.com", "2024-01-02T00:00:00Z"),
            ],
        );
        let ids: Vec<_> = merged.iter().map(|e| e.message_id.as_str()).collect();
        assert_eq!(ids, ["1", "3", "2"]);
    }

    #[test]
    fn same_message_id_collapses_regardless_of_seq() {
        let mut first = email("dup", "a@x.com", "2024-01-01T00:00:00Z");
        first.seq = 4;
        let mut second = first.clone();
        second.seq = 17;

        let merged = merge(vec![first], vec![second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].seq, 4);
    }

    #[test]
    fn newer_copy_wins_when_dates_differ() {
        let old = email("m", "a@x.com", "2024-01-01T00:00:00Z");
        let mut new = email("m", "a@x.com", "2024-01-05T00:00:00Z");
        new.body = "edited".to_string();

        let merged = merge(vec![old], vec![new]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].body, "edited");
    }

    #[test]
    fn empty_message_ids_use_composite_key() {
        let a = email("", "a@x.com", "2024-01-01T00:00:00Z");
        let mut b = a.clone();
        b.subject = "other".to_string();
        let c = a.clone();

        let mut emails = vec![a, b, c];
        assert_eq!(dedup_emails(&mut emails), 1);
        assert_eq!(emails.len(), 2);
    }

    #[test]
    fn merge_with_nothing_is_identity_on_sorted_input() {
        let existing = merge(
            Vec::new(),
            vec![
                email("1", "a@x.com", "2024-02-01T00:00:00Z"),
                email("2", "a@x.com", "2024-01-01T00:00:00Z"),
            ],
        );
        assert_eq!(merge(existing.clone(), Vec::new()), existing);
    }

    prop_compose! {
        fn arb_email()(
            id in prop::sample::select(vec!["", "a", "b", "c", "d", "e"]),
            subject in prop::sample::select(vec!["hello", "invoice", "re: hello"]),
            from in prop::sample::select(vec!["a@x.com", "b@y.com"]),
            secs in 0i64..20,
            offset_hours in -2i32..=2,
        ) -> Email {
            let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
            Email {
                message_id: id.to_string(),
                subject: subject.to_string(),
                from: from.to_string(),
                date: offset.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
                ..Email::default()
            }
        }
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(
            a in prop::collection::vec(arb_email(), 0..12),
            b in prop::collection::vec(arb_email(), 0..12),
        ) {
            let once = merge(a, b.clone());
            let twice = merge(once.clone(), b);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merge_output_sorted_and_unique(
            a in prop::collection::vec(arb_email(), 0..12),
            b in prop::collection::vec(arb_email(), 0..12),
        ) {
            let merged = merge(a, b);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].date >= pair[1].date);
            }
            let keys: HashSet<_> = merged.iter().map(Email::dedup_key).collect();
            prop_assert_eq!(keys.len(), merged.len());
        }
    }
}
