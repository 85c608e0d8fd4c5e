//! Named time windows relative to the caller's local clock.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime};

use super::QueryError;

/// A named, closed date window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    /// Display name, e.g. `"Last 3 days"`.
    pub name: &'static str,
    /// Window start.
    pub since: DateTime<FixedOffset>,
    /// Window end.
    pub until: DateTime<FixedOffset>,
}

impl TimeRange {
    /// All predefined windows as of `now`, in display order.
    #[must_use]
    pub fn all(now: DateTime<FixedOffset>) -> Vec<Self> {
        let today = now.date_naive();
        let yesterday = today - Duration::days(1);
        let midnight = at(now, today, 0);
        let yesterday_midnight = at(now, yesterday, 0);
        let week_start = today - Duration::days(i64::from(now.weekday().num_days_from_monday()));
        let this_week = at(now, week_start, 0);
        let last_week = at(now, week_start - Duration::days(7), 0);
        let second = Duration::seconds(1);

        vec![
            Self::new("Last hour", now - Duration::hours(1), now),
            Self::new("Today", midnight, now),
            Self::new("Yesterday", yesterday_midnight, midnight - second),
            Self::new("This morning", at(now, today, 6), at(now, today, 12)),
            Self::new(
                "Yesterday morning",
                at(now, yesterday, 6),
                at(now, yesterday, 12),
            ),
            Self::new("Last 3 days", now - Duration::days(3), now),
            Self::new("This week", this_week, now),
            Self::new("Last week", last_week, this_week - second),
            Self::new("Last 30 days", now - Duration::days(30), now),
        ]
    }

    /// Resolves a range name.
    ///
    /// An exact case-insensitive match wins; otherwise the first range
    /// whose name contains the input, or is contained in it, is used.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownTimeRange`] if nothing matches.
    pub fn parse(input: &str, now: DateTime<FixedOffset>) -> Result<Self, QueryError> {
        let wanted = input.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(QueryError::UnknownTimeRange(input.to_string()));
        }
        let ranges = Self::all(now);
        if let Some(range) = ranges.iter().find(|r| r.name.to_lowercase() == wanted) {
            return Ok(range.clone());
        }
        ranges
            .into_iter()
            .find(|r| {
                let name = r.name.to_lowercase();
                name.contains(&wanted) || wanted.contains(&name)
            })
            .ok_or_else(|| QueryError::UnknownTimeRange(input.to_string()))
    }

    /// Window covering the last `days` days up to `now`.
    ///
    /// `None` when the start falls outside the representable date range.
    #[must_use]
    pub fn last_days(
        days: u32,
        now: DateTime<FixedOffset>,
    ) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let since = now.checked_sub_signed(Duration::days(i64::from(days)))?;
        Some((since, now))
    }

    const fn new(
        name: &'static str,
        since: DateTime<FixedOffset>,
        until: DateTime<FixedOffset>,
    ) -> Self {
        Self { name, since, until }
    }
}

/// `hour`:00 on `date` in `now`'s offset.
fn at(now: DateTime<FixedOffset>, date: NaiveDate, hour: u32) -> DateTime<FixedOffset> {
    let offset = *now.offset();
    let local = date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour));
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // Wednesday.
    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-15T14:30:00+02:00").unwrap()
    }

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn exact_names_resolve() {
        let today = TimeRange::parse("today", now()).unwrap();
        assert_eq!(today.since, ts("2024-05-15T00:00:00+02:00"));
        assert_eq!(today.until, now());

        let yesterday = TimeRange::parse("Yesterday", now()).unwrap();
        assert_eq!(yesterday.since, ts("2024-05-14T00:00:00+02:00"));
        assert_eq!(yesterday.until, ts("2024-05-14T23:59:59+02:00"));
    }

    #[test]
    fn weeks_start_on_monday() {
        let this_week = TimeRange::parse("this week", now()).unwrap();
        assert_eq!(this_week.since, ts("2024-05-13T00:00:00+02:00"));

        let last_week = TimeRange::parse("last week", now()).unwrap();
        assert_eq!(last_week.since, ts("2024-05-06T00:00:00+02:00"));
        assert_eq!(last_week.until, ts("2024-05-12T23:59:59+02:00"));
    }

    #[test]
    fn last_days_out_of_range() {
        let (since, until) = TimeRange::last_days(2, now()).unwrap();
        assert_eq!(since, ts("2024-05-13T14:30:00+02:00"));
        assert_eq!(until, now());
        assert!(TimeRange::last_days(u32::MAX, now()).is_none());
    }

    #[test]
    fn mornings() {
        let morning = TimeRange::parse("this morning", now()).unwrap();
        assert_eq!(morning.since, ts("2024-05-15T06:00:00+02:00"));
        assert_eq!(morning.until, ts("2024-05-15T12:00:00+02:00"));
    }

    #[test]
    fn partial_match_and_unknown() {
        assert_eq!(TimeRange::parse("hour", now()).unwrap().name, "Last hour");
        assert_eq!(TimeRange::parse("30 days", now()).unwrap().name, "Last 30 days");
        assert!(matches!(
            TimeRange::parse("fortnight", now()),
            Err(QueryError::UnknownTimeRange(_))
        ));
        assert!(TimeRange::parse("  ", now()).is_err());
    }
}
