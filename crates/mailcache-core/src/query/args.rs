//! `key=value` query arguments as typed by users on the command line.

use chrono::{DateTime, FixedOffset};

use super::{EmailFilter, QueryError, TimeRange, parse_size};
use crate::inbox::Email;

/// Default number of emails returned by a query.
pub const DEFAULT_LIMIT: usize = 100;

/// Default length of top-N lists.
pub const DEFAULT_TOP_N: usize = 10;

/// A parsed query: a filter plus presentation limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Predicates.
    pub filter: EmailFilter,
    /// Maximum emails returned, 0 for no limit.
    pub limit: usize,
    /// Length of top-N lists in stats.
    pub top_n: usize,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            filter: EmailFilter::default(),
            limit: DEFAULT_LIMIT,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl QueryRequest {
    /// Parses `key=value` tokens such as `from=boss`, `range=today`,
    /// `min-size=1kb` or `domains=x.com,y.org`.
    ///
    /// Keys are case-insensitive. Tokens without `=` and unknown keys are
    /// ignored. Relative ranges are resolved against `now`.
    ///
    /// # Errors
    ///
    /// Returns an error for values that do not parse, such as a bad size,
    /// number, or time range name.
    pub fn parse<S: AsRef<str>>(args: &[S], now: DateTime<FixedOffset>) -> Result<Self, QueryError> {
        let mut request = Self::default();
        for arg in args {
            let Some((key, value)) = arg.as_ref().split_once('=') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            let filter = &mut request.filter;

            match key.as_str() {
                "from" => filter.from = Some(value.to_string()),
                "to" => filter.to = Some(value.to_string()),
                "subject" => filter.subject = Some(value.to_string()),
                "limit" | "n" => request.limit = parse_number(&key, value)?,
                "top" | "top-n" => request.top_n = parse_number(&key, value)?,
                "days" => {
                    let days = parse_number(&key, value)?;
                    let (since, _) = TimeRange::last_days(days, now).ok_or_else(|| {
                        QueryError::InvalidValue {
                            key: key.clone(),
                            value: value.to_string(),
                        }
                    })?;
                    filter.since = Some(since);
                    filter.until = None;
                    filter.range_label = Some(format!("last {days} days"));
                }
                "range" => {
                    let range = TimeRange::parse(value, now)?;
                    filter.since = Some(range.since);
                    filter.until = Some(range.until);
                    filter.range_label = Some(range.name.to_string());
                }
                "unread" => filter.unread_only = is_truthy(value),
                "attachments" | "has-attachments" => filter.has_attachments = is_truthy(value),
                "min-size" => filter.min_size = Some(parse_size(value)?),
                "max-size" => filter.max_size = Some(parse_size(value)?),
                "domain" | "domains" => filter.domains = split_list(value),
                "exclude-domain" | "exclude-domains" => filter.exclude_domains = split_list(value),
                "keyword" | "keywords" => filter.keywords = split_list(value),
                "exclude" | "exclude-words" => filter.exclude_words = split_list(value),
                _ => {}
            }
        }
        Ok(request)
    }

    /// Filters `emails` and truncates to the limit, keeping order.
    #[must_use]
    pub fn apply(&self, emails: &[Email]) -> Vec<Email> {
        let mut matched = self.filter.filter(emails);
        if self.limit > 0 {
            matched.truncate(self.limit);
        }
        matched
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, QueryError> {
    value.parse().map_err(|_| QueryError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-15T14:30:00+00:00").unwrap()
    }

    #[test]
    fn defaults_without_arguments() {
        let request = QueryRequest::parse::<&str>(&[], now()).unwrap();
        assert_eq!(request, QueryRequest::default());
        assert!(request.filter.is_empty());
    }

    #[test]
    fn parses_common_keys() {
        let args = [
            "from=boss",
            "Unread=yes",
            "min-size=1kb",
            "domains=x.com, y.org",
            "limit=5",
            "top=3",
            "ignored",
            "color=blue",
        ];
        let request = QueryRequest::parse(&args, now()).unwrap();
        assert_eq!(request.filter.from.as_deref(), Some("boss"));
        assert!(request.filter.unread_only);
        assert_eq!(request.filter.min_size, Some(1024));
        assert_eq!(request.filter.domains, ["x.com", "y.org"]);
        assert_eq!(request.limit, 5);
        assert_eq!(request.top_n, 3);
    }

    #[test]
    fn days_and_ranges_set_bounds() {
        let request = QueryRequest::parse(&["days=7"], now()).unwrap();
        assert_eq!(
            request.filter.since,
            Some(DateTime::parse_from_rfc3339("2024-05-08T14:30:00+00:00").unwrap())
        );
        assert_eq!(request.filter.describe(), "last 7 days");

        let request = QueryRequest::parse(&["range=yesterday"], now()).unwrap();
        assert_eq!(request.filter.range_label.as_deref(), Some("Yesterday"));
        assert!(request.filter.until.is_some());
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(
            QueryRequest::parse(&["limit=lots"], now()),
            Err(QueryError::InvalidValue { .. })
        ));
        assert!(QueryRequest::parse(&["max-size=huge"], now()).is_err());
        assert!(QueryRequest::parse(&["range=someday"], now()).is_err());
    }

    #[test]
    fn days_beyond_the_calendar_are_errors() {
        let err = QueryRequest::parse(&["days=200000000"], now()).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidValue {
                key: "days".to_string(),
                value: "200000000".to_string(),
            }
        );
    }
}
