//! Human-readable byte sizes.

use super::QueryError;

const KB: usize = 1024;
const MB: usize = KB * 1024;
const GB: usize = MB * 1024;

/// Parses sizes like `500`, `10k`, `1KB`, `2mb` or `1G` into bytes.
///
/// Suffixes are case-insensitive and binary (`1KB` is 1024 bytes).
///
/// # Errors
///
/// Returns [`QueryError::InvalidSize`] if the number part is not an
/// unsigned integer or the result overflows.
pub fn parse_size(input: &str) -> Result<usize, QueryError> {
    let lowered = input.trim().to_lowercase();
    let (number, multiplier) = [("kb", KB), ("k", KB), ("mb", MB), ("m", MB), ("gb", GB), ("g", GB)]
        .iter()
        .find_map(|(suffix, mult)| lowered.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((lowered.as_str(), 1));

    number
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| QueryError::InvalidSize(input.to_string()))
}

/// Formats a byte count with integer division: `512B`, `2KB`, `3MB`, `1GB`.
#[must_use]
pub fn format_size(bytes: usize) -> String {
    if bytes < KB {
        format!("{bytes}B")
    } else if bytes < MB {
        format!("{}KB", bytes / KB)
    } else if bytes < GB {
        format!("{}MB", bytes / MB)
    } else {
        format!("{}GB", bytes / GB)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixes() {
        assert_eq!(parse_size("500").unwrap(), 500);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size(" 10k ").unwrap(), 10 * 1024);
        assert_eq!(parse_size("2mb").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_size("big"), Err(QueryError::InvalidSize(_))));
        assert!(parse_size("1.5mb").is_err());
        assert!(parse_size("-3").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn formats_with_integer_division() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1024), "1KB");
        assert_eq!(format_size(2047), "1KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1GB");
    }
}
