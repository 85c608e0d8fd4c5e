//! Query and filter engine.
//!
//! Pure predicates over cached emails. Nothing here touches storage; the
//! caller loads a snapshot (or archive rows) and filters in memory.

mod args;
mod filter;
mod size;
mod time_range;

pub use args::{DEFAULT_LIMIT, DEFAULT_TOP_N, QueryRequest};
pub use filter::{EmailFilter, extract_domain};
pub use size::{format_size, parse_size};
pub use time_range::TimeRange;

use thiserror::Error;

/// Invalid query input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Size string that is not `<n>[k|kb|m|mb|g|gb]`.
    #[error("invalid size: {0:?}")]
    InvalidSize(String),

    /// Name that matches no predefined time range.
    #[error("unknown time range: {0:?}")]
    UnknownTimeRange(String),

    /// Value that does not parse for its key.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Argument key.
        key: String,
        /// Rejected value.
        value: String,
    },
}
