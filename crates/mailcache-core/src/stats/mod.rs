//! Stats aggregator.
//!
//! Pure, read-only summaries of an email slice: sender, domain and
//! recipient frequencies, time histograms and subject keywords.

mod aggregate;
mod model;
mod report;

pub use aggregate::{aggregate, aggregate_with};
pub use model::{ContactFrequency, DateRange, EmailStats, Frequency, StatsOptions};
