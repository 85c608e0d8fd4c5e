//! Sync orchestrator.
//!
//! Mirrors a remote folder into the local inbox snapshot. One account's
//! sync is a single call chain under the account's lock; multi-account
//! syncs run sequentially.

mod engine;
mod options;

pub use engine::{
    AccountSyncOutcome, SyncEngine, SyncReport, search_criteria, should_auto_sync,
};
pub use options::{SyncMode, SyncOptions};
