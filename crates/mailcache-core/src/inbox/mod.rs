//! Local inbox store.
//!
//! Each account's mail is kept as a JSON snapshot ordered newest first.
//! Writers serialize through [`InboxStore::lock`].

mod lock;
mod merge;
mod model;
mod store;

pub use lock::{AccountLock, STALE_AFTER};
pub use merge::{dedup_emails, merge, sort_newest_first};
pub use model::{
    Email, INBOX_SCHEMA_VERSION, InboxData, extract_address, extract_name, normalize_message_id,
    unknown_date,
};
pub use store::{ARCHIVE_FILE, INBOX_FILE, InboxStore};
