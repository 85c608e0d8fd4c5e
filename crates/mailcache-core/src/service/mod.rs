//! Remote mailbox access.
//!
//! [`mail`] defines the client seam the sync engine drives, [`imap`] the
//! production implementation and [`decode`] turns fetched bytes into
//! [`crate::inbox::Email`] records.

pub mod decode;
pub mod imap;
pub mod mail;

pub use decode::{DecodeError, DecodeOptions, decode_message, strip_html_tags};
pub use imap::{ImapConnector, ImapSession, ImapStream};
pub use mail::{
    MailServiceError, MailboxConnector, MailboxSession, RawMessage, SearchCriteria, sequence_set,
};
