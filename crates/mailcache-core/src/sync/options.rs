//! Sync settings.

use std::time::Duration;

use crate::config::{Config, SyncModeSetting};
use crate::service::DecodeOptions;

/// How the candidate set is searched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Search the whole folder on every sync.
    #[default]
    Full,
    /// Search from the last stored email date minus `overlap`.
    ///
    /// The overlap absorbs clock skew between the server and the dates
    /// recorded locally; duplicates inside the window are merged away.
    Incremental {
        /// Window re-searched before the last known email date.
        overlap: Duration,
    },
}

/// Settings for [`super::SyncEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Search strategy.
    pub mode: SyncMode,
    /// Remote folder to mirror.
    pub folder: String,
    /// Deadline for the remote part of one account's sync.
    pub timeout: Option<Duration>,
    /// Decoder settings.
    pub decode: DecodeOptions,
    /// Refresh the archive mirror after each successful sync.
    pub mirror_after_sync: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::Full,
            folder: "INBOX".to_string(),
            timeout: Some(Duration::from_secs(300)),
            decode: DecodeOptions::default(),
            mirror_after_sync: false,
        }
    }
}

impl SyncOptions {
    /// Builds options from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mode = match config.sync_mode {
            SyncModeSetting::Full => SyncMode::Full,
            SyncModeSetting::Incremental => SyncMode::Incremental {
                overlap: Duration::from_secs(config.incremental_overlap_hours * 3600),
            },
        };
        Self {
            mode,
            folder: config.folder.clone(),
            timeout: (config.sync_timeout_secs > 0)
                .then(|| Duration::from_secs(config.sync_timeout_secs)),
            decode: DecodeOptions::default(),
            mirror_after_sync: config.mirror_after_sync,
        }
    }
}
