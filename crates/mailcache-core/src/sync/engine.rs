//! Sync orchestration: remote search and fetch, merge, persist.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::options::{SyncMode, SyncOptions};
use crate::account::{Account, validate_account};
use crate::archive::{self, MirrorReport};
use crate::error::{Error, Result};
use crate::inbox::{Email, InboxData, InboxStore, merge};
use crate::service::{MailboxConnector, MailboxSession, SearchCriteria, decode_message};

/// Result of one account's sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Account that was synced.
    pub account: String,
    /// Net growth of the stored email list.
    pub new_count: usize,
    /// Messages fetched from the server.
    pub fetched: usize,
    /// Fetched messages that failed to decode.
    pub skipped: usize,
    /// Stored emails after the sync.
    pub total_emails: usize,
    /// Newest stored email date after the sync.
    pub last_email_date: Option<DateTime<FixedOffset>>,
}

/// Per-account result of [`SyncEngine::sync_all_accounts`].
#[derive(Debug)]
pub struct AccountSyncOutcome {
    /// Account email.
    pub account: String,
    /// What happened.
    pub result: Result<SyncReport>,
}

struct Fetched {
    emails: Vec<Email>,
    fetched: usize,
    skipped: usize,
}

/// Drives syncs for any [`MailboxConnector`].
#[derive(Debug)]
pub struct SyncEngine<C> {
    connector: C,
    store: InboxStore,
    options: SyncOptions,
}

impl<C: MailboxConnector> SyncEngine<C> {
    /// Creates an engine.
    pub const fn new(connector: C, store: InboxStore, options: SyncOptions) -> Self {
        Self {
            connector,
            store,
            options,
        }
    }

    /// The inbox store this engine writes to.
    pub const fn store(&self) -> &InboxStore {
        &self.store
    }

    /// The engine's options.
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Syncs one account into its local snapshot.
    ///
    /// Nothing is written unless the remote part succeeds. A zero-result
    /// search still records the fetch time.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid configuration, a held lock, connection,
    /// authentication, select, search or fetch failure, timeout, or a local
    /// persistence failure.
    pub async fn sync_account(&self, account: &Account, limit: Option<usize>) -> Result<SyncReport> {
        validate_account(account).map_err(|errors| Error::Validation {
            account: account.email.clone(),
            errors,
        })?;

        let email = account.email.as_str();
        let _lock = self.store.lock(email).await?;
        let mut data = self.store.load(email).await?;
        let previous_total = data.emails.len();

        let remote = self.fetch_remote(account, &data, limit);
        let fetched = match self.options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, remote)
                .await
                .map_err(|_| Error::Timeout {
                    account: account.email.clone(),
                    timeout,
                })??,
            None => remote.await?,
        };

        data.emails = merge(std::mem::take(&mut data.emails), fetched.emails);
        data.last_fetch_time = Some(Utc::now());
        self.store.save(email, &mut data).await?;

        let report = SyncReport {
            account: account.email.clone(),
            new_count: data.emails.len().saturating_sub(previous_total),
            fetched: fetched.fetched,
            skipped: fetched.skipped,
            total_emails: data.total_emails,
            last_email_date: data.last_email_date,
        };
        info!(
            account = email,
            new = report.new_count,
            fetched = report.fetched,
            skipped = report.skipped,
            total = report.total_emails,
            "sync complete"
        );

        if self.options.mirror_after_sync
            && let Err(e) = archive::sync_mirror(&self.store, email).await
        {
            warn!(account = email, error = %e, "archive mirror refresh failed");
        }

        Ok(report)
    }

    async fn fetch_remote(
        &self,
        account: &Account,
        data: &InboxData,
        limit: Option<usize>,
    ) -> Result<Fetched> {
        let mut session = self.connector.connect(account).await?;
        let result = self.search_and_fetch(&mut session, data, limit).await;
        if let Err(e) = session.logout().await {
            debug!(account = %account.email, error = %e, "logout failed");
        }
        result
    }

    async fn search_and_fetch(
        &self,
        session: &mut C::Session,
        data: &InboxData,
        limit: Option<usize>,
    ) -> Result<Fetched> {
        session.select(&self.options.folder).await?;

        let criteria = search_criteria(self.options.mode, data.last_email_date);
        let mut ids = session.search(&criteria).await?;
        debug!(
            account = %data.account_email,
            query = %criteria.to_imap_query(),
            count = ids.len(),
            "search complete"
        );
        if ids.is_empty() {
            return Ok(Fetched {
                emails: Vec::new(),
                fetched: 0,
                skipped: 0,
            });
        }

        ids.sort_unstable();
        ids.dedup();
        if let Some(limit) = limit.filter(|&limit| limit > 0)
            && ids.len() > limit
        {
            ids.drain(..ids.len() - limit);
        }

        let raw = session.fetch(&ids).await?;
        let fetched = raw.len();
        let mut emails = Vec::with_capacity(fetched);
        let mut skipped = 0;
        for message in &raw {
            match decode_message(message, &self.options.decode) {
                Ok(email) => emails.push(email),
                Err(e) => {
                    skipped += 1;
                    debug!(account = %data.account_email, error = %e, "skipping undecodable message");
                }
            }
        }
        if skipped > 0 {
            warn!(account = %data.account_email, skipped, "some messages could not be decoded");
        }

        Ok(Fetched {
            emails,
            fetched,
            skipped,
        })
    }

    /// Syncs accounts one after another.
    ///
    /// A failing account is logged and recorded; the rest still run.
    pub async fn sync_all_accounts(
        &self,
        accounts: &[Account],
        limit: Option<usize>,
    ) -> Vec<AccountSyncOutcome> {
        let mut outcomes = Vec::with_capacity(accounts.len());
        for account in accounts {
            info!(account = %account.email, "syncing account");
            let result = self.sync_account(account, limit).await;
            if let Err(e) = &result {
                warn!(account = %account.email, error = %e, "account sync failed");
            }
            outcomes.push(AccountSyncOutcome {
                account: account.email.clone(),
                result,
            });
        }
        outcomes
    }

    /// Refreshes an account's archive mirror from its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock, load or mirror transaction fails.
    pub async fn sync_mirror(&self, account: &str) -> Result<MirrorReport> {
        let _lock = self.store.lock(account).await?;
        archive::sync_mirror(&self.store, account).await
    }
}

impl<C: MailboxConnector + 'static> SyncEngine<C> {
    /// Starts a detached sync if the last one is older than `interval`.
    ///
    /// Never blocks the caller. Failures are logged and otherwise dropped.
    pub fn spawn_auto_sync(
        self: &Arc<Self>,
        account: Account,
        interval: Duration,
        limit: Option<usize>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let data = match engine.store.load(&account.email).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(account = %account.email, error = %e, "auto-sync could not read inbox");
                    return;
                }
            };
            if !should_auto_sync(&data, interval, Utc::now()) {
                debug!(account = %account.email, "auto-sync not due");
                return;
            }
            match engine.sync_account(&account, limit).await {
                Ok(report) => {
                    info!(account = %account.email, new = report.new_count, "auto-sync finished");
                }
                Err(e) => warn!(account = %account.email, error = %e, "auto-sync failed"),
            }
        })
    }
}

/// Whether the last successful fetch is older than `interval`.
#[must_use]
pub fn should_auto_sync(data: &InboxData, interval: Duration, now: DateTime<Utc>) -> bool {
    let Some(last) = data.last_fetch_time else {
        return true;
    };
    let elapsed = now.signed_duration_since(last);
    elapsed.to_std().is_ok_and(|elapsed| elapsed > interval)
}

/// Search criteria for the configured mode.
///
/// Incremental mode searches from the day containing
/// `last_email_date - overlap`; without a stored date it searches all.
#[must_use]
pub fn search_criteria(
    mode: SyncMode,
    last_email_date: Option<DateTime<FixedOffset>>,
) -> SearchCriteria {
    match (mode, last_email_date) {
        (SyncMode::Incremental { overlap }, Some(last)) => {
            let overlap =
                chrono::Duration::from_std(overlap).unwrap_or_else(|_| chrono::Duration::zero());
            let since = last.with_timezone(&Utc) - overlap;
            SearchCriteria::since(since.date_naive())
        }
        _ => SearchCriteria::all(),
    }
}
