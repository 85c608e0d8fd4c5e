//! Command implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, bail};
use chrono::{Local, NaiveDate, NaiveTime};
use mailcache_core::archive::{self, ArchiveQuery};
use mailcache_core::{
    Account, Config, Email, ImapConnector, InboxStore, QueryRequest, StatsOptions, SyncEngine,
    SyncOptions, aggregate_with, credentials,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::output;

/// Loaded configuration plus the store it points at.
pub struct Context {
    config: Config,
    store: InboxStore,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let store = InboxStore::new(config.data_dir());
        Self { config, store }
    }

    fn engine(&self) -> SyncEngine<ImapConnector> {
        SyncEngine::new(
            ImapConnector,
            self.store.clone(),
            SyncOptions::from_config(&self.config),
        )
    }

    fn accounts(&self, account: Option<&str>, all: bool) -> anyhow::Result<Vec<Account>> {
        if all {
            if self.config.accounts.is_empty() {
                bail!("no accounts configured");
            }
            return Ok(self.config.accounts.clone());
        }
        Ok(vec![self.config.select_account(account)?.clone()])
    }

    /// Account email to read from: configured, or any cached directory.
    fn account_email(&self, account: Option<&str>) -> anyhow::Result<String> {
        match self.config.select_account(account) {
            Ok(found) => Ok(found.email.clone()),
            Err(e) => account.map(str::to_string).ok_or_else(|| e.into()),
        }
    }
}

pub async fn sync(
    ctx: &Context,
    account: Option<&str>,
    all: bool,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let accounts = ctx.accounts(account, all)?;
    let outcomes = ctx.engine().sync_all_accounts(&accounts, limit).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => output::print_sync_report(report),
            Err(e) => {
                failed += 1;
                println!("{}: sync failed: {e}", outcome.account);
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} account(s) failed to sync", outcomes.len());
    }
    Ok(())
}

pub async fn sync_db(ctx: &Context, account: Option<&str>, all: bool) -> anyhow::Result<()> {
    let emails: Vec<String> = if all {
        ctx.store.list_accounts().await?
    } else {
        vec![ctx.account_email(account)?]
    };

    let engine = ctx.engine();
    for email in &emails {
        let report = engine
            .sync_mirror(email)
            .await
            .with_context(|| format!("failed to refresh archive for {email}"))?;
        println!(
            "{email}: {} written, {} unchanged, {} failed",
            report.written, report.unchanged, report.failed
        );
    }
    Ok(())
}

pub async fn query(
    ctx: &Context,
    account: Option<&str>,
    filters: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let email = ctx.account_email(account)?;
    let request = QueryRequest::parse(filters, Local::now().fixed_offset())?;
    let auto_sync = start_auto_sync(ctx, &email);

    let data = ctx.store.load(&email).await?;
    let matched = request.apply(&data.emails);
    info!(account = %email, filter = %request.filter.describe(), count = matched.len(), "query");

    if json {
        println!("{}", serde_json::to_string_pretty(&matched)?);
    } else {
        output::print_email_table(&matched);
    }

    // Results are already printed; let a background refresh finish before exit.
    if let Some(handle) = auto_sync
        && let Err(e) = handle.await
    {
        warn!(error = %e, "auto-sync task panicked");
    }
    Ok(())
}

pub async fn stats(
    ctx: &Context,
    account: Option<&str>,
    all: bool,
    filters: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let request = QueryRequest::parse(filters, Local::now().fixed_offset())?;

    let (emails, account_email): (Vec<Email>, Option<String>) = if all {
        let mut emails = Vec::new();
        for account in ctx.store.list_accounts().await? {
            emails.extend(ctx.store.load(&account).await?.emails);
        }
        (emails, None)
    } else {
        let email = ctx.account_email(account)?;
        (ctx.store.load(&email).await?.emails, Some(email))
    };

    let matched = request.filter.filter(&emails);
    let stats = aggregate_with(
        &matched,
        &StatsOptions {
            top_n: request.top_n,
            account_email,
        },
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        if !request.filter.is_empty() {
            println!("_Filter: {}_\n", request.filter.describe());
        }
        print!("{}", stats.to_markdown());
    }
    Ok(())
}

pub fn archive_query(
    from: Option<String>,
    subject: Option<String>,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
    limit: usize,
) -> ArchiveQuery {
    ArchiveQuery {
        from,
        subject,
        since: since.map(|day| day.and_time(NaiveTime::MIN).and_utc()),
        until: until.and_then(|day| day.and_hms_opt(23, 59, 59)).map(|t| t.and_utc()),
        limit: (limit > 0).then_some(limit),
    }
}

pub async fn db_query(
    ctx: &Context,
    account: Option<&str>,
    query: &ArchiveQuery,
    json: bool,
) -> anyhow::Result<()> {
    let email = ctx.account_email(account)?;
    let inbox = ctx.store.load(&email).await?;
    let repo = archive::open_archive(&ctx.store, &email).await?;
    if repo.is_stale(&inbox).await? {
        warn!(account = %email, "archive is behind the inbox; run `mailcache sync-db`");
    }

    let rows = repo.query(query).await;
    repo.close().await;
    let rows = rows?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        output::print_email_table(&rows);
    }
    Ok(())
}

pub async fn db_stats(ctx: &Context, account: Option<&str>) -> anyhow::Result<()> {
    let email = ctx.account_email(account)?;
    let inbox = ctx.store.load(&email).await?;
    let repo = archive::open_archive(&ctx.store, &email).await?;

    let stats = repo.stats().await?;
    let metadata = repo.metadata(&email).await?;
    let stale = repo.is_stale(&inbox).await?;
    repo.close().await;

    output::print_archive_stats(&email, &stats, metadata.as_ref(), stale);
    Ok(())
}

pub async fn cleanup(ctx: &Context, account: Option<&str>, days: u64) -> anyhow::Result<()> {
    let max_age = cleanup_age(days)?;
    let email = ctx.account_email(account)?;
    let removed = ctx.store.cleanup_older_than(&email, max_age).await?;
    println!("{email}: removed {removed} email(s) older than {days} day(s)");
    Ok(())
}

pub async fn accounts(ctx: &Context) -> anyhow::Result<()> {
    let cached = ctx.store.list_accounts().await?;
    let mut rows = Vec::new();
    for account in &ctx.config.accounts {
        let data = ctx.store.load(&account.email).await?;
        let is_default = ctx.config.default_account.as_deref() == Some(account.email.as_str());
        rows.push(output::AccountRow {
            email: account.email.clone(),
            configured: true,
            is_default,
            server: Some(format!(
                "{}:{} ({})",
                account.imap.host,
                account.imap_port(),
                account.imap.security.display_name()
            )),
            total: data.total_emails,
            last_fetch: data.last_fetch_time,
        });
    }
    for email in cached {
        if ctx.config.account(&email).is_err() {
            let data = ctx.store.load(&email).await?;
            rows.push(output::AccountRow {
                email,
                configured: false,
                is_default: false,
                server: None,
                total: data.total_emails,
                last_fetch: data.last_fetch_time,
            });
        }
    }
    output::print_accounts(&rows);
    Ok(())
}

pub async fn set_password(ctx: &Context, account: Option<&str>) -> anyhow::Result<()> {
    let email = ctx.config.select_account(account)?.email.clone();
    eprintln!("IMAP password for {email}:");
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    stdin.read_line(&mut line).await?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("empty password");
    }

    let stored = email.clone();
    let password = password.to_string();
    tokio::task::spawn_blocking(move || credentials::store_imap_password(&stored, &password))
        .await??;
    println!("{email}: password stored in the system keyring");
    Ok(())
}

fn cleanup_age(days: u64) -> anyhow::Result<Duration> {
    if days == 0 {
        bail!("--days must be at least 1");
    }
    days.checked_mul(24 * 3600)
        .map(Duration::from_secs)
        .with_context(|| format!("--days {days} is too large"))
}

/// Starts a background refresh of a configured account when its cache is old.
fn start_auto_sync(ctx: &Context, email: &str) -> Option<tokio::task::JoinHandle<()>> {
    if !ctx.config.auto_sync {
        return None;
    }
    let account = ctx.config.account(email).ok()?.clone();
    let engine = Arc::new(ctx.engine());
    Some(engine.spawn_auto_sync(
        account,
        ctx.config.auto_sync_interval(),
        Some(ctx.config.auto_sync_limit),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_age_bounds() {
        assert_eq!(cleanup_age(2).unwrap(), Duration::from_secs(2 * 86_400));
        assert!(cleanup_age(0).is_err());
        assert!(cleanup_age(u64::MAX).is_err());
    }
}
