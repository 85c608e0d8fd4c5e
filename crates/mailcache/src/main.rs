//! `mailcache` - local email cache and sync from the command line.
//!
//! Mirrors IMAP inboxes into per-account JSON snapshots and answers
//! queries and statistics from the local copy.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use mailcache_core::Config;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mailcache", version, about = "Local email cache and sync engine")]
struct Cli {
    /// Config file (default: <config dir>/mailcache/config.json).
    #[arg(long, global = true, env = "MAILCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch new mail into the local snapshot.
    Sync {
        #[command(flatten)]
        target: Target,
        /// Fetch at most this many of the newest messages.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Refresh the SQLite archive mirror from the snapshot.
    SyncDb {
        #[command(flatten)]
        target: Target,
    },
    /// List cached emails matching `key=value` filters.
    ///
    /// Keys: from, to, subject, unread, attachments, days, range, min-size,
    /// max-size, domains, exclude-domains, keywords, exclude, limit.
    Query {
        #[command(flatten)]
        account: AccountArg,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Filters such as `from=boss range=today`.
        filters: Vec<String>,
    },
    /// Summarize cached emails matching `key=value` filters.
    Stats {
        #[command(flatten)]
        target: Target,
        /// Print JSON instead of Markdown.
        #[arg(long)]
        json: bool,
        /// Filters such as `days=30 top=5`.
        filters: Vec<String>,
    },
    /// Query the archive mirror.
    DbQuery {
        #[command(flatten)]
        account: AccountArg,
        /// Sender substring.
        #[arg(long)]
        from: Option<String>,
        /// Subject substring.
        #[arg(long)]
        subject: Option<String>,
        /// First day, `YYYY-MM-DD`.
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Last day, `YYYY-MM-DD`.
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Maximum rows.
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show archive mirror statistics.
    DbStats {
        #[command(flatten)]
        account: AccountArg,
    },
    /// Drop cached emails older than a number of days.
    Cleanup {
        #[command(flatten)]
        account: AccountArg,
        /// Keep emails from the last this many days.
        #[arg(long)]
        days: u64,
    },
    /// List configured and cached accounts.
    Accounts,
    /// Store an account's IMAP password in the system keyring.
    ///
    /// The password is read from the first line of standard input.
    SetPassword {
        #[command(flatten)]
        account: AccountArg,
    },
}

#[derive(Args)]
struct AccountArg {
    /// Account email (default: the configured default account).
    #[arg(short, long)]
    account: Option<String>,
}

#[derive(Args)]
struct Target {
    #[command(flatten)]
    account: AccountArg,
    /// Every configured account.
    #[arg(long, conflicts_with = "account")]
    all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .await
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    debug!(path = %config_path.display(), accounts = config.accounts.len(), "config loaded");

    let ctx = commands::Context::new(config);
    match cli.command {
        Command::Sync { target, limit } => {
            commands::sync(&ctx, target.account.account.as_deref(), target.all, limit).await
        }
        Command::SyncDb { target } => {
            commands::sync_db(&ctx, target.account.account.as_deref(), target.all).await
        }
        Command::Query {
            account,
            json,
            filters,
        } => commands::query(&ctx, account.account.as_deref(), &filters, json).await,
        Command::Stats {
            target,
            json,
            filters,
        } => {
            commands::stats(&ctx, target.account.account.as_deref(), target.all, &filters, json)
                .await
        }
        Command::DbQuery {
            account,
            from,
            subject,
            since,
            until,
            limit,
            json,
        } => {
            let query = commands::archive_query(from, subject, since, until, limit);
            commands::db_query(&ctx, account.account.as_deref(), &query, json).await
        }
        Command::DbStats { account } => commands::db_stats(&ctx, account.account.as_deref()).await,
        Command::Cleanup { account, days } => {
            commands::cleanup(&ctx, account.account.as_deref(), days).await
        }
        Command::Accounts => commands::accounts(&ctx).await,
        Command::SetPassword { account } => {
            commands::set_password(&ctx, account.account.as_deref()).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "mailcache=info,mailcache_core=info",
        1 => "mailcache=debug,mailcache_core=debug",
        _ => "mailcache=trace,mailcache_core=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
