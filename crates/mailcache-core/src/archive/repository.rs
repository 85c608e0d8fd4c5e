//! Relational archive mirror storage.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::{debug, info, warn};

use super::model::{ArchiveQuery, ArchiveStats, MirrorReport, SyncMetadata};
use crate::Result;
use crate::inbox::{Email, InboxData};

/// Repository for the per-account archive database.
///
/// The mirror is derived from the JSON snapshot and only changes when
/// [`Self::sync_from_inbox`] replays it. Rows are never deleted, so mail
/// cleaned out of the snapshot stays archived here.
#[derive(Debug)]
pub struct ArchiveRepository {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl ArchiveRepository {
    /// Opens the database at `path`, creating it and its tables if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repo = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool, path: None };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        // message_id holds the dedup key; header_message_id the raw header.
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT UNIQUE NOT NULL,
                header_message_id TEXT NOT NULL DEFAULT '',
                from_address TEXT NOT NULL,
                to_addresses TEXT NOT NULL,
                cc_addresses TEXT NOT NULL DEFAULT '[]',
                bcc_addresses TEXT NOT NULL DEFAULT '[]',
                subject TEXT NOT NULL,
                date_sent TEXT NOT NULL,
                date_offset_secs INTEGER NOT NULL DEFAULT 0,
                body_text TEXT,
                body_html TEXT,
                attachments TEXT,
                attachment_data BLOB,
                in_reply_to TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_emails_message_id ON emails(message_id)",
            "CREATE INDEX IF NOT EXISTS idx_emails_from ON emails(from_address)",
            "CREATE INDEX IF NOT EXISTS idx_emails_date ON emails(date_sent)",
            "CREATE INDEX IF NOT EXISTS idx_emails_subject ON emails(subject)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sync_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_email TEXT NOT NULL UNIQUE,
                last_sync_time TEXT NOT NULL,
                total_emails INTEGER NOT NULL DEFAULT 0,
                last_email_date TEXT,
                sync_version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replays a snapshot into the mirror in one transaction.
    ///
    /// Rows are upserted by dedup key and only rewritten when their content
    /// differs, so replaying the same snapshot twice writes nothing the
    /// second time. A row that fails is logged and skipped; a failure of
    /// the transaction itself rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction or metadata update fails.
    pub async fn sync_from_inbox(&self, inbox: &InboxData) -> Result<MirrorReport> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let mut report = MirrorReport::default();

        let mut tx = self.pool.begin().await?;
        for email in &inbox.emails {
            match upsert_email(&mut tx, email, &now_str).await {
                Ok(0) => report.unchanged += 1,
                Ok(_) => report.written += 1,
                Err(e) => {
                    warn!(
                        account = %inbox.account_email,
                        key = %email.dedup_key(),
                        error = %e,
                        "failed to mirror email"
                    );
                    report.failed += 1;
                }
            }
        }

        sqlx::query(
            r"
            INSERT INTO sync_metadata
                (account_email, last_sync_time, total_emails, last_email_date, sync_version,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_email) DO UPDATE SET
                last_sync_time = excluded.last_sync_time,
                total_emails = excluded.total_emails,
                last_email_date = excluded.last_email_date,
                sync_version = excluded.sync_version,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&inbox.account_email)
        .bind(&now_str)
        .bind(i64::try_from(inbox.emails.len()).unwrap_or(i64::MAX))
        .bind(inbox.last_email_date.map(|d| utc_text(&d)))
        .bind(i64::try_from(inbox.last_sync_version).unwrap_or(i64::MAX))
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            account = %inbox.account_email,
            written = report.written,
            unchanged = report.unchanged,
            failed = report.failed,
            "mirrored inbox snapshot"
        );
        Ok(report)
    }

    /// Returns the sync metadata recorded for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn metadata(&self, account: &str) -> Result<Option<SyncMetadata>> {
        let row = sqlx::query(
            r"
            SELECT account_email, last_sync_time, total_emails, last_email_date, sync_version
            FROM sync_metadata
            WHERE account_email = ?
            ",
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let last_sync_time = parse_utc(&row.get::<String, _>("last_sync_time"))?;
            Some(SyncMetadata {
                account_email: row.get("account_email"),
                last_sync_time,
                total_emails: row.get("total_emails"),
                last_email_date: row
                    .get::<Option<String>, _>("last_email_date")
                    .as_deref()
                    .and_then(parse_utc),
                sync_version: row.get("sync_version"),
            })
        }))
    }

    /// Whether the mirror lags behind the given snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_stale(&self, inbox: &InboxData) -> Result<bool> {
        let stale = self
            .metadata(&inbox.account_email)
            .await?
            .is_none_or(|meta| {
                u64::try_from(meta.sync_version).ok() != Some(inbox.last_sync_version)
            });
        debug!(account = %inbox.account_email, stale, "checked mirror staleness");
        Ok(stale)
    }

    /// Queries mirrored emails, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn query(&self, query: &ArchiveQuery) -> Result<Vec<Email>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r"
            SELECT header_message_id, from_address, to_addresses, cc_addresses, bcc_addresses,
                   subject, date_sent, date_offset_secs, body_text, body_html, attachments,
                   attachment_data, in_reply_to, is_read
            FROM emails
            WHERE 1=1
            ",
        );
        if let Some(from) = query.from.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND from_address LIKE ");
            qb.push_bind(format!("%{from}%"));
        }
        if let Some(subject) = query.subject.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND subject LIKE ");
            qb.push_bind(format!("%{subject}%"));
        }
        if let Some(since) = query.since {
            qb.push(" AND date_sent >= ");
            qb.push_bind(utc_text(&since));
        }
        if let Some(until) = query.until {
            qb.push(" AND date_sent <= ");
            qb.push_bind(utc_text(&until));
        }
        qb.push(" ORDER BY date_sent DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().filter_map(email_from_row).collect())
    }

    /// Summarizes the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn stats(&self) -> Result<ArchiveStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, MIN(date_sent) AS oldest, MAX(date_sent) AS newest FROM emails",
        )
        .fetch_one(&self.pool)
        .await?;

        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;

        Ok(ArchiveStats {
            total_emails: row.get("total"),
            oldest: row
                .get::<Option<String>, _>("oldest")
                .as_deref()
                .and_then(parse_utc),
            newest: row
                .get::<Option<String>, _>("newest")
                .as_deref()
                .and_then(parse_utc),
            size_bytes: u64::try_from(page_count.saturating_mul(page_size)).unwrap_or_default(),
            path: self.path.clone(),
        })
    }
}

/// Inserts or refreshes one row. Returns the number of rows changed.
async fn upsert_email(conn: &mut SqliteConnection, email: &Email, now: &str) -> Result<u64> {
    let attachment_data = if email.attachment_data.is_empty() {
        None
    } else {
        Some(serde_json::to_vec(&email.attachment_data)?)
    };

    let result = sqlx::query(
        r"
        INSERT INTO emails
            (message_id, header_message_id, from_address, to_addresses, cc_addresses,
             bcc_addresses, subject, date_sent, date_offset_secs, body_text, body_html,
             attachments, attachment_data, in_reply_to, is_read, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(message_id) DO UPDATE SET
            header_message_id = excluded.header_message_id,
            from_address = excluded.from_address,
            to_addresses = excluded.to_addresses,
            cc_addresses = excluded.cc_addresses,
            bcc_addresses = excluded.bcc_addresses,
            subject = excluded.subject,
            date_sent = excluded.date_sent,
            date_offset_secs = excluded.date_offset_secs,
            body_text = excluded.body_text,
            body_html = excluded.body_html,
            attachments = excluded.attachments,
            attachment_data = excluded.attachment_data,
            in_reply_to = excluded.in_reply_to,
            is_read = excluded.is_read,
            updated_at = excluded.updated_at
        WHERE emails.header_message_id IS NOT excluded.header_message_id
           OR emails.from_address IS NOT excluded.from_address
           OR emails.to_addresses IS NOT excluded.to_addresses
           OR emails.cc_addresses IS NOT excluded.cc_addresses
           OR emails.bcc_addresses IS NOT excluded.bcc_addresses
           OR emails.subject IS NOT excluded.subject
           OR emails.date_sent IS NOT excluded.date_sent
           OR emails.date_offset_secs IS NOT excluded.date_offset_secs
           OR emails.body_text IS NOT excluded.body_text
           OR emails.body_html IS NOT excluded.body_html
           OR emails.attachments IS NOT excluded.attachments
           OR emails.attachment_data IS NOT excluded.attachment_data
           OR emails.in_reply_to IS NOT excluded.in_reply_to
           OR emails.is_read IS NOT excluded.is_read
        ",
    )
    .bind(email.dedup_key().into_owned())
    .bind(&email.message_id)
    .bind(&email.from)
    .bind(serde_json::to_string(&email.to)?)
    .bind(serde_json::to_string(&email.cc)?)
    .bind(serde_json::to_string(&email.bcc)?)
    .bind(&email.subject)
    .bind(utc_text(&email.date))
    .bind(email.date.offset().local_minus_utc())
    .bind(&email.body)
    .bind(email.body_html.as_deref())
    .bind(serde_json::to_string(&email.attachments)?)
    .bind(attachment_data)
    .bind(&email.in_reply_to)
    .bind(email.is_read)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

fn email_from_row(row: &SqliteRow) -> Option<Email> {
    let offset = FixedOffset::east_opt(row.get::<i32, _>("date_offset_secs"))?;
    let date = parse_utc(&row.get::<String, _>("date_sent"))?.with_timezone(&offset);
    let list = |column: &str| -> Vec<String> {
        serde_json::from_str(&row.get::<String, _>(column)).unwrap_or_default()
    };

    Some(Email {
        message_id: row.get("header_message_id"),
        from: row.get("from_address"),
        to: list("to_addresses"),
        cc: list("cc_addresses"),
        bcc: list("bcc_addresses"),
        subject: row.get("subject"),
        date,
        in_reply_to: row
            .get::<Option<String>, _>("in_reply_to")
            .unwrap_or_default(),
        body: row.get::<Option<String>, _>("body_text").unwrap_or_default(),
        body_html: row.get("body_html"),
        attachments: row
            .get::<Option<String>, _>("attachments")
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default(),
        attachment_data: row
            .get::<Option<Vec<u8>>, _>("attachment_data")
            .and_then(|blob| serde_json::from_slice(&blob).ok())
            .unwrap_or_default(),
        is_read: row.get("is_read"),
        seq: 0,
    })
}

/// UTC timestamp text that sorts chronologically.
fn utc_text<Tz: chrono::TimeZone>(date: &DateTime<Tz>) -> String {
    date.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_utc(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
