//! End-to-end sync → mirror → query → stats tests against a scripted server.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use mailcache_core::archive::{ArchiveQuery, open_archive};
use mailcache_core::service::{
    MailServiceError, MailboxConnector, MailboxSession, RawMessage, SearchCriteria,
};
use mailcache_core::{
    Account, Error, InboxStore, QueryRequest, StatsOptions, SyncEngine, SyncMode, SyncOptions,
    aggregate_with,
};

#[derive(Default)]
struct Server {
    messages: Vec<RawMessage>,
    searches: Vec<SearchCriteria>,
    fetched: Vec<Vec<u32>>,
    logouts: usize,
    fail_connect: bool,
    fail_search: bool,
    fetch_delay: Option<Duration>,
}

#[derive(Clone, Default)]
struct ScriptedConnector {
    server: Arc<Mutex<Server>>,
}

impl ScriptedConnector {
    fn with_messages(messages: Vec<RawMessage>) -> Self {
        let connector = Self::default();
        connector.server.lock().unwrap().messages = messages;
        connector
    }

    fn push(&self, message: RawMessage) {
        self.server.lock().unwrap().messages.push(message);
    }

    fn server(&self) -> std::sync::MutexGuard<'_, Server> {
        self.server.lock().unwrap()
    }
}

struct ScriptedSession {
    server: Arc<Mutex<Server>>,
}

#[async_trait]
impl MailboxConnector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(&self, _account: &Account) -> Result<ScriptedSession, MailServiceError> {
        if self.server().fail_connect {
            return Err(MailServiceError::Connection("connection refused".to_string()));
        }
        Ok(ScriptedSession {
            server: Arc::clone(&self.server),
        })
    }
}

#[async_trait]
impl MailboxSession for ScriptedSession {
    async fn select(&mut self, _folder: &str) -> Result<u32, MailServiceError> {
        let count = self.server.lock().unwrap().messages.len();
        Ok(u32::try_from(count).unwrap())
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>, MailServiceError> {
        let mut server = self.server.lock().unwrap();
        server.searches.push(*criteria);
        if server.fail_search {
            return Err(MailServiceError::Search("BAD".to_string()));
        }
        Ok(server.messages.iter().map(|m| m.seq).collect())
    }

    async fn fetch(&mut self, ids: &[u32]) -> Result<Vec<RawMessage>, MailServiceError> {
        let delay = self.server.lock().unwrap().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut server = self.server.lock().unwrap();
        server.fetched.push(ids.to_vec());
        Ok(server
            .messages
            .iter()
            .filter(|m| ids.contains(&m.seq))
            .cloned()
            .collect())
    }

    async fn logout(&mut self) -> Result<(), MailServiceError> {
        self.server.lock().unwrap().logouts += 1;
        Ok(())
    }
}

fn message(seq: u32, id: &str, from: &str, date: &str, subject: &str) -> RawMessage {
    let body = format!(
        "Message-ID: <{id}>\r\nFrom: {from}\r\nTo: me@gmail.com\r\nSubject: {subject}\r\n\
         Date: {date}\r\nContent-Type: text/plain\r\n\r\nHello from {from}\r\n"
    );
    RawMessage {
        seq,
        flags: Vec::new(),
        body: Some(body.into_bytes()),
    }
}

fn three_messages() -> Vec<RawMessage> {
    vec![
        message(1, "m3@x.com", "a@x.com", "Wed, 03 Jan 2024 10:00:00 +0000", "Quarterly plan"),
        message(2, "m1@y.com", "b@y.com", "Mon, 01 Jan 2024 10:00:00 +0000", "Hello"),
        message(3, "m2@x.com", "a@x.com", "Tue, 02 Jan 2024 10:00:00 +0000", "Quarterly budget"),
    ]
}

fn account() -> Account {
    Account::with_email("me@gmail.com")
}

fn at(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

fn engine(
    connector: ScriptedConnector,
    dir: &tempfile::TempDir,
    options: SyncOptions,
) -> SyncEngine<ScriptedConnector> {
    SyncEngine::new(connector, InboxStore::new(dir.path()), options)
}

#[tokio::test]
async fn second_sync_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(
        ScriptedConnector::with_messages(three_messages()),
        &dir,
        SyncOptions::default(),
    );

    let first = engine.sync_account(&account(), None).await.unwrap();
    assert_eq!(first.new_count, 3);
    assert_eq!(first.fetched, 3);

    let second = engine.sync_account(&account(), None).await.unwrap();
    assert_eq!(second.new_count, 0);
    assert_eq!(second.total_emails, 3);

    let data = engine.store().load("me@gmail.com").await.unwrap();
    let dates: Vec<_> = data.emails.iter().map(|e| e.date.format("%d").to_string()).collect();
    assert_eq!(dates, ["03", "02", "01"]);
    assert!(data.emails.windows(2).all(|w| w[0].date >= w[1].date));
    assert_eq!(data.last_email_date, Some(at("2024-01-03T10:00:00Z")));
    assert_eq!(data.last_sync_version, 2);
}

#[tokio::test]
async fn limit_keeps_highest_sequence_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(
        (1..=5)
            .map(|i| {
                message(
                    i,
                    &format!("m{i}@x.com"),
                    "a@x.com",
                    &format!("0{i} Jan 2024 10:00:00 +0000"),
                    "s",
                )
            })
            .collect(),
    );
    let engine = engine(connector.clone(), &dir, SyncOptions::default());

    let report = engine.sync_account(&account(), Some(2)).await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(connector.server().fetched, vec![vec![4, 5]]);
}

#[tokio::test]
async fn empty_search_still_records_fetch_time() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::default();
    let engine = engine(connector.clone(), &dir, SyncOptions::default());

    let report = engine.sync_account(&account(), None).await.unwrap();
    assert_eq!(report.new_count, 0);
    assert!(connector.server().fetched.is_empty());

    let data = engine.store().load("me@gmail.com").await.unwrap();
    assert!(data.last_fetch_time.is_some());
    assert!(data.emails.is_empty());
}

#[tokio::test]
async fn connection_failure_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(three_messages());
    connector.server().fail_connect = true;
    let engine = engine(connector, &dir, SyncOptions::default());

    let err = engine.sync_account(&account(), None).await.unwrap_err();
    assert!(matches!(err, Error::Mail(MailServiceError::Connection(_))));

    let data = engine.store().load("me@gmail.com").await.unwrap();
    assert!(data.last_fetch_time.is_none());
    assert!(!engine.store().inbox_path("me@gmail.com").unwrap().exists());
}

#[tokio::test]
async fn search_failure_logs_out_and_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(three_messages());
    let engine = engine(connector.clone(), &dir, SyncOptions::default());
    engine.sync_account(&account(), None).await.unwrap();

    connector.server().fail_search = true;
    let err = engine.sync_account(&account(), None).await.unwrap_err();
    assert!(matches!(err, Error::Mail(MailServiceError::Search(_))));
    assert_eq!(connector.server().logouts, 2);

    let data = engine.store().load("me@gmail.com").await.unwrap();
    assert_eq!(data.last_sync_version, 1);
    assert_eq!(data.total_emails, 3);
}

#[tokio::test]
async fn undecodable_messages_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut messages = three_messages();
    messages.push(RawMessage {
        seq: 4,
        flags: Vec::new(),
        body: None,
    });
    let engine = engine(
        ScriptedConnector::with_messages(messages),
        &dir,
        SyncOptions::default(),
    );

    let report = engine.sync_account(&account(), None).await.unwrap();
    assert_eq!(report.fetched, 4);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.total_emails, 3);
}

#[tokio::test]
async fn slow_fetch_times_out_without_committing() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(three_messages());
    connector.server().fetch_delay = Some(Duration::from_secs(5));
    let options = SyncOptions {
        timeout: Some(Duration::from_millis(50)),
        ..SyncOptions::default()
    };
    let engine = engine(connector, &dir, options);

    let err = engine.sync_account(&account(), None).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(!engine.store().inbox_path("me@gmail.com").unwrap().exists());

    // The lock was released with the failed call.
    assert!(engine.store().lock("me@gmail.com").await.is_ok());
}

#[tokio::test]
async fn incremental_sync_tolerates_clock_skew() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(three_messages());
    let options = SyncOptions {
        mode: SyncMode::Incremental {
            overlap: Duration::from_secs(12 * 3600),
        },
        ..SyncOptions::default()
    };
    let engine = engine(connector.clone(), &dir, options);

    engine.sync_account(&account(), None).await.unwrap();

    // A late arrival dated before the newest stored email.
    connector.push(message(
        4,
        "late@z.com",
        "c@z.com",
        "Wed, 03 Jan 2024 08:00:00 +0000",
        "Late",
    ));
    let report = engine.sync_account(&account(), None).await.unwrap();
    assert_eq!(report.new_count, 1);
    assert_eq!(report.last_email_date, Some(at("2024-01-03T10:00:00Z")));

    let searches = connector.server().searches.clone();
    assert_eq!(searches[0], SearchCriteria::all());
    assert_eq!(
        searches[1],
        SearchCriteria::since(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    );
}

#[tokio::test]
async fn failing_account_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(
        ScriptedConnector::with_messages(three_messages()),
        &dir,
        SyncOptions::default(),
    );
    let mut broken = Account::with_email("broken@example.org");
    broken.imap.host.clear();

    let outcomes = engine
        .sync_all_accounts(&[broken, account()], None)
        .await;
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0].result, Err(Error::Validation { .. })));
    assert_eq!(outcomes[1].result.as_ref().unwrap().new_count, 3);

    let accounts = engine.store().list_accounts().await.unwrap();
    assert_eq!(accounts, ["me@gmail.com"]);
}

#[tokio::test]
async fn mirror_follows_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let options = SyncOptions {
        mirror_after_sync: true,
        ..SyncOptions::default()
    };
    let engine = engine(
        ScriptedConnector::with_messages(three_messages()),
        &dir,
        options,
    );
    engine.sync_account(&account(), None).await.unwrap();

    let data = engine.store().load("me@gmail.com").await.unwrap();
    let archive = open_archive(engine.store(), "me@gmail.com").await.unwrap();
    assert!(!archive.is_stale(&data).await.unwrap());
    assert_eq!(archive.stats().await.unwrap().total_emails, 3);

    let rows = archive
        .query(&ArchiveQuery {
            from: Some("a@x.com".to_string()),
            ..ArchiveQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].message_id, "m3@x.com");
    archive.close().await;

    let again = engine.sync_mirror("me@gmail.com").await.unwrap();
    assert_eq!(again.written, 0);
    assert_eq!(again.unchanged, 3);
}

#[tokio::test]
async fn filter_then_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(
        ScriptedConnector::with_messages(three_messages()),
        &dir,
        SyncOptions::default(),
    );
    engine.sync_account(&account(), None).await.unwrap();
    let data = engine.store().load("me@gmail.com").await.unwrap();

    let request = QueryRequest::parse(&["domain=x.com"], at("2024-01-10T00:00:00Z")).unwrap();
    let matched = request.apply(&data.emails);
    assert_eq!(matched.len(), 2);
    assert!(matched.iter().all(|e| e.from == "a@x.com"));

    let stats = aggregate_with(
        &matched,
        &StatsOptions {
            top_n: request.top_n,
            account_email: Some("me@gmail.com".to_string()),
        },
    );
    assert_eq!(stats.total_emails, matched.len());
    assert_eq!(stats.emails_by_domain["x.com"], 2);
    assert_eq!(stats.top_keywords[0].value, "quarterly");
    assert!(stats.top_recipients.is_empty());
}

#[tokio::test]
async fn auto_sync_runs_when_due() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(three_messages());
    let engine = Arc::new(engine(connector.clone(), &dir, SyncOptions::default()));

    engine
        .spawn_auto_sync(account(), Duration::from_secs(3600), None)
        .await
        .unwrap();

    assert_eq!(connector.server().searches.len(), 1);
    let data = engine.store().load("me@gmail.com").await.unwrap();
    assert_eq!(data.total_emails, 3);
    assert!(data.last_fetch_time.is_some());
}

#[tokio::test]
async fn auto_sync_skips_recent_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(three_messages());
    let engine = Arc::new(engine(connector.clone(), &dir, SyncOptions::default()));
    engine.sync_account(&account(), None).await.unwrap();

    connector.push(message(4, "m4@x.com", "c@x.com", "04 Jan 2024 10:00:00 +0000", "New"));
    engine
        .spawn_auto_sync(account(), Duration::from_secs(3600), None)
        .await
        .unwrap();

    assert_eq!(connector.server().searches.len(), 1);
    let data = engine.store().load("me@gmail.com").await.unwrap();
    assert_eq!(data.total_emails, 3);
    assert_eq!(data.last_sync_version, 1);
}

#[tokio::test]
async fn auto_sync_failure_stays_inside_the_task() {
    let dir = tempfile::tempdir().unwrap();
    let connector = ScriptedConnector::with_messages(three_messages());
    connector.server().fail_connect = true;
    let engine = Arc::new(engine(connector, &dir, SyncOptions::default()));

    let handle = engine.spawn_auto_sync(account(), Duration::from_secs(3600), None);
    assert!(handle.await.is_ok());
    assert!(!engine.store().inbox_path("me@gmail.com").unwrap().exists());

    // The engine stays usable after a failed background run.
    let data = engine.store().load("me@gmail.com").await.unwrap();
    assert!(data.last_fetch_time.is_none());
}
