//! IMAP implementation of the mailbox seam.
//!
//! The `imap` crate is blocking, so every call runs on the blocking pool
//! with the session behind a mutex.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::{ClientConnection, StreamOwned};
use tracing::{debug, warn};

use super::mail::{
    MailServiceError, MailboxConnector, MailboxSession, RawMessage, SearchCriteria, sequence_set,
};
use crate::account::{Account, Security, credentials};

/// Fetch item list. `BODY.PEEK[]` leaves `\Seen` untouched.
const FETCH_QUERY: &str = "(FLAGS BODY.PEEK[])";

/// Messages requested per FETCH command.
const FETCH_BATCH: usize = 200;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const IO_TIMEOUT: Duration = Duration::from_secs(120);

/// A blocking stream that may or may not be TLS encrypted.
#[derive(Debug)]
pub enum ImapStream {
    /// Plain TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream.
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for ImapStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for ImapStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

fn connect_tcp(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_read_timeout(Some(IO_TIMEOUT))?;
                stream.set_write_timeout(Some(IO_TIMEOUT))?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
    }))
}

fn connect_tls(host: &str, port: u16) -> Result<ImapStream, MailServiceError> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| MailServiceError::Connection(format!("invalid host {host}: {e}")))?;
    let conn = ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| MailServiceError::Connection(e.to_string()))?;
    let tcp = connect_tcp(host, port).map_err(|e| MailServiceError::Connection(e.to_string()))?;

    Ok(ImapStream::Tls(Box::new(StreamOwned::new(conn, tcp))))
}

fn open_session(
    host: &str,
    port: u16,
    security: Security,
    username: &str,
    password: &str,
) -> Result<imap::Session<ImapStream>, MailServiceError> {
    let stream = match security {
        Security::Tls => connect_tls(host, port)?,
        Security::None => ImapStream::Plain(
            connect_tcp(host, port).map_err(|e| MailServiceError::Connection(e.to_string()))?,
        ),
    };

    let mut client = imap::Client::new(stream);
    client
        .read_greeting()
        .map_err(|e| MailServiceError::Connection(e.to_string()))?;

    client
        .login(username, password)
        .map_err(|(e, _client)| MailServiceError::Authentication(e.to_string()))
}

/// Connects to real IMAP servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapConnector;

#[async_trait]
impl MailboxConnector for ImapConnector {
    type Session = ImapSession;

    async fn connect(&self, account: &Account) -> Result<ImapSession, MailServiceError> {
        let password = credentials::resolve_imap_password(account)
            .map_err(|e| MailServiceError::Authentication(e.to_string()))?;
        let host = account.imap.host.clone();
        let port = account.imap_port();
        let security = account.imap.security;
        let username = account.login_username().to_string();

        if security == Security::None {
            warn!(account = %account.email, "connecting without TLS");
        }
        debug!(account = %account.email, host, port, "connecting to IMAP server");

        let session = tokio::task::spawn_blocking(move || {
            open_session(&host, port, security, &username, &password)
        })
        .await
        .map_err(|e| MailServiceError::Connection(e.to_string()))??;

        Ok(ImapSession {
            inner: Arc::new(Mutex::new(session)),
        })
    }
}

/// An authenticated IMAP session.
pub struct ImapSession {
    inner: Arc<Mutex<imap::Session<ImapStream>>>,
}

impl std::fmt::Debug for ImapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSession").finish_non_exhaustive()
    }
}

impl ImapSession {
    async fn run<T, F>(&self, op: F) -> Result<T, MailServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut imap::Session<ImapStream>) -> Result<T, MailServiceError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut session = inner.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut session)
        })
        .await
        .map_err(|e| MailServiceError::Operation(e.to_string()))?
    }
}

#[async_trait]
impl MailboxSession for ImapSession {
    async fn select(&mut self, folder: &str) -> Result<u32, MailServiceError> {
        let folder = folder.to_string();
        self.run(move |session| {
            session
                .select(&folder)
                .map(|mailbox| mailbox.exists)
                .map_err(|e| MailServiceError::Select {
                    folder,
                    reason: e.to_string(),
                })
        })
        .await
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>, MailServiceError> {
        let query = criteria.to_imap_query();
        self.run(move |session| {
            let mut ids: Vec<u32> = session
                .search(&query)
                .map_err(|e| MailServiceError::Search(e.to_string()))?
                .into_iter()
                .collect();
            ids.sort_unstable();
            Ok(ids)
        })
        .await
    }

    async fn fetch(&mut self, ids: &[u32]) -> Result<Vec<RawMessage>, MailServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.run(move |session| {
            let mut messages = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(FETCH_BATCH) {
                let fetches = session
                    .fetch(sequence_set(chunk), FETCH_QUERY)
                    .map_err(|e| MailServiceError::Fetch(e.to_string()))?;
                messages.extend(fetches.iter().map(|fetch| RawMessage {
                    seq: fetch.message,
                    flags: fetch.flags().iter().map(ToString::to_string).collect(),
                    body: fetch.body().map(<[u8]>::to_vec),
                }));
            }
            Ok(messages)
        })
        .await
    }

    async fn logout(&mut self) -> Result<(), MailServiceError> {
        self.run(|session| {
            session
                .logout()
                .map_err(|e| MailServiceError::Operation(e.to_string()))
        })
        .await
    }
}
