use async_imap::{Client, Session};
use futures::future::BoxFuture;
use futures::io::{AsyncRead, AsyncWrite};
use futures::stream::TryStreamExt;
use log::{debug, info, warn};
use std::fmt::Debug;
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::config::MailConfig;
use crate::email::Mailbox;
use crate::error::{ResponderError, Result};

const INBOX: &str = "INBOX";

type TlsCompat = Compat<TlsStream<TcpStream>>;

pub struct ImapClient<T = TlsCompat>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug + Send,
{
    session: Session<T>,
}

impl ImapClient {
    /// Opens a TLS connection, logs in and selects the inbox.
    pub async fn connect(config: &MailConfig) -> Result<Self> {
        info!("Connecting to IMAP server {}:{}", config.imap_server, config.imap_port);

        let tcp_stream = TcpStream::connect((config.imap_server.as_str(), config.imap_port))
            .await
            .map_err(|e| ResponderError::Connection(format!("cannot reach IMAP server: {}", e)))?;

        let connector = tokio_native_tls::native_tls::TlsConnector::new()
            .map_err(|e| ResponderError::Connection(format!("TLS setup failed: {}", e)))?;
        let tls_stream = tokio_native_tls::TlsConnector::from(connector)
            .connect(&config.imap_server, tcp_stream)
            .await
            .map_err(|e| ResponderError::Connection(format!("TLS handshake failed: {}", e)))?;

        let client = Client::new(tls_stream.compat());
        Self::open(client, &config.address, &config.password).await
    }
}

impl<T> ImapClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug + Send,
{
    /// Logs in and selects the inbox. A session that cannot select is
    /// logged out before the error is returned.
    pub async fn open(client: Client<T>, address: &str, password: &str) -> Result<Self> {
        let mut session = client
            .login(address, password)
            .await
            .map_err(|e| ResponderError::Connection(format!("IMAP authentication failed: {}", e.0)))?;

        if let Err(e) = session.select(INBOX).await {
            if let Err(logout_error) = session.logout().await {
                warn!("IMAP logout after failed select also failed: {}", logout_error);
            }
            return Err(ResponderError::Connection(format!("cannot select {}: {}", INBOX, e)));
        }

        info!("IMAP connection established");
        Ok(ImapClient { session })
    }

    pub async fn search_unseen_with_subject(&mut self, subject: &str) -> Result<Vec<u32>> {
        let search_criteria = format!("UNSEEN SUBJECT \"{}\"", subject);
        debug!("Search criteria: {}", search_criteria);

        let found = self
            .session
            .search(&search_criteria)
            .await
            .map_err(|e| ResponderError::Connection(format!("IMAP search failed: {}", e)))?;

        // SEARCH yields a set with no usable order; we pick oldest first.
        let mut ids: Vec<u32> = found.into_iter().collect();
        ids.sort_unstable();

        info!("Found {} unread email(s) with subject '{}'", ids.len(), subject);
        Ok(ids)
    }

    pub async fn fetch_raw(&mut self, message_id: u32) -> Result<Vec<u8>> {
        debug!("Fetching email ID: {}", message_id);

        // BODY.PEEK[] leaves \Seen untouched.
        let messages: Vec<_> = self
            .session
            .fetch(message_id.to_string(), "BODY.PEEK[]")
            .await
            .map_err(|e| ResponderError::Connection(format!("IMAP fetch failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| ResponderError::Connection(format!("IMAP fetch failed: {}", e)))?;

        let body = messages
            .first()
            .and_then(|message| message.body())
            .ok_or_else(|| {
                ResponderError::NotFound(format!("email {} not found or empty", message_id))
            })?;

        debug!("Email retrieved, size: {} bytes", body.len());
        Ok(body.to_vec())
    }

    async fn store(&mut self, message_id: u32, query: &str) -> Result<()> {
        let _updated: Vec<_> = self
            .session
            .store(message_id.to_string(), query)
            .await
            .map_err(|e| ResponderError::Connection(format!("IMAP store failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| ResponderError::Connection(format!("IMAP store failed: {}", e)))?;
        Ok(())
    }

    pub async fn mark_as_read(&mut self, message_id: u32) -> Result<()> {
        self.store(message_id, "+FLAGS (\\Seen)").await?;
        debug!("Email {} marked as read", message_id);
        Ok(())
    }

    /// Adds a Gmail label through the `X-GM-LABELS` extension.
    pub async fn add_label(&mut self, message_id: u32, label: &str) -> Result<()> {
        let query = format!("+X-GM-LABELS (\"{}\")", label.replace('"', ""));
        self.store(message_id, &query).await?;
        debug!("Label '{}' added to email {}", label, message_id);
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        info!("Logging out from IMAP server");
        self.session
            .logout()
            .await
            .map_err(|e| ResponderError::Connection(format!("IMAP logout failed: {}", e)))
    }
}

impl<T> Mailbox for ImapClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug + Send,
{
    fn search_unseen<'a>(&'a mut self, subject: &'a str) -> BoxFuture<'a, Result<Vec<u32>>> {
        Box::pin(self.search_unseen_with_subject(subject))
    }

    fn fetch_message(&mut self, id: u32) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(self.fetch_raw(id))
    }

    fn mark_seen(&mut self, id: u32) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.mark_as_read(id))
    }

    fn apply_label<'a>(&'a mut self, id: u32, label: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.add_label(id, label))
    }

    fn logout(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.disconnect())
    }
}
