/// Common structures and collaborator traits for email processing
use futures::future::BoxFuture;

use crate::attachment_parser::Attachment;
use crate::error::Result;
use crate::smtp_sender::Reply;
use crate::weather_client::WeatherRecord;

/// One message fetched from the mailbox
#[derive(Debug, Clone)]
pub struct MailboxMessage {
    pub id: u32,
    /// `From` header as displayed ("Name <addr>" or "addr")
    pub sender_raw: String,
    /// Bare lower-cased address used for the allow-list check
    pub sender: String,
    pub subject: String,
    pub attachments: Vec<Attachment>,
}

/// Mailbox access used by the pipeline (IMAP in production).
pub trait Mailbox: Send {
    /// Ids of unread messages whose subject contains `subject`, in server order.
    fn search_unseen<'a>(&'a mut self, subject: &'a str) -> BoxFuture<'a, Result<Vec<u32>>>;

    /// Full RFC 822 content, fetched without setting `\Seen`.
    fn fetch_message(&mut self, id: u32) -> BoxFuture<'_, Result<Vec<u8>>>;

    fn mark_seen(&mut self, id: u32) -> BoxFuture<'_, Result<()>>;

    fn apply_label<'a>(&'a mut self, id: u32, label: &'a str) -> BoxFuture<'a, Result<()>>;

    fn logout(&mut self) -> BoxFuture<'_, Result<()>>;
}

pub trait WeatherProvider: Send + Sync {
    fn current_weather<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<WeatherRecord>>;
}

pub trait ReplySender: Send + Sync {
    fn send_reply<'a>(&'a self, reply: &'a Reply) -> BoxFuture<'a, Result<()>>;
}

/// Why a message was left untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unauthorized,
    NoPdfAttachments,
    WeatherUnavailable,
    NoDocumentsEnriched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Replied { documents: usize },
    Skipped(SkipReason),
    Failed,
}

/// Totals for one pass over the mailbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub matched: usize,
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Replied { .. } => self.replied += 1,
            MessageOutcome::Skipped(_) => self.skipped += 1,
            MessageOutcome::Failed => self.failed += 1,
        }
    }
}
