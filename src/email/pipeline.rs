use log::debug;

use crate::activity_log::ActivityLog;
use crate::allow_list::AllowList;
use crate::attachment_parser::{Attachment, AttachmentParser};
use crate::error::{ResponderError, Result};
use crate::pdf_stamper::PdfStamper;
use crate::smtp_sender::Reply;
use crate::weather_client::WeatherRecord;

use super::common::{
    Mailbox, MailboxMessage, MessageOutcome, ReplySender, RunSummary, SkipReason, WeatherProvider,
};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Literal matched by the mailbox's SUBJECT search.
    pub subject_filter: String,
    pub city: String,
    pub processed_label: Option<String>,
    /// When false (dry run) nothing is marked read or labelled.
    pub acknowledge: bool,
    pub limit: Option<usize>,
}

/// Fetch → authorize → extract → enrich → reply → acknowledge, one message at a time.
///
/// Failures are contained to the attachment or message they occur in and
/// reported through the activity log; a run never aborts half-way.
pub struct EmailPipeline<'a, W: WeatherProvider, R: ReplySender> {
    settings: PipelineSettings,
    allow_list: &'a AllowList,
    weather: &'a W,
    replies: &'a R,
}

impl<'a, W: WeatherProvider, R: ReplySender> EmailPipeline<'a, W, R> {
    pub fn new(
        settings: PipelineSettings,
        allow_list: &'a AllowList,
        weather: &'a W,
        replies: &'a R,
    ) -> Self {
        EmailPipeline {
            settings,
            allow_list,
            weather,
            replies,
        }
    }

    /// Processes every matching message, then releases the mailbox.
    pub async fn run<M: Mailbox>(&self, mailbox: &mut M, log: &mut ActivityLog) -> RunSummary {
        let summary = self.process_mailbox(mailbox, log).await;

        if let Err(e) = mailbox.logout().await {
            log.record_failure(format!("Error closing mailbox connection: {}", e), None);
        }

        summary
    }

    async fn process_mailbox<M: Mailbox>(&self, mailbox: &mut M, log: &mut ActivityLog) -> RunSummary {
        let mut summary = RunSummary::new();

        if self.allow_list.is_empty() {
            log.record("No allowed senders found. Exiting.", None);
            return summary;
        }

        let subject = &self.settings.subject_filter;
        let message_ids = match mailbox.search_unseen(subject).await {
            Ok(ids) => ids,
            Err(e) => {
                log.record_failure(format!("Error searching for emails: {}", e), None);
                return summary;
            }
        };

        log.record(
            format!("Found {} unread emails with subject '{}'", message_ids.len(), subject),
            None,
        );
        summary.matched = message_ids.len();

        let to_process = match self.settings.limit {
            Some(limit) => &message_ids[..limit.min(message_ids.len())],
            None => &message_ids[..],
        };

        for (index, &message_id) in to_process.iter().enumerate() {
            debug!("📧 Email {}/{} (ID: {})", index + 1, to_process.len(), message_id);
            let outcome = self.process_message(mailbox, message_id, log).await;
            debug!("Email {} outcome: {:?}", message_id, outcome);
            summary.record(&outcome);
        }

        log.record(
            format!(
                "Email processing completed: {} replied, {} skipped, {} failed",
                summary.replied, summary.skipped, summary.failed
            ),
            None,
        );
        summary
    }

    pub async fn process_message<M: Mailbox>(
        &self,
        mailbox: &mut M,
        message_id: u32,
        log: &mut ActivityLog,
    ) -> MessageOutcome {
        let message = match Self::fetch(mailbox, message_id).await {
            Ok(message) => message,
            Err(e) => {
                log.record_failure(format!("Error processing email {}: {}", message_id, e), None);
                return MessageOutcome::Failed;
            }
        };
        let sender = message.sender.as_str();
        log.record(format!("Processing email from: {}", sender), Some(sender));

        if let Err(e) = self.authorize(&message) {
            log.record(format!("{}. Skipping.", e), Some(sender));
            return MessageOutcome::Skipped(SkipReason::Unauthorized);
        }

        let attachments = match Self::pdf_attachments(&message) {
            Ok(attachments) => attachments,
            Err(_) => {
                log.record(format!("No PDF attachments found in email from {}", sender), Some(sender));
                return MessageOutcome::Skipped(SkipReason::NoPdfAttachments);
            }
        };
        log.record(format!("Found {} PDF attachments", attachments.len()), Some(sender));

        // One lookup per message, never shared across messages.
        let weather = match self.weather.current_weather(&self.settings.city).await {
            Ok(weather) => weather,
            Err(e) => {
                log.record_failure(
                    format!("Could not fetch weather data ({}). Skipping email.", e),
                    Some(sender),
                );
                return MessageOutcome::Skipped(SkipReason::WeatherUnavailable);
            }
        };
        log.record(format!("Weather data fetched for {}", weather.city), Some(sender));

        let documents = Self::enrich_all(attachments, &weather, sender, log);
        if documents.is_empty() {
            log.record_failure("No PDFs were successfully processed", Some(sender));
            return MessageOutcome::Skipped(SkipReason::NoDocumentsEnriched);
        }

        let reply = Reply::new(sender, &self.settings.subject_filter, documents);
        let document_count = reply.attachments.len();
        if let Err(e) = self.replies.send_reply(&reply).await {
            log.record_failure(format!("Failed to send reply to {}: {}", sender, e), Some(sender));
            return MessageOutcome::Failed;
        }
        log.record(
            format!("Reply sent to {} with {} updated PDFs", sender, document_count),
            Some(sender),
        );

        if self.settings.acknowledge {
            if self.acknowledge(mailbox, message_id, sender, log).await {
                log.record(format!("Successfully processed email from {}", sender), Some(sender));
            }
        } else {
            log.record(format!("Dry run: email from {} left unread", sender), Some(sender));
        }

        MessageOutcome::Replied {
            documents: document_count,
        }
    }

    async fn fetch<M: Mailbox>(mailbox: &mut M, message_id: u32) -> Result<MailboxMessage> {
        let raw = mailbox.fetch_message(message_id).await?;
        AttachmentParser::parse_message(message_id, &raw)
    }

    fn authorize(&self, message: &MailboxMessage) -> Result<()> {
        if self.allow_list.contains(&message.sender) {
            Ok(())
        } else {
            Err(ResponderError::Authorization(message.sender.clone()))
        }
    }

    fn pdf_attachments(message: &MailboxMessage) -> Result<&[Attachment]> {
        if message.attachments.is_empty() {
            return Err(ResponderError::NotFound(format!(
                "no PDF attachment in email {}",
                message.id
            )));
        }
        Ok(&message.attachments)
    }

    /// Stamps each attachment; the ones that fail are dropped.
    fn enrich_all(
        attachments: &[Attachment],
        weather: &WeatherRecord,
        sender: &str,
        log: &mut ActivityLog,
    ) -> Vec<Vec<u8>> {
        let mut documents = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            match PdfStamper::stamp(&attachment.content, weather) {
                Ok(document) => {
                    log.record(format!("Weather data added to {}", attachment.filename), Some(sender));
                    documents.push(document);
                }
                Err(e) => log.record_failure(
                    format!("Error processing PDF {}: {}", attachment.filename, e),
                    Some(sender),
                ),
            }
        }

        documents
    }

    /// Marks the message read, then labels it when a label is configured.
    /// A labelling failure does not undo the read flag.
    async fn acknowledge<M: Mailbox>(
        &self,
        mailbox: &mut M,
        message_id: u32,
        sender: &str,
        log: &mut ActivityLog,
    ) -> bool {
        if let Err(e) = mailbox.mark_seen(message_id).await {
            log.record_failure(
                format!("Reply sent but email {} could not be marked read: {}", message_id, e),
                Some(sender),
            );
            return false;
        }

        if let Some(label) = &self.settings.processed_label {
            if let Err(e) = mailbox.apply_label(message_id, label).await {
                log.record_failure(
                    format!("Could not apply label '{}' to email {}: {}", label, message_id, e),
                    Some(sender),
                );
            }
        }
        true
    }
}
