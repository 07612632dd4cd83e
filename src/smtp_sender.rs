use chrono::Local;
use futures::future::BoxFuture;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, info};
use std::path::PathBuf;

use crate::config::MailConfig;
use crate::email::ReplySender;
use crate::error::{ResponderError, Result};

const REPLY_BODY: &str = "Hello,\n\n\
    Thank you for your request. Please find attached the PDF(s) \
    with current weather information appended to each page.\n\n\
    Best regards,\n\
    Automated Weather PDF Responder";

#[derive(Debug, Clone)]
pub struct ReplyAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// One outgoing reply carrying every successfully stamped document.
#[derive(Debug, Clone)]
pub struct Reply {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<ReplyAttachment>,
}

impl Reply {
    /// Attachments are named `weather_updated_document_<n>.pdf`, `n` starting at 1.
    pub fn new(to: &str, subject_filter: &str, documents: Vec<Vec<u8>>) -> Self {
        let attachments = documents
            .into_iter()
            .enumerate()
            .map(|(index, content)| ReplyAttachment {
                filename: format!("weather_updated_document_{}.pdf", index + 1),
                content,
            })
            .collect();

        Reply {
            to: to.to_string(),
            subject: format!("Re: {}", subject_filter),
            body: REPLY_BODY.to_string(),
            attachments,
        }
    }

    /// Builds the multipart MIME message: a plain-text part then one PDF per attachment.
    pub fn to_message(&self, from: &str) -> Result<Message> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| ResponderError::Send(format!("invalid from address '{}': {}", from, e)))?;
        let to: Mailbox = self
            .to
            .parse()
            .map_err(|e| ResponderError::Send(format!("invalid recipient '{}': {}", self.to, e)))?;
        let pdf_type = ContentType::parse("application/pdf")
            .map_err(|e| ResponderError::Send(format!("invalid content type: {}", e)))?;

        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        for attachment in &self.attachments {
            // Binary PDFs must never go out as 7bit/8bit text.
            let body = Body::new_with_encoding(attachment.content.clone(), ContentTransferEncoding::Base64)
                .map_err(|_| ResponderError::Send(format!("cannot encode {}", attachment.filename)))?;
            multipart = multipart
                .singlepart(Attachment::new(attachment.filename.clone()).body(body, pdf_type.clone()));
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(multipart)
            .map_err(|e| ResponderError::Send(format!("failed to build email: {}", e)))
    }
}

/// Sends replies over SMTP with STARTTLS.
pub struct SmtpReplySender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpReplySender {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let credentials = Credentials::new(config.address.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(|e| ResponderError::Connection(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(SmtpReplySender {
            transport,
            from_address: config.address.clone(),
        })
    }

    pub async fn send(&self, reply: &Reply) -> Result<()> {
        let message = reply.to_message(&self.from_address)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ResponderError::Send(format!("SMTP send failed: {}", e)))?;

        info!("Reply sent to {} with {} updated PDF(s)", reply.to, reply.attachments.len());
        Ok(())
    }
}

impl ReplySender for SmtpReplySender {
    fn send_reply<'a>(&'a self, reply: &'a Reply) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.send(reply))
    }
}

/// Dry-run stand-in: writes the stamped PDFs to a directory instead of mailing them.
pub struct DiskReplySender {
    data_dir: PathBuf,
}

impl DiskReplySender {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        DiskReplySender {
            data_dir: data_dir.into(),
        }
    }

    pub async fn write(&self, reply: &Reply) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let prefix = Local::now().format("%Y%m%d_%H%M%S");
        let recipient: String = reply
            .to
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();

        let mut written = Vec::with_capacity(reply.attachments.len());
        for attachment in &reply.attachments {
            let path = self
                .data_dir
                .join(format!("{}_{}_{}", prefix, recipient, attachment.filename));
            tokio::fs::write(&path, &attachment.content).await?;
            debug!("Dry-run output written: {:?}", path);
            written.push(path);
        }

        info!("🧪 {} document(s) for {} saved to {:?}", written.len(), reply.to, self.data_dir);
        Ok(written)
    }
}

impl ReplySender for DiskReplySender {
    fn send_reply<'a>(&'a self, reply: &'a Reply) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.write(reply).await.map(|_| ()) })
    }
}
