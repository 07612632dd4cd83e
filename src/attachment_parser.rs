use log::{debug, info};
use mail_parser::{Message, MessageParser, MimeHeaders};

use crate::allow_list::normalize_sender;
use crate::email::MailboxMessage;
use crate::error::{ResponderError, Result};

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

pub struct AttachmentParser;

impl AttachmentParser {
    /// Parses a raw RFC 822 message into the fields the pipeline needs.
    /// Only PDF attachments are retained.
    pub fn parse_message(id: u32, raw_email: &[u8]) -> Result<MailboxMessage> {
        debug!("Parsing message {} ({} bytes)", id, raw_email.len());

        let message = MessageParser::default()
            .parse(raw_email)
            .ok_or_else(|| ResponderError::Data(format!("message {} is not valid MIME", id)))?;

        let (sender_raw, sender) = Self::sender(&message)
            .ok_or_else(|| ResponderError::Data(format!("message {} has no sender", id)))?;

        let subject = message.subject().unwrap_or_default().to_string();
        let attachments = Self::pdf_attachments(&message);

        Ok(MailboxMessage {
            id,
            sender_raw,
            sender,
            subject,
            attachments,
        })
    }

    /// Every part with an `attachment` disposition whose filename ends in `.pdf`.
    pub fn pdf_attachments(message: &Message<'_>) -> Vec<Attachment> {
        let mut attachments = Vec::new();

        for (index, part) in message.parts.iter().enumerate() {
            let is_attachment = part
                .content_disposition()
                .map(|disposition| disposition.ctype().eq_ignore_ascii_case("attachment"))
                .unwrap_or(false);
            if !is_attachment {
                continue;
            }

            let Some(filename) = part.attachment_name() else {
                debug!("Part {} is an attachment without a filename, skipping", index);
                continue;
            };

            if !Self::is_pdf(filename) {
                debug!("Skipping non-PDF attachment: {}", filename);
                continue;
            }

            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/pdf".to_string());

            debug!("PDF attachment found: {} ({} bytes)", filename, part.contents().len());

            attachments.push(Attachment {
                filename: filename.to_string(),
                content: part.contents().to_vec(),
                content_type,
            });
        }

        info!("Found {} PDF attachment(s)", attachments.len());
        attachments
    }

    pub fn is_pdf(filename: &str) -> bool {
        filename.to_lowercase().ends_with(".pdf")
    }

    /// Display form of the first `From` address and the bare address used
    /// for authorization. The address comes from the parsed header, never
    /// from re-reading the display form.
    fn sender(message: &Message<'_>) -> Option<(String, String)> {
        let addr = message.from().and_then(|addrs| addrs.first())?;
        match (&addr.name, &addr.address) {
            (name, Some(email)) => {
                let raw = match name {
                    Some(name) => format!("{} <{}>", name, email),
                    None => email.to_string(),
                };
                Some((raw, email.trim().to_lowercase()))
            }
            (Some(name), None) => {
                let sender = normalize_sender(name);
                if sender.is_empty() {
                    None
                } else {
                    Some((name.to_string(), sender))
                }
            }
            (None, None) => None,
        }
    }
}
