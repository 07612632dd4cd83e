//! Error types shared by every stage of the responder.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResponderError {
    /// Mailbox or SMTP server unreachable, TLS or login failure.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("sender {0} is not in the allow-list")]
    Authorization(String),

    /// Malformed weather payload, unreadable PDF or unparseable message.
    #[error("data error: {0}")]
    Data(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ResponderError>;
