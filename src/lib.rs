// Library exports for weather-pdf-responder
// This allows tests and the binary to share the modules

pub mod activity_log;
pub mod allow_list;
pub mod attachment_parser;
pub mod config;
pub mod email;
pub mod email_processor;
pub mod error;
pub mod imap_client;
pub mod pdf_stamper;
pub mod smtp_sender;
pub mod weather_client;

pub use error::{ResponderError, Result};
