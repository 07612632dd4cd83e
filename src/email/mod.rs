pub mod common;
pub mod pipeline;

// Re-export commonly used items
pub use common::{
    Mailbox, MailboxMessage, MessageOutcome, ReplySender, RunSummary, SkipReason, WeatherProvider,
};
pub use pipeline::{EmailPipeline, PipelineSettings};
