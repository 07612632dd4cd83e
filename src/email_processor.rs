use log::{error, info};
use std::path::PathBuf;

use crate::activity_log::ActivityLog;
use crate::allow_list::AllowList;
use crate::config::Config;
use crate::email::{EmailPipeline, PipelineSettings, RunSummary};
use crate::error::{ResponderError, Result};
use crate::imap_client::ImapClient;
use crate::smtp_sender::{DiskReplySender, SmtpReplySender};
use crate::weather_client::WeatherClient;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Write stamped PDFs to `data_dir` instead of replying; leave messages unread.
    pub dry_run: bool,
    pub data_dir: PathBuf,
    pub limit: Option<usize>,
}

/// One complete pass: load allow-list, connect, process, disconnect, save log.
pub struct EmailProcessor {
    config: Config,
    options: RunOptions,
}

impl EmailProcessor {
    pub fn new(config: Config, options: RunOptions) -> Self {
        if options.dry_run {
            info!("🧪 Initializing email processor in dry-run mode (no replies, no flags)");
        } else {
            info!("Initializing email processor");
        }
        EmailProcessor { config, options }
    }

    /// The activity log is written exactly once, whatever the outcome.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let mut log = ActivityLog::new(&self.config.processing.log_path);
        log.record("Starting email processing...", None);

        let result = self.execute(&mut log).await;
        if result.is_ok() {
            log.record("Email processing completed", None);
        }

        if let Err(e) = log.flush() {
            error!("❌ Unable to save activity log: {}", e);
            return Err(e);
        }
        result
    }

    async fn execute(&self, log: &mut ActivityLog) -> Result<RunSummary> {
        let allow_list = self.load_allow_list(log);
        if allow_list.is_empty() {
            log.record("No allowed senders found. Exiting.", None);
            return Err(ResponderError::Config("no allowed senders".to_string()));
        }

        let weather = WeatherClient::new(&self.config.weather)?;
        let settings = PipelineSettings {
            subject_filter: self.config.processing.subject_filter.clone(),
            city: self.config.weather.default_city.clone(),
            processed_label: self.config.processing.processed_label.clone(),
            acknowledge: !self.options.dry_run,
            limit: self.options.limit,
        };

        let smtp = if self.options.dry_run {
            None
        } else {
            match SmtpReplySender::new(&self.config.mail) {
                Ok(replies) => Some(replies),
                Err(e) => {
                    log.record_failure(format!("Failed to configure SMTP: {}", e), None);
                    return Err(e);
                }
            }
        };

        let mut mailbox = match ImapClient::connect(&self.config.mail).await {
            Ok(mailbox) => {
                log.record("Successfully connected to mailbox", None);
                mailbox
            }
            Err(e) => {
                log.record_failure(format!("Failed to connect to mailbox: {}", e), None);
                return Err(e);
            }
        };

        let summary = match &smtp {
            Some(replies) => {
                EmailPipeline::new(settings, &allow_list, &weather, replies)
                    .run(&mut mailbox, log)
                    .await
            }
            None => {
                let replies = DiskReplySender::new(&self.options.data_dir);
                EmailPipeline::new(settings, &allow_list, &weather, &replies)
                    .run(&mut mailbox, log)
                    .await
            }
        };

        Ok(summary)
    }

    /// Any read or parse failure yields an empty list, which stops the run.
    fn load_allow_list(&self, log: &mut ActivityLog) -> AllowList {
        match AllowList::from_csv_path(&self.config.processing.allowed_senders_path) {
            Ok(allow_list) => {
                log.record(format!("Loaded {} allowed senders", allow_list.len()), None);
                allow_list
            }
            Err(e) => {
                log.record_failure(format!("Error loading allowed senders: {}", e), None);
                AllowList::default()
            }
        }
    }
}
