use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub mail: MailConfig,
    pub weather: WeatherConfig,
    pub processing: ProcessingConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub address: String,
    pub password: String,
    pub imap_server: String,
    pub imap_port: u16,
    pub smtp_server: String,
    pub smtp_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    pub api_key: String,
    pub api_url: String,
    pub default_city: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    pub subject_filter: String,
    pub allowed_senders_path: String,
    pub log_path: String,
    /// Label applied after a successful reply. `None` disables labelling.
    pub processed_label: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (e.g., ["08:00", "18:00"])
}

pub const DEFAULT_SUBJECT_FILTER: &str = "Local-weather-update";
pub const DEFAULT_WEATHER_API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

const REQUIRED_VARS: [&str; 4] = [
    "GMAIL_ADDRESS",
    "GMAIL_APP_PASSWORD",
    "WEATHER_API_KEY",
    "DEFAULT_CITY",
];

impl Config {
    pub fn new() -> Result<Self> {
        Self::check_required_env_vars()?;

        let config = Config {
            mail: MailConfig {
                address: required("GMAIL_ADDRESS")?,
                password: required("GMAIL_APP_PASSWORD")?,
                imap_server: std::env::var("IMAP_SERVER")
                    .unwrap_or_else(|_| "imap.gmail.com".to_string()),
                imap_port: parse_or("IMAP_PORT", 993),
                smtp_server: std::env::var("SMTP_SERVER")
                    .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                smtp_port: parse_or("SMTP_PORT", 587),
            },
            weather: WeatherConfig {
                api_key: required("WEATHER_API_KEY")?,
                api_url: std::env::var("WEATHER_API_URL")
                    .unwrap_or_else(|_| DEFAULT_WEATHER_API_URL.to_string()),
                default_city: required("DEFAULT_CITY")?.trim().to_string(),
            },
            processing: ProcessingConfig {
                subject_filter: std::env::var("SUBJECT_FILTER")
                    .unwrap_or_else(|_| DEFAULT_SUBJECT_FILTER.to_string()),
                allowed_senders_path: std::env::var("ALLOWED_SENDERS_PATH")
                    .unwrap_or_else(|_| "allowed_senders.csv".to_string()),
                log_path: std::env::var("PROCESSING_LOG_PATH")
                    .unwrap_or_else(|_| "processing_log.json".to_string()),
                processed_label: match std::env::var("PROCESSED_LABEL") {
                    Ok(label) if !label.trim().is_empty() => Some(label.trim().to_string()),
                    _ => {
                        log::info!("PROCESSED_LABEL not set - processed messages will only be marked read");
                        None
                    }
                },
            },
            scheduler: SchedulerConfig {
                enabled: parse_or("SCHEDULER_ENABLED", false),
                schedule_times: std::env::var("SCHEDULER_TIMES")
                    .unwrap_or_else(|_| "08:00".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Replaces the configured city, e.g. from the command line.
    pub fn with_city(mut self, city: &str) -> Result<Self> {
        self.weather.default_city = city.trim().to_string();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.weather.default_city.is_empty() {
            anyhow::bail!("DEFAULT_CITY must not be empty");
        }
        if self.processing.subject_filter.trim().is_empty() {
            anyhow::bail!("SUBJECT_FILTER must not be empty");
        }
        if self.processing.subject_filter.contains('"') {
            anyhow::bail!("SUBJECT_FILTER must not contain double quotes");
        }
        Ok(())
    }

    fn check_required_env_vars() -> Result<()> {
        let missing_vars: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|var| std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true))
            .collect();

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 \n\
                 💡 Solutions:\n\
                 1. Create a .env file with your credentials:\n\
                    GMAIL_ADDRESS=you@gmail.com\n\
                    GMAIL_APP_PASSWORD=xxxx xxxx xxxx xxxx\n\
                    WEATHER_API_KEY=your-openweathermap-key\n\
                    DEFAULT_CITY=Paris\n\
                 \n\
                 2. Or export the variables manually before running:\n\
                    cargo run -- --check-config",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}

fn required(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("{} must be set", var))
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
