use weather_pdf_responder::activity_log::ActivityLogEntry;
use weather_pdf_responder::config::{
    Config, MailConfig, ProcessingConfig, SchedulerConfig, WeatherConfig, DEFAULT_SUBJECT_FILTER,
    DEFAULT_WEATHER_API_URL,
};
use weather_pdf_responder::email_processor::{EmailProcessor, RunOptions};
use weather_pdf_responder::error::ResponderError;

fn config(allowed_senders_path: String, log_path: String) -> Config {
    Config {
        mail: MailConfig {
            address: "bot@example.com".to_string(),
            password: "secret".to_string(),
            // Never reached: the run stops before connecting.
            imap_server: "127.0.0.1".to_string(),
            imap_port: 1,
            smtp_server: "127.0.0.1".to_string(),
            smtp_port: 1,
        },
        weather: WeatherConfig {
            api_key: "key".to_string(),
            api_url: DEFAULT_WEATHER_API_URL.to_string(),
            default_city: "Paris".to_string(),
        },
        processing: ProcessingConfig {
            subject_filter: DEFAULT_SUBJECT_FILTER.to_string(),
            allowed_senders_path,
            log_path,
            processed_label: None,
        },
        scheduler: SchedulerConfig {
            enabled: false,
            schedule_times: vec![],
        },
    }
}

async fn run_without_senders(csv: Option<&str>) -> (Result<(), ResponderError>, Vec<ActivityLogEntry>) {
    let dir = tempfile::tempdir().unwrap();
    let senders = dir.path().join("allowed_senders.csv");
    if let Some(content) = csv {
        std::fs::write(&senders, content).unwrap();
    }
    let log_path = dir.path().join("processing_log.json");

    let processor = EmailProcessor::new(
        config(
            senders.to_string_lossy().into_owned(),
            log_path.to_string_lossy().into_owned(),
        ),
        RunOptions {
            dry_run: true,
            data_dir: dir.path().join("data"),
            limit: None,
        },
    );
    let result = processor.run_once().await.map(|_| ());

    let entries = serde_json::from_str(&std::fs::read_to_string(&log_path).unwrap()).unwrap();
    (result, entries)
}

#[tokio::test]
async fn test_missing_allow_list_stops_the_run() {
    let (result, entries) = run_without_senders(None).await;

    assert!(matches!(result, Err(ResponderError::Config(_))));
    let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages[0], "Starting email processing...");
    assert!(messages[1].starts_with("Error loading allowed senders"));
    assert_eq!(messages[2], "No allowed senders found. Exiting.");
    assert_eq!(messages.len(), 3);
}

#[tokio::test]
async fn test_empty_allow_list_stops_the_run() {
    let (result, entries) = run_without_senders(Some("email\n")).await;

    assert!(matches!(result, Err(ResponderError::Config(_))));
    assert_eq!(entries[1].message, "Loaded 0 allowed senders");
    assert_eq!(entries.last().unwrap().message, "No allowed senders found. Exiting.");
}
