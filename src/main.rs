use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;

use weather_pdf_responder::config::Config;
use weather_pdf_responder::email_processor::{EmailProcessor, RunOptions};

#[derive(Parser)]
#[command(name = "weather-pdf-responder")]
#[command(about = "Replies to allowed senders with their PDFs stamped with the current weather")]
#[command(version = "0.1.0")]
struct Args {
    /// Dry-run mode: stamp the PDFs but save them locally instead of replying
    #[arg(short, long)]
    dry_run: bool,

    /// Daemon mode: run at the times listed in SCHEDULER_TIMES
    #[arg(long)]
    daemon: bool,

    /// Output directory for dry-run documents
    #[arg(short = 'o', long, default_value = "./data")]
    data_dir: PathBuf,

    /// Maximum number of emails to process per run (default: unlimited)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// City for the weather lookup (overrides DEFAULT_CITY)
    #[arg(short, long)]
    city: Option<String>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if args.dry_run {
        info!("🧪 Starting weather PDF responder in DRY-RUN mode");
    } else {
        info!("🚀 Starting weather PDF responder");
    }

    let mut config = Config::new()?;
    if let Some(city) = &args.city {
        config = config.with_city(city)?;
    }

    if args.check_config {
        print_config(&config);
        return Ok(());
    }

    let options = RunOptions {
        dry_run: args.dry_run,
        data_dir: args.data_dir.clone(),
        limit: args.limit,
    };

    if args.daemon {
        info!("🔄 Starting in daemon mode");
        return run_daemon_mode(config, options).await;
    }

    let processor = EmailProcessor::new(config, options);
    match processor.run_once().await {
        Ok(summary) => {
            info!(
                "✅ Run finished: {} matched, {} replied, {} skipped, {} failed",
                summary.matched, summary.replied, summary.skipped, summary.failed
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Run aborted: {}", e);
            Err(e.into())
        }
    }
}

fn print_config(config: &Config) {
    println!("✅ Configuration valid!");
    println!("📧 Mailbox: {} via {}:{}", config.mail.address, config.mail.imap_server, config.mail.imap_port);
    println!("📤 SMTP: {}:{} (STARTTLS)", config.mail.smtp_server, config.mail.smtp_port);
    println!("🌤️  City: {}", config.weather.default_city);
    println!("🔎 Subject filter: {}", config.processing.subject_filter);
    println!("👥 Allowed senders: {}", config.processing.allowed_senders_path);
    println!("📝 Activity log: {}", config.processing.log_path);
    match &config.processing.processed_label {
        Some(label) => println!("🏷️  Processed label: {}", label),
        None => println!("🏷️  Processed label: disabled"),
    }
    if config.scheduler.enabled {
        println!("📅 Schedule (UTC): {}", config.scheduler.schedule_times.join(", "));
    }
}

async fn run_daemon_mode(config: Config, options: RunOptions) -> Result<()> {
    use tokio_cron_scheduler::{Job, JobScheduler};

    if !config.scheduler.enabled {
        anyhow::bail!("Daemon mode requires SCHEDULER_ENABLED=true");
    }

    let mut scheduler = JobScheduler::new().await?;
    let mut scheduled = 0;

    for schedule_time in &config.scheduler.schedule_times {
        let time = match NaiveTime::parse_from_str(schedule_time, "%H:%M") {
            Ok(time) => time,
            Err(_) => {
                warn!("Invalid schedule time '{}', expected HH:MM", schedule_time);
                continue;
            }
        };

        // sec min hour day month weekday
        let cron_expr = format!("0 {} {} * * *", time.format("%M"), time.format("%H"));
        info!("📆 Scheduling run at {} UTC (cron: {})", schedule_time, cron_expr);

        let config = config.clone();
        let options = options.clone();
        let label = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let processor = EmailProcessor::new(config.clone(), options.clone());
            let label = label.clone();

            Box::pin(async move {
                info!("⏰ Scheduled run ({})", label);
                match processor.run_once().await {
                    Ok(summary) => info!(
                        "✅ Scheduled run ({}) finished: {} replied, {} skipped, {} failed",
                        label, summary.replied, summary.skipped, summary.failed
                    ),
                    Err(e) => error!("❌ Scheduled run ({}) aborted: {}", label, e),
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduled += 1;
    }

    if scheduled == 0 {
        anyhow::bail!("No valid schedule time in SCHEDULER_TIMES");
    }

    scheduler.start().await?;
    info!("✅ Daemon started with {} scheduled run(s). Press Ctrl+C to stop", scheduled);

    tokio::signal::ctrl_c()
        .await
        .context("Unable to listen for Ctrl+C")?;

    info!("Shutting down scheduler");
    scheduler.shutdown().await?;
    Ok(())
}
