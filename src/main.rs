use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

mod config;
mod game;
mod live_scores;
mod notify;
mod poll_loop;

use config::Config;
use live_scores::NhlStatsApi;
use notify::HomeAssistantWebhook;
use poll_loop::PollLoop;

const LOG_TIME_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(e) = init_logging(&config) {
        eprintln!("nhl-goal-alert: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}. Exiting.", e);
            eprintln!("nhl-goal-alert: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialise tracing. `RUST_LOG` wins over `LOG_LEVEL` when set.
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()));

    if config.logs_to_stderr() {
        builder.init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;

    info!(
        "STARTING with Team ID: {}, Webhook ID: {}",
        config.team_id, config.webhook_id
    );

    let source = NhlStatsApi::new(&config.score_api_url, config.http_timeout())?;
    let sink = HomeAssistantWebhook::new(
        &config.ha_host,
        config.ha_port,
        &config.webhook_id,
        config.http_timeout(),
    )?;
    info!("Goals will be sent to {}", sink.url());

    // Ctrl-C cuts start-up or the current sleep short and ends the session cleanly
    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.notify_one();
            }
        });
    }

    let report = PollLoop::new(
        config.team_id,
        Arc::new(source),
        Arc::new(sink),
        config.intervals(),
    )
    .with_shutdown(shutdown)
    .run()
    .await?;

    info!(
        "DONE. {} polls, {} failed fetches, {} goals notified ({} failed), last phase: {}",
        report.polls,
        report.fetch_failures,
        report.notifications_sent,
        report.notifications_failed,
        report
            .final_phase
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    if report.interrupted {
        info!("Session was interrupted before the game ended");
    }
    Ok(())
}
