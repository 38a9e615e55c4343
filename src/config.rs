use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::game::PollIntervals;

/// Log verbosity, named the way the original deployment's env files spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
    /// Reported through tracing's ERROR level
    #[value(name = "CRITICAL")]
    Critical,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

/// Fires a Home Assistant webhook whenever the tracked NHL team scores
#[derive(Parser, Debug, Clone)]
#[command(name = "nhl-goal-alert", version, about)]
pub struct Config {
    /// NHL team ID to watch (Blues = 19, Canes = 12, Stars = 25)
    #[arg(long, env = "TEAM_ID", default_value = "19")]
    pub team_id: u32,

    /// NHL stats API base URL
    #[arg(
        long,
        env = "SCORE_API_URL",
        default_value = "https://statsapi.web.nhl.com/api/v1"
    )]
    pub score_api_url: String,

    /// Home Assistant host name or IP address
    #[arg(long, env = "HA_HOST", default_value = "homeassistant")]
    pub ha_host: String,

    /// Home Assistant port
    #[arg(long, env = "HA_PORT", default_value = "8123")]
    pub ha_port: u16,

    /// Home Assistant webhook invoked on each goal
    #[arg(long, env = "WEBHOOK_ID", default_value = "press_nhl_goal_button")]
    pub webhook_id: String,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(
        long,
        env = "LOG_LEVEL",
        value_enum,
        ignore_case = true,
        default_value = "INFO"
    )]
    pub log_level: LogLevel,

    /// File to append log lines to ("-" for stderr)
    #[arg(long, env = "LOG_FILE", default_value = "nhl_goal_alert.log")]
    pub log_file: String,

    /// Timeout for every HTTP call and the Home Assistant reachability check
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "7")]
    pub http_timeout_secs: u64,

    /// Poll interval before the game, in seconds
    #[arg(long, env = "SCHEDULED_INTERVAL_SECS", default_value = "40")]
    pub scheduled_interval_secs: u64,

    /// Poll interval during pre-game, in seconds
    #[arg(long, env = "PREGAME_INTERVAL_SECS", default_value = "10")]
    pub pregame_interval_secs: u64,

    /// Poll interval while the game is live, in seconds
    #[arg(long, env = "LIVE_INTERVAL_SECS", default_value = "3")]
    pub live_interval_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.team_id == 0 {
            anyhow::bail!("TEAM_ID must be a positive NHL team ID");
        }
        if self.ha_host.trim().is_empty() {
            anyhow::bail!("HA_HOST must not be empty");
        }
        if self.webhook_id.trim().is_empty() {
            anyhow::bail!("WEBHOOK_ID must not be empty");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be at least 1");
        }
        if let Err(e) = url::Url::parse(&self.score_api_url) {
            anyhow::bail!("SCORE_API_URL is not a valid URL: {}", e);
        }
        Ok(())
    }

    pub fn intervals(&self) -> PollIntervals {
        PollIntervals {
            scheduled_secs: self.scheduled_interval_secs,
            pregame_secs: self.pregame_interval_secs,
            live_secs: self.live_interval_secs,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn logs_to_stderr(&self) -> bool {
        self.log_file == "-"
    }
}
