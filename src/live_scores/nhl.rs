use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::provider::{FetchError, ScoreSource};
use crate::game::{GameSnapshot, Phase};

/// Score source backed by the NHL stats API schedule endpoint.
pub struct NhlStatsApi {
    http: Client,
    /// `{base}/schedule`, without the per-team query
    schedule_endpoint: Url,
}

impl NhlStatsApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        // Trailing slash so `schedule` joins underneath the base path
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let schedule_endpoint = Url::parse(&base)
            .and_then(|b| b.join("schedule"))
            .with_context(|| format!("Invalid score API URL: {}", base_url))?;
        Ok(NhlStatsApi {
            http,
            schedule_endpoint,
        })
    }

    fn schedule_url(&self, team_id: u32) -> Url {
        let mut url = self.schedule_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("teamId", &team_id.to_string())
            .append_pair("hydrate", "scoringplays");
        url
    }
}

#[async_trait]
impl ScoreSource for NhlStatsApi {
    fn name(&self) -> &str {
        "NHL stats API"
    }

    async fn fetch(&self, team_id: u32) -> Result<GameSnapshot, FetchError> {
        let url = self.schedule_url(team_id);
        debug!("Fetching schedule from {}", url);

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let body = resp.text().await?;
        parse_schedule_response(&body)
    }
}

// ── Schedule payload ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    dates: Vec<ScheduleDate>,
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    #[serde(default)]
    games: Vec<ScheduleGame>,
}

#[derive(Debug, Deserialize)]
struct ScheduleGame {
    status: ScheduleStatus,
    teams: ScheduleTeams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleStatus {
    detailed_state: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleTeams {
    home: ScheduleTeamEntry,
    away: ScheduleTeamEntry,
}

#[derive(Debug, Deserialize)]
struct ScheduleTeamEntry {
    #[serde(default)]
    score: u32,
    team: ScheduleTeamRef,
}

#[derive(Debug, Deserialize)]
struct ScheduleTeamRef {
    id: u32,
}

/// Decode a schedule body into a snapshot of its first game.
fn parse_schedule_response(body: &str) -> Result<GameSnapshot, FetchError> {
    let raw: ScheduleResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let game = raw
        .dates
        .into_iter()
        .next()
        .and_then(|d| d.games.into_iter().next())
        .ok_or(FetchError::NoGameData)?;

    let status = game.status.detailed_state;
    Ok(GameSnapshot {
        phase: phase_from_detailed_state(&status),
        status,
        home_team_id: game.teams.home.team.id,
        away_team_id: game.teams.away.team.id,
        home_score: game.teams.home.score,
        away_score: game.teams.away.score,
        fetched_at: Utc::now(),
    })
}

/// Map the API's `detailedState` literal onto a [`Phase`].
fn phase_from_detailed_state(s: &str) -> Phase {
    match s {
        "Scheduled" => Phase::Scheduled,
        "Pre-Game" => Phase::PreGame,
        "In Progress" | "In Progress - Critical" => Phase::InProgress,
        "Game Over" | "Final" => Phase::Ended,
        "No Game Scheduled" => Phase::NoGame,
        _ => Phase::Unknown,
    }
}
