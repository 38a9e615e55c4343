use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::game::GameSnapshot;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("score API returned {0}")]
    Status(StatusCode),
    #[error("failed to decode score API response: {0}")]
    Decode(String),
    /// The schedule has no game entry for the team yet.
    #[error("no game data available")]
    NoGameData,
}

/// Trait that every score source must implement.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    /// Fetch the current state of `team_id`'s game.
    async fn fetch(&self, team_id: u32) -> Result<GameSnapshot, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
