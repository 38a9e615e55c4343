use chrono::{DateTime, Utc};

/// Lifecycle phase of a game, independent of any provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scheduled,
    PreGame,
    InProgress,
    Ended,
    NoGame,
    Unknown,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Scheduled => "scheduled",
            Phase::PreGame => "pre-game",
            Phase::InProgress => "in progress",
            Phase::Ended => "ended",
            Phase::NoGame => "no game",
            Phase::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Which side of the matchup the tracked team plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    /// Resolve the tracked team's side from a snapshot's team identity.
    /// Anything other than a home-team match is treated as away.
    pub fn resolve(team_id: u32, snapshot: &GameSnapshot) -> Self {
        if snapshot.home_team_id == team_id {
            TeamSide::Home
        } else {
            TeamSide::Away
        }
    }
}

/// One fetched view of the tracked team's game
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub phase: Phase,
    /// Raw provider status, kept for log lines only
    pub status: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_score: u32,
    pub away_score: u32,
    pub fetched_at: DateTime<Utc>,
}

impl GameSnapshot {
    pub fn score_for(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Home => self.home_score,
            TeamSide::Away => self.away_score,
        }
    }

    /// A `NoGame` snapshot carrying over the teams and scores of `prev`.
    /// Used when the provider stops returning game data mid-session.
    pub fn no_game_after(prev: &GameSnapshot) -> Self {
        GameSnapshot {
            phase: Phase::NoGame,
            status: "No game data".to_string(),
            fetched_at: Utc::now(),
            ..prev.clone()
        }
    }
}

/// A detected goal handed to the notification sink
#[derive(Debug, Clone, PartialEq)]
pub struct GoalAlert {
    pub team_id: u32,
    /// The tracked team's new score
    pub score: u32,
    pub detected_at: DateTime<Utc>,
}
