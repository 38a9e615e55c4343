pub mod nhl;
pub mod provider;

pub use nhl::NhlStatsApi;
pub use provider::{FetchError, ScoreSource};
