pub mod models;
pub mod tracker;

pub use models::{GameSnapshot, GoalAlert, Phase, TeamSide};
pub use tracker::{GameStateTracker, PollIntervals};
