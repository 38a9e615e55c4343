use tracing::info;

use super::models::{GameSnapshot, Phase, TeamSide};

/// Poll cadence per phase, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub scheduled_secs: u64,
    pub pregame_secs: u64,
    pub live_secs: u64,
}

impl Default for PollIntervals {
    fn default() -> Self {
        PollIntervals {
            scheduled_secs: 40,
            pregame_secs: 10,
            live_secs: 3,
        }
    }
}

/// Outcome of one state-machine step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDecision {
    pub should_notify: bool,
    /// The tracked team's new score, set only when `should_notify` is
    pub notify_score: Option<u32>,
    /// Seconds to wait before the next fetch. Unused when `terminate` is set.
    pub next_interval_secs: u64,
    pub terminate: bool,
}

impl PollDecision {
    fn wait(secs: u64) -> Self {
        PollDecision {
            should_notify: false,
            notify_score: None,
            next_interval_secs: secs,
            terminate: false,
        }
    }

    fn stop() -> Self {
        PollDecision {
            should_notify: false,
            notify_score: None,
            next_interval_secs: 0,
            terminate: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub last_known_score: u32,
    /// False until the first in-progress (or ended) snapshot has been seen
    pub has_observed_score: bool,
    /// Phase of the most recent snapshot; `None` before the first step
    pub phase: Option<Phase>,
}

/// Per-session state machine over game phases.
///
/// Notifies at most once per genuine increase of the tracked team's score:
/// never on the first observed score (attaching mid-game), never twice for the
/// same value, and again after a downward correction is followed by a new
/// increase.
#[derive(Debug, Clone)]
pub struct GameStateTracker {
    side: TeamSide,
    intervals: PollIntervals,
    state: TrackerState,
}

impl GameStateTracker {
    pub fn new(side: TeamSide, intervals: PollIntervals) -> Self {
        GameStateTracker {
            side,
            intervals,
            state: TrackerState::default(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn phase(&self) -> Option<Phase> {
        self.state.phase
    }

    /// Feed one snapshot through the state machine.
    pub fn step(&mut self, snapshot: &GameSnapshot) -> PollDecision {
        self.state.phase = Some(snapshot.phase);

        match snapshot.phase {
            Phase::Scheduled => PollDecision::wait(self.intervals.scheduled_secs),
            Phase::PreGame => PollDecision::wait(self.intervals.pregame_secs),
            Phase::InProgress => {
                let mut decision = PollDecision::wait(self.intervals.live_secs);
                decision.notify_score = self.observe(snapshot.score_for(self.side));
                decision.should_notify = decision.notify_score.is_some();
                decision
            }
            Phase::Ended => {
                // The final status can arrive together with the deciding goal.
                let mut decision = PollDecision::stop();
                decision.notify_score = self.observe(snapshot.score_for(self.side));
                decision.should_notify = decision.notify_score.is_some();
                decision
            }
            Phase::NoGame | Phase::Unknown => PollDecision::stop(),
        }
    }

    /// Record `current` as the last known score. Returns the score to notify
    /// for, if it is a strict increase over an earlier observation.
    fn observe(&mut self, current: u32) -> Option<u32> {
        if !self.state.has_observed_score {
            self.state.has_observed_score = true;
            self.state.last_known_score = current;
            return None;
        }

        let previous = self.state.last_known_score;
        self.state.last_known_score = current;

        if current > previous {
            Some(current)
        } else {
            if current < previous {
                info!("Score corrected from {} to {}, no notification sent", previous, current);
            }
            None
        }
    }
}
