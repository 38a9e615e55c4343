//! Drives one game-watch session: fetch → decide → (notify) → sleep.
//!
//! ```text
//!  Starting ──first fetch ok──▶ Polling ──terminate / shutdown──▶ Done
//!     │                          │  ▲
//!     └──sink or fetch failure──▶ Done
//!                                └──┘ step, sleep, fetch
//! ```
//!
//! Failures never escape a cycle once polling has started: a failed fetch
//! reuses the previous snapshot and a failed notification is only logged.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::game::{GameSnapshot, GameStateTracker, GoalAlert, Phase, PollIntervals, TeamSide};
use crate::live_scores::{FetchError, ScoreSource};
use crate::notify::{NotificationSink, NotifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Polling,
    Done,
}

/// Conditions that stop a session before polling begins.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("notification target unavailable: {0}")]
    SinkUnavailable(#[source] NotifyError),
    #[error("first call to the score API failed: {0}")]
    FirstFetch(#[source] FetchError),
    #[error("game info for team {0} is not yet available from the score API")]
    NoGameData(u32),
}

/// Counters logged when a session ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub polls: u32,
    pub fetch_failures: u32,
    pub notifications_sent: u32,
    pub notifications_failed: u32,
    pub final_phase: Option<Phase>,
    /// Set when a shutdown signal cut the session short
    pub interrupted: bool,
}

struct Session {
    tracker: GameStateTracker,
    /// Latest good snapshot; reused when a fetch fails
    current: GameSnapshot,
}

pub struct PollLoop {
    team_id: u32,
    source: Arc<dyn ScoreSource>,
    sink: Arc<dyn NotificationSink>,
    intervals: PollIntervals,
    shutdown: Option<Arc<Notify>>,
    state: LoopState,
    session: Option<Session>,
    report: SessionReport,
}

impl PollLoop {
    pub fn new(
        team_id: u32,
        source: Arc<dyn ScoreSource>,
        sink: Arc<dyn NotificationSink>,
        intervals: PollIntervals,
    ) -> Self {
        PollLoop {
            team_id,
            source,
            sink,
            intervals,
            shutdown: None,
            state: LoopState::Starting,
            session: None,
            report: SessionReport::default(),
        }
    }

    /// Let `shutdown` interrupt start-up or the sleep between polls.
    pub fn with_shutdown(mut self, shutdown: Arc<Notify>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run the session to completion. A shutdown during start-up (sink
    /// check or first fetch) ends the session without an error.
    pub async fn run(mut self) -> Result<SessionReport, StartupError> {
        let started = match self.shutdown.clone() {
            Some(shutdown) => {
                tokio::select! {
                    biased;
                    result = self.start() => Some(result),
                    _ = shutdown.notified() => None,
                }
            }
            None => Some(self.start().await),
        };

        match started {
            Some(result) => result?,
            None => {
                info!("Shutdown requested during start-up");
                self.report.interrupted = true;
                self.state = LoopState::Done;
                return Ok(self.report);
            }
        }

        while self.state() == LoopState::Polling {
            self.cycle().await;
        }
        Ok(self.report)
    }

    async fn start(&mut self) -> Result<(), StartupError> {
        if let Err(e) = self.sink.ready().await {
            self.state = LoopState::Done;
            return Err(StartupError::SinkUnavailable(e));
        }

        let snapshot = match self.source.fetch(self.team_id).await {
            Ok(s) => s,
            Err(FetchError::NoGameData) => {
                self.state = LoopState::Done;
                return Err(StartupError::NoGameData(self.team_id));
            }
            Err(e) => {
                self.state = LoopState::Done;
                return Err(StartupError::FirstFetch(e));
            }
        };

        let side = TeamSide::resolve(self.team_id, &snapshot);
        if side == TeamSide::Away && snapshot.away_team_id != self.team_id {
            warn!(
                "Team {} is neither home ({}) nor away ({}) in this game; tracking the away score",
                self.team_id, snapshot.home_team_id, snapshot.away_team_id
            );
        }
        info!(
            "Tracking team {} as {:?} ({} vs {})",
            self.team_id, side, snapshot.home_team_id, snapshot.away_team_id
        );

        self.session = Some(Session {
            tracker: GameStateTracker::new(side, self.intervals),
            current: snapshot,
        });
        self.state = LoopState::Polling;
        Ok(())
    }

    /// One polling cycle. Leaves the loop in `Polling` unless the tracker
    /// asked to terminate or a shutdown arrived during the sleep.
    async fn cycle(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.state = LoopState::Done;
            return;
        };

        let previous_phase = session.tracker.phase();
        let decision = session.tracker.step(&session.current);
        let phase = session.current.phase;
        let status = session.current.status.clone();
        debug!(
            "Step: {} (last known score {})",
            phase,
            session.tracker.state().last_known_score
        );

        self.report.polls += 1;
        self.report.final_phase = Some(phase);
        if previous_phase != Some(phase) {
            log_transition(previous_phase, phase, &status);
        }

        if let (true, Some(score)) = (decision.should_notify, decision.notify_score) {
            self.send_alert(score).await;
        }

        if decision.terminate {
            self.state = LoopState::Done;
            return;
        }

        if !self.pause(Duration::from_secs(decision.next_interval_secs)).await {
            info!("Shutdown requested, stopping the session");
            self.report.interrupted = true;
            self.state = LoopState::Done;
            return;
        }

        self.refresh().await;
    }

    async fn send_alert(&mut self, score: u32) {
        info!("Goal number {}!", score);
        let alert = GoalAlert {
            team_id: self.team_id,
            score,
            detected_at: Utc::now(),
        };
        match self.sink.notify(&alert).await {
            Ok(()) => self.report.notifications_sent += 1,
            Err(e) => {
                self.report.notifications_failed += 1;
                warn!("{} failed for goal {}: {}", self.sink.name(), score, e);
            }
        }
    }

    /// Sleep for `interval`. Returns false if a shutdown arrived first.
    async fn pause(&self, interval: Duration) -> bool {
        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => true,
                    _ = shutdown.notified() => false,
                }
            }
            None => {
                tokio::time::sleep(interval).await;
                true
            }
        }
    }

    async fn refresh(&mut self) {
        let result = self.source.fetch(self.team_id).await;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match result {
            Ok(snapshot) => {
                debug!(
                    "[{}] {}: {}-{}",
                    snapshot.fetched_at.format("%H:%M:%S"),
                    snapshot.status,
                    snapshot.home_score,
                    snapshot.away_score
                );
                session.current = snapshot;
            }
            Err(FetchError::NoGameData) => {
                info!("Score API no longer lists a game for team {}", self.team_id);
                session.current = GameSnapshot::no_game_after(&session.current);
            }
            Err(e) => {
                self.report.fetch_failures += 1;
                warn!(
                    "{} call failed, reusing previous snapshot: {}",
                    self.source.name(),
                    e
                );
            }
        }
    }
}

fn log_transition(from: Option<Phase>, to: Phase, status: &str) {
    match to {
        Phase::Unknown => warn!("Unexpected game status, {}", status),
        _ => match from {
            Some(from) => info!("{}. ({} -> {})", status, from, to),
            None => info!("{}.", status),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const TEAM: u32 = 19;

    const NO_WAIT: PollIntervals = PollIntervals {
        scheduled_secs: 0,
        pregame_secs: 0,
        live_secs: 0,
    };

    fn snap(phase: Phase, score: u32) -> GameSnapshot {
        GameSnapshot {
            phase,
            status: format!("{:?}", phase),
            home_team_id: TEAM,
            away_team_id: 12,
            home_score: score,
            away_score: 0,
            fetched_at: Utc::now(),
        }
    }

    /// Replays a fixed list of fetch results, then reports no game data.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<GameSnapshot, FetchError>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<GameSnapshot, FetchError>>) -> Arc<Self> {
            Arc::new(ScriptedSource {
                script: Mutex::new(script.into()),
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScoreSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, team_id: u32) -> Result<GameSnapshot, FetchError> {
            assert_eq!(team_id, TEAM);
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::NoGameData))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        alerts: Mutex<Vec<u32>>,
        failing: bool,
        unreachable: bool,
    }

    impl RecordingSink {
        fn alerts(&self) -> Vec<u32> {
            self.alerts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn ready(&self) -> Result<(), NotifyError> {
            if self.unreachable {
                return Err(NotifyError::Unreachable {
                    host: "homeassistant".into(),
                    port: 8123,
                    reason: "connection refused".into(),
                });
            }
            Ok(())
        }

        async fn notify(&self, alert: &GoalAlert) -> Result<(), NotifyError> {
            self.alerts.lock().unwrap().push(alert.score);
            if self.failing {
                return Err(NotifyError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }
            Ok(())
        }
    }

    fn poll_loop(source: &Arc<ScriptedSource>, sink: &Arc<RecordingSink>) -> PollLoop {
        PollLoop::new(TEAM, source.clone(), sink.clone(), NO_WAIT)
    }

    #[tokio::test]
    async fn test_full_game_notifies_once() {
        let source = ScriptedSource::new(vec![
            Ok(snap(Phase::Scheduled, 0)),
            Ok(snap(Phase::PreGame, 0)),
            Ok(snap(Phase::InProgress, 0)),
            Ok(snap(Phase::InProgress, 1)),
            Ok(snap(Phase::Ended, 1)),
        ]);
        let sink = Arc::new(RecordingSink::default());

        let report = poll_loop(&source, &sink).run().await.unwrap();

        assert_eq!(sink.alerts(), vec![1]);
        assert_eq!(report.notifications_sent, 1);
        assert_eq!(report.polls, 5);
        assert_eq!(report.final_phase, Some(Phase::Ended));
        assert!(!report.interrupted);
        assert_eq!(source.fetches(), 5);
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_keeps_polling() {
        let source = ScriptedSource::new(vec![
            Ok(snap(Phase::InProgress, 0)),
            Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)),
            Ok(snap(Phase::InProgress, 1)),
            Ok(snap(Phase::Ended, 1)),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let mut pl = poll_loop(&source, &sink);

        pl.start().await.unwrap();
        assert_eq!(pl.state(), LoopState::Polling);

        pl.cycle().await;
        assert_eq!(pl.state(), LoopState::Polling);
        assert_eq!(pl.report.fetch_failures, 1);
        assert_eq!(source.fetches(), 2);

        // Previous snapshot reused; the next cycle fetches again
        pl.cycle().await;
        assert_eq!(pl.state(), LoopState::Polling);
        assert_eq!(source.fetches(), 3);
        assert!(sink.alerts().is_empty());

        while pl.state() == LoopState::Polling {
            pl.cycle().await;
        }
        assert_eq!(sink.alerts(), vec![1]);
    }

    #[tokio::test]
    async fn test_first_fetch_failure_is_fatal() {
        let source = ScriptedSource::new(vec![Err(FetchError::Status(StatusCode::BAD_GATEWAY))]);
        let sink = Arc::new(RecordingSink::default());
        let mut pl = poll_loop(&source, &sink);

        let err = pl.start().await.unwrap_err();
        assert!(matches!(err, StartupError::FirstFetch(FetchError::Status(_))));
        assert_eq!(pl.state(), LoopState::Done);
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_no_game_data_on_first_fetch_is_fatal() {
        let source = ScriptedSource::new(vec![Err(FetchError::NoGameData)]);
        let sink = Arc::new(RecordingSink::default());

        let err = poll_loop(&source, &sink).run().await.unwrap_err();
        assert!(matches!(err, StartupError::NoGameData(TEAM)));
    }

    #[tokio::test]
    async fn test_unreachable_sink_is_fatal() {
        let source = ScriptedSource::new(vec![Ok(snap(Phase::InProgress, 0))]);
        let sink = Arc::new(RecordingSink {
            unreachable: true,
            ..Default::default()
        });

        let err = poll_loop(&source, &sink).run().await.unwrap_err();
        assert!(matches!(err, StartupError::SinkUnavailable(_)));
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_notification_failure_is_not_fatal() {
        let source = ScriptedSource::new(vec![
            Ok(snap(Phase::InProgress, 0)),
            Ok(snap(Phase::InProgress, 1)),
            Ok(snap(Phase::InProgress, 1)),
            Ok(snap(Phase::InProgress, 2)),
            Ok(snap(Phase::Ended, 2)),
        ]);
        let sink = Arc::new(RecordingSink {
            failing: true,
            ..Default::default()
        });

        let report = poll_loop(&source, &sink).run().await.unwrap();

        // Each goal attempted once; failures are never retried
        assert_eq!(sink.alerts(), vec![1, 2]);
        assert_eq!(report.notifications_failed, 2);
        assert_eq!(report.notifications_sent, 0);
        assert_eq!(report.final_phase, Some(Phase::Ended));
    }

    #[tokio::test]
    async fn test_game_disappearing_mid_session_ends_it() {
        let source = ScriptedSource::new(vec![
            Ok(snap(Phase::PreGame, 0)),
            Err(FetchError::NoGameData),
        ]);
        let sink = Arc::new(RecordingSink::default());

        let report = poll_loop(&source, &sink).run().await.unwrap();
        assert_eq!(report.final_phase, Some(Phase::NoGame));
        assert_eq!(report.polls, 2);
    }

    #[tokio::test]
    async fn test_attaching_mid_game_does_not_notify() {
        let source = ScriptedSource::new(vec![
            Ok(snap(Phase::InProgress, 3)),
            Ok(snap(Phase::InProgress, 3)),
            Ok(snap(Phase::Ended, 3)),
        ]);
        let sink = Arc::new(RecordingSink::default());

        poll_loop(&source, &sink).run().await.unwrap();
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_overtime_winner_with_final_status() {
        let source = ScriptedSource::new(vec![
            Ok(snap(Phase::InProgress, 2)),
            Ok(snap(Phase::Ended, 3)),
        ]);
        let sink = Arc::new(RecordingSink::default());

        poll_loop(&source, &sink).run().await.unwrap();
        assert_eq!(sink.alerts(), vec![3]);
    }

    #[tokio::test]
    async fn test_tracks_away_team() {
        let mut first = snap(Phase::InProgress, 0);
        first.home_team_id = 25;
        first.away_team_id = TEAM;
        let mut home_goal = first.clone();
        home_goal.home_score = 1;
        let mut away_goal = home_goal.clone();
        away_goal.away_score = 1;
        let mut last = away_goal.clone();
        last.phase = Phase::Ended;

        let source = ScriptedSource::new(vec![Ok(first), Ok(home_goal), Ok(away_goal), Ok(last)]);
        let sink = Arc::new(RecordingSink::default());

        poll_loop(&source, &sink).run().await.unwrap();
        assert_eq!(sink.alerts(), vec![1]);
    }

    #[tokio::test]
    async fn test_unknown_status_terminates() {
        let mut odd = snap(Phase::Unknown, 0);
        odd.status = "Postponed".into();
        let source = ScriptedSource::new(vec![Ok(snap(Phase::Scheduled, 0)), Ok(odd)]);
        let sink = Arc::new(RecordingSink::default());

        let report = poll_loop(&source, &sink).run().await.unwrap();
        assert_eq!(report.final_phase, Some(Phase::Unknown));
        assert_eq!(source.fetches(), 2);
    }

    /// Never answers, like a score API stuck behind a long timeout.
    struct StalledSource;

    #[async_trait]
    impl ScoreSource for StalledSource {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn fetch(&self, _team_id: u32) -> Result<GameSnapshot, FetchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_startup() {
        let sink = Arc::new(RecordingSink::default());
        let shutdown = Arc::new(Notify::new());
        shutdown.notify_one();

        let report = PollLoop::new(TEAM, Arc::new(StalledSource), sink.clone(), NO_WAIT)
            .with_shutdown(shutdown)
            .run()
            .await
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.polls, 0);
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let source = ScriptedSource::new(vec![Ok(snap(Phase::Scheduled, 0))]);
        let sink = Arc::new(RecordingSink::default());
        let shutdown = Arc::new(Notify::new());
        let intervals = PollIntervals {
            scheduled_secs: 3600,
            ..NO_WAIT
        };

        // Stored as a permit, consumed by the first sleep
        shutdown.notify_one();
        let report = PollLoop::new(TEAM, source.clone(), sink.clone(), intervals)
            .with_shutdown(shutdown)
            .run()
            .await
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.polls, 1);
        assert_eq!(source.fetches(), 1);
    }
}
