//! Session driver.
//!
//! `ExerciseSession` owns the one active exercise execution, feeds events
//! into the pure transition function and carries out the resulting
//! effects against the progress store. The caller supplies the cadence by
//! calling [`ExerciseSession::tick`] once per second.
//!
//! Persistence failures never end a session. They are logged, recorded
//! in [`ExerciseSession::persistence_failures`] and the in-memory session
//! carries on.

use crate::config::{Config, DefaultsConfig, TimingConfig};
use crate::timer::{step, Effect, SessionEvent, SessionPlan, TimerEvent, TimerState};
use crate::{Clock, Error, ExerciseDefinition, ExerciseSettings, KvStore, ProgressStore};
use chrono::NaiveDate;
use std::fmt;
use uuid::Uuid;

/// Store call that failed during a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOperation {
    CheckDaily,
    LoadProgress,
    SaveProgress,
    ClearProgress,
    MarkDailyCompleted,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::CheckDaily => "check daily record",
            StoreOperation::LoadProgress => "load progress",
            StoreOperation::SaveProgress => "save progress",
            StoreOperation::ClearProgress => "clear progress",
            StoreOperation::MarkDailyCompleted => "mark daily completed",
        };
        f.write_str(name)
    }
}

/// A recovered persistence error
#[derive(Debug)]
pub struct PersistenceFailure {
    pub operation: StoreOperation,
    pub error: Error,
}

struct ActiveSession {
    id: Uuid,
    date: NaiveDate,
    plan: SessionPlan,
    state: TimerState,
}

/// Drives exercise sessions on top of a progress store
pub struct ExerciseSession<S, C> {
    progress: ProgressStore<S, C>,
    timing: TimingConfig,
    defaults: DefaultsConfig,
    active: Option<ActiveSession>,
    failures: Vec<PersistenceFailure>,
}

impl<S: KvStore, C: Clock> ExerciseSession<S, C> {
    pub fn new(progress: ProgressStore<S, C>, config: &Config) -> Self {
        Self {
            progress,
            timing: config.timing.clone(),
            defaults: config.defaults.clone(),
            active: None,
            failures: Vec::new(),
        }
    }

    /// Begin a session for today
    ///
    /// Any running session is stopped first. An exercise already completed
    /// today opens in `Completed`; otherwise a resumable checkpoint is
    /// picked up if one exists.
    pub fn start(
        &mut self,
        exercise: ExerciseDefinition,
        settings: Option<ExerciseSettings>,
    ) -> Vec<SessionEvent> {
        if let Some(previous) = self.stop() {
            tracing::info!(
                "Stopped {} session before starting {}",
                previous.phase,
                exercise.id
            );
        }

        let date = self.progress.clock().today();
        let plan = SessionPlan::resolve(exercise, settings, &self.timing, &self.defaults);
        let exercise_type = plan.exercise_type().to_string();
        let id = Uuid::new_v4();
        let mut events = Vec::new();

        let already_done = match self.progress.is_daily_completed(&exercise_type, date) {
            Ok(done) => done,
            Err(error) => {
                self.record(StoreOperation::CheckDaily, error);
                false
            }
        };

        let state = if already_done {
            tracing::info!("{} already completed for {}", exercise_type, date);
            events.push(SessionEvent::AlreadyCompleted {
                exercise_type: exercise_type.clone(),
            });
            TimerState::finished()
        } else {
            match self.progress.load(&exercise_type, date) {
                Ok(Some(saved)) => {
                    let state = TimerState::resumed(&plan, &saved);
                    tracing::info!(
                        "Resuming {} at set {} rep {} (session {})",
                        exercise_type,
                        state.current_set,
                        state.current_rep,
                        id
                    );
                    events.push(SessionEvent::Resumed {
                        set: state.current_set,
                        rep: state.current_rep,
                        session: state.current_session,
                        scheme: state.current_scheme,
                    });
                    state
                }
                Ok(None) => {
                    tracing::info!("Starting {} fresh (session {})", exercise_type, id);
                    TimerState::initial(&plan)
                }
                Err(error) => {
                    self.record(StoreOperation::LoadProgress, error);
                    TimerState::initial(&plan)
                }
            }
        };

        self.active = Some(ActiveSession {
            id,
            date,
            plan,
            state,
        });
        events
    }

    /// Advance one second; evaluates completion when the countdown hits zero
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let mut events = self.advance(TimerEvent::Tick);
        let expired = self
            .active
            .as_ref()
            .map(|a| a.state.is_running && a.state.current_time == 0)
            .unwrap_or(false);
        if expired {
            events.extend(self.advance(TimerEvent::TimerComplete));
        }
        events
    }

    /// Evaluate the end of the current countdown
    pub fn on_timer_complete(&mut self) -> Vec<SessionEvent> {
        self.advance(TimerEvent::TimerComplete)
    }

    pub fn pause(&mut self) -> Vec<SessionEvent> {
        self.advance(TimerEvent::Pause)
    }

    /// Continue after a pause, a scheme break or a walk-session break
    pub fn resume(&mut self) -> Vec<SessionEvent> {
        self.advance(TimerEvent::Resume)
    }

    /// Abandon the active session, returning its last state
    ///
    /// Persisted progress is left in place so the exercise can be resumed.
    pub fn stop(&mut self) -> Option<TimerState> {
        let active = self.active.take()?;
        tracing::debug!(
            "Stopped {} session {}",
            active.plan.exercise_type(),
            active.id
        );
        let mut state = active.state;
        state.is_running = false;
        Some(state)
    }

    pub fn state(&self) -> Option<&TimerState> {
        self.active.as_ref().map(|a| &a.state)
    }

    pub fn plan(&self) -> Option<&SessionPlan> {
        self.active.as_ref().map(|a| &a.plan)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Display text for the active session
    pub fn instruction(&self) -> Option<String> {
        self.active
            .as_ref()
            .map(|a| a.state.instruction(&a.plan))
    }

    pub fn persistence_failures(&self) -> &[PersistenceFailure] {
        &self.failures
    }

    pub fn progress_store(&self) -> &ProgressStore<S, C> {
        &self.progress
    }

    fn record(&mut self, operation: StoreOperation, error: Error) {
        record_failure(&mut self.failures, operation, error);
    }

    fn advance(&mut self, event: TimerEvent) -> Vec<SessionEvent> {
        let Some(active) = self.active.as_mut() else {
            return Vec::new();
        };

        let transition = step(&active.state, &active.plan, event);
        active.state = transition.state;

        let mut events = Vec::new();
        for effect in transition.effects {
            match effect {
                Effect::Emit(event) => {
                    if let SessionEvent::Completed { exercise_type, .. } = &event {
                        tracing::info!("Completed {} (session {})", exercise_type, active.id);
                    }
                    events.push(event);
                }
                Effect::SaveProgress => {
                    let checkpoint = active
                        .state
                        .to_progress(&active.plan, self.progress.clock().now());
                    if let Err(error) =
                        self.progress
                            .save(active.plan.exercise_type(), active.date, &checkpoint)
                    {
                        record_failure(&mut self.failures, StoreOperation::SaveProgress, error);
                    }
                }
                Effect::MarkDailyCompleted => {
                    if let Err(error) = self
                        .progress
                        .mark_daily_completed(active.plan.exercise_type(), active.date)
                    {
                        record_failure(
                            &mut self.failures,
                            StoreOperation::MarkDailyCompleted,
                            error,
                        );
                    }
                }
                Effect::ClearProgress => {
                    if let Err(error) = self
                        .progress
                        .clear(active.plan.exercise_type(), active.date)
                    {
                        record_failure(&mut self.failures, StoreOperation::ClearProgress, error);
                    }
                }
            }
        }
        events
    }
}

fn record_failure(failures: &mut Vec<PersistenceFailure>, operation: StoreOperation, error: Error) {
    tracing::warn!("Failed to {}: {}. Continuing session.", operation, error);
    failures.push(PersistenceFailure { operation, error });
}
