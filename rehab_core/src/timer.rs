//! Phase-based countdown state machine for a single exercise session.
//!
//! Every change goes through [`step`], a pure function of the current
//! [`TimerState`], the immutable [`SessionPlan`] and a [`TimerEvent`].
//! It returns the next state together with an ordered list of [`Effect`]s
//! for the driver to carry out. Nothing here touches storage or the clock.
//!
//! ## Rep-based flow
//!
//! ```text
//! Prepare -> Exercise -> (MiniRest ->) Exercise ... -> Rest -> Exercise ...
//!         -> SchemeCompleted (dual scheme, first pass) -> Prepare -> ...
//!         -> Completed
//! ```
//!
//! Walks skip `Prepare` and count sessions instead of reps.

use crate::config::{DefaultsConfig, TimingConfig};
use crate::{
    ExerciseDefinition, ExerciseMode, ExerciseProgress, ExerciseSettings, Phase, RepBasedSettings,
    Scheme, WalkSettings,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

// ============================================================================
// Plan
// ============================================================================

/// Validated workload for one session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Workload {
    Reps(RepBasedSettings),
    Walk(WalkSettings),
}

/// Everything a session needs to decide transitions, fixed at start.
///
/// Holding the schema here, rather than re-reading settings, is what keeps
/// the "last rep" and "last set" checks on one consistent snapshot.
#[derive(Clone, Debug)]
pub struct SessionPlan {
    pub exercise: ExerciseDefinition,
    pub workload: Workload,
    pub prepare_seconds: u32,
    pub hold_cue_seconds: u32,
    pub mini_rest_seconds: u32,
    pub completion_delay: Duration,
}

impl SessionPlan {
    /// Build a plan, substituting defaults for missing or unusable settings
    pub fn resolve(
        exercise: ExerciseDefinition,
        settings: Option<ExerciseSettings>,
        timing: &TimingConfig,
        defaults: &DefaultsConfig,
    ) -> Self {
        let workload = if exercise.is_walk() {
            Workload::Walk(sanitize_walk(&exercise.id, settings, &defaults.walk))
        } else {
            Workload::Reps(sanitize_reps(&exercise.id, settings, &defaults.reps))
        };

        Self {
            exercise,
            workload,
            prepare_seconds: timing.prepare_seconds,
            hold_cue_seconds: timing.hold_cue_seconds,
            mini_rest_seconds: timing.mini_rest_seconds,
            completion_delay: timing.completion_delay(),
        }
    }

    pub fn exercise_type(&self) -> &str {
        &self.exercise.id
    }

    pub fn is_dual_scheme(&self) -> bool {
        self.exercise.is_dual_scheme()
    }

    /// Phase in which reps are held
    fn working_phase(&self) -> Phase {
        match self.exercise.mode {
            ExerciseMode::Rolling => Phase::Rolling,
            ExerciseMode::Reps | ExerciseMode::Walk => Phase::Exercise,
        }
    }

    /// Length of the working countdown
    fn work_seconds(&self) -> u32 {
        match &self.workload {
            Workload::Reps(reps) => reps.hold_time,
            Workload::Walk(walk) => walk.duration.saturating_mul(60),
        }
    }

    /// Number of sets (or walk sessions)
    pub fn total_sets(&self) -> u32 {
        match &self.workload {
            Workload::Reps(reps) => reps.reps_schema.len() as u32,
            Workload::Walk(walk) => walk.sessions,
        }
    }

    /// Reps required in a 1-based set, clamped into the schema
    pub fn reps_in_set(&self, set: u32) -> u32 {
        match &self.workload {
            Workload::Reps(reps) => {
                let idx = clamp_count(set, reps.reps_schema.len() as u32) as usize - 1;
                reps.reps_schema.get(idx).copied().unwrap_or(1)
            }
            Workload::Walk(_) => 1,
        }
    }
}

/// Clamp a 1-based counter into `1..=max`, treating an empty range as 1
fn clamp_count(value: u32, max: u32) -> u32 {
    value.max(1).min(max.max(1))
}

fn sanitize_reps(
    exercise_id: &str,
    settings: Option<ExerciseSettings>,
    defaults: &RepBasedSettings,
) -> RepBasedSettings {
    let mut reps = match settings {
        Some(ExerciseSettings::RepBased(reps)) => reps,
        Some(ExerciseSettings::Walk(_)) => {
            tracing::warn!(
                "Walk settings given for rep-based exercise {}, using defaults",
                exercise_id
            );
            defaults.clone()
        }
        None => {
            tracing::warn!("No settings for {}, using defaults", exercise_id);
            defaults.clone()
        }
    };

    if reps.hold_time == 0 {
        tracing::warn!("hold_time of 0 for {}, using {}", exercise_id, defaults.hold_time);
        reps.hold_time = defaults.hold_time.max(1);
    }
    if reps.reps_schema.is_empty() {
        tracing::warn!("Empty reps_schema for {}, using defaults", exercise_id);
        reps.reps_schema = defaults.reps_schema.clone();
    }
    if reps.reps_schema.is_empty() {
        reps.reps_schema = RepBasedSettings::default().reps_schema;
    }
    for count in reps.reps_schema.iter_mut() {
        *count = (*count).max(1);
    }
    reps
}

fn sanitize_walk(
    exercise_id: &str,
    settings: Option<ExerciseSettings>,
    defaults: &WalkSettings,
) -> WalkSettings {
    let mut walk = match settings {
        Some(ExerciseSettings::Walk(walk)) => walk,
        Some(ExerciseSettings::RepBased(_)) => {
            tracing::warn!(
                "Rep settings given for walk exercise {}, using defaults",
                exercise_id
            );
            defaults.clone()
        }
        None => {
            tracing::warn!("No settings for {}, using defaults", exercise_id);
            defaults.clone()
        }
    };

    if walk.duration == 0 {
        walk.duration = defaults.duration.max(1);
    }
    if walk.sessions == 0 {
        walk.sessions = defaults.sessions.max(1);
    }
    walk
}

// ============================================================================
// State
// ============================================================================

/// Countdown and counters of a running session
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimerState {
    pub current_time: u32,
    pub is_running: bool,
    pub phase: Phase,
    pub current_set: u32,
    pub current_rep: u32,
    pub current_session: u32,
    pub current_scheme: Scheme,
    pub scheme_one_completed: bool,
    pub hold_sound_played: bool,
}

impl TimerState {
    /// Fresh session: lead-in for rep-based exercises, straight into the
    /// first walk otherwise
    pub fn initial(plan: &SessionPlan) -> Self {
        let mut state = Self {
            current_time: 0,
            is_running: true,
            phase: Phase::Prepare,
            current_set: 1,
            current_rep: 1,
            current_session: 1,
            current_scheme: Scheme::One,
            scheme_one_completed: false,
            hold_sound_played: false,
        };
        state.enter_lead_in(plan);
        state
    }

    /// Session continuing from a checkpoint; counters are clamped to the plan
    pub fn resumed(plan: &SessionPlan, progress: &ExerciseProgress) -> Self {
        let mut state = Self::initial(plan);

        match &plan.workload {
            Workload::Walk(walk) => {
                let session = progress.current_session.unwrap_or(progress.current_set);
                state.current_session = clamp_count(session, walk.sessions);
            }
            Workload::Reps(_) => {
                state.current_set = clamp_count(progress.current_set, plan.total_sets());
                state.current_rep =
                    clamp_count(progress.current_rep, plan.reps_in_set(state.current_set));
            }
        }

        if plan.is_dual_scheme() {
            state.current_scheme = progress.current_scheme.unwrap_or_default();
            state.scheme_one_completed = progress.scheme_one_completed.unwrap_or(false)
                || state.current_scheme == Scheme::Two;
        }

        state
    }

    /// Session for an exercise that is already done today
    pub fn finished() -> Self {
        Self {
            current_time: 0,
            is_running: false,
            phase: Phase::Completed,
            current_set: 1,
            current_rep: 1,
            current_session: 1,
            current_scheme: Scheme::One,
            scheme_one_completed: false,
            hold_sound_played: false,
        }
    }

    fn enter_lead_in(&mut self, plan: &SessionPlan) {
        self.hold_sound_played = false;
        if matches!(plan.workload, Workload::Walk(_)) || plan.prepare_seconds == 0 {
            self.phase = plan.working_phase();
            self.current_time = plan.work_seconds();
        } else {
            self.phase = Phase::Prepare;
            self.current_time = plan.prepare_seconds;
        }
    }

    fn enter_work(&mut self, plan: &SessionPlan) {
        self.phase = plan.working_phase();
        self.current_time = plan.work_seconds();
        self.hold_sound_played = false;
    }

    /// Checkpoint for the progress store; `at` is replaced on save
    pub fn to_progress(&self, plan: &SessionPlan, at: DateTime<Utc>) -> ExerciseProgress {
        let walk = matches!(plan.workload, Workload::Walk(_));
        let (current_set, current_rep) = if walk {
            (self.current_session, 1)
        } else {
            (self.current_set, self.current_rep)
        };
        let dual = plan.is_dual_scheme();

        ExerciseProgress {
            exercise_type: plan.exercise_type().to_string(),
            completed_sets: current_set.saturating_sub(1),
            current_set,
            current_rep,
            timestamp: at,
            current_scheme: dual.then_some(self.current_scheme),
            scheme_one_completed: dual.then_some(self.scheme_one_completed),
            current_session: walk.then_some(self.current_session),
        }
    }

    /// Display text for the current state
    pub fn instruction(&self, plan: &SessionPlan) -> String {
        let name = &plan.exercise.name;
        let scheme_suffix = plan
            .exercise
            .scheme_label(self.current_scheme)
            .map(|label| format!(" ({})", label))
            .unwrap_or_default();

        match self.phase {
            Phase::Prepare => format!("Get ready: {}{}", name, scheme_suffix),
            Phase::Exercise | Phase::Rolling => match &plan.workload {
                Workload::Walk(walk) => {
                    if self.is_running {
                        format!("Walk: session {} of {}", self.current_session, walk.sessions)
                    } else {
                        format!(
                            "Resume to start walk session {} of {}",
                            self.current_session, walk.sessions
                        )
                    }
                }
                Workload::Reps(_) => {
                    let verb = if self.phase == Phase::Rolling { "Roll" } else { "Hold" };
                    format!(
                        "{}: rep {} of {}, set {} of {}{}",
                        verb,
                        self.current_rep,
                        plan.reps_in_set(self.current_set),
                        self.current_set,
                        plan.total_sets(),
                        scheme_suffix
                    )
                }
            },
            Phase::MiniRest => "Relax".to_string(),
            Phase::Rest => format!("Rest before set {}", self.current_set),
            Phase::SchemeCompleted => {
                let done = plan.exercise.scheme_label(Scheme::One).unwrap_or("First side");
                let next = plan.exercise.scheme_label(Scheme::Two).unwrap_or("second side");
                format!("{} done. Resume for {}", done, next)
            }
            Phase::Completed => format!("Well done! {} complete", name),
        }
    }
}

// ============================================================================
// Events and Effects
// ============================================================================

/// Input to the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed
    Tick,
    /// The countdown reached zero
    TimerComplete,
    Pause,
    /// Continue after a pause, a scheme break or a walk-session break
    Resume,
}

/// Outward notification for the sound/UI collaborator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Play the hold sound for the current rep
    HoldCue { set: u32, rep: u32 },
    /// A phase boundary was crossed; `from` and `to` may be equal when a
    /// new rep starts in the same phase
    PhaseChanged {
        from: Phase,
        to: Phase,
        current_time: u32,
    },
    /// A walk session finished and the next one awaits resume
    SessionAdvanced { session: u32, of: u32 },
    /// Session restored from a checkpoint; walks report their position in
    /// `session`
    Resumed {
        set: u32,
        rep: u32,
        session: u32,
        scheme: Scheme,
    },
    /// The exercise was already completed today
    AlreadyCompleted { exercise_type: String },
    /// Exercise fully done; the caller may navigate away after the delay
    Completed {
        exercise_type: String,
        suggested_delay: Duration,
    },
}

/// Work the driver must perform, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Emit(SessionEvent),
    SaveProgress,
    MarkDailyCompleted,
    ClearProgress,
}

/// Result of one step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: TimerState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &TimerState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

// ============================================================================
// Transition Function
// ============================================================================

/// Compute the next state for an event
pub fn step(state: &TimerState, plan: &SessionPlan, event: TimerEvent) -> Transition {
    match event {
        TimerEvent::Tick => tick(state, plan),
        TimerEvent::TimerComplete => complete(state, plan),
        TimerEvent::Pause => {
            let mut next = state.clone();
            next.is_running = false;
            Transition {
                state: next,
                effects: Vec::new(),
            }
        }
        TimerEvent::Resume => resume(state, plan),
    }
}

fn tick(state: &TimerState, plan: &SessionPlan) -> Transition {
    if !state.is_running || state.current_time == 0 {
        return Transition::unchanged(state);
    }

    let mut next = state.clone();
    next.current_time -= 1;

    let mut effects = Vec::new();
    let cue_due = matches!(plan.workload, Workload::Reps(_))
        && next.phase.is_working()
        && plan.hold_cue_seconds > 0
        && !next.hold_sound_played
        && next.current_time <= plan.hold_cue_seconds;
    if cue_due {
        next.hold_sound_played = true;
        effects.push(Effect::Emit(SessionEvent::HoldCue {
            set: next.current_set,
            rep: next.current_rep,
        }));
    }

    Transition {
        state: next,
        effects,
    }
}

fn complete(state: &TimerState, plan: &SessionPlan) -> Transition {
    if !state.is_running {
        return Transition::unchanged(state);
    }

    let mut next = state.clone();
    let mut effects = Vec::new();

    match state.phase {
        Phase::Prepare | Phase::MiniRest | Phase::Rest => {
            next.enter_work(plan);
            effects.push(Effect::SaveProgress);
        }
        Phase::Exercise | Phase::Rolling => match &plan.workload {
            Workload::Reps(reps) => complete_rep(&mut next, plan, reps, &mut effects),
            Workload::Walk(walk) => {
                if state.current_session < walk.sessions {
                    next.current_session = state.current_session + 1;
                    next.current_time = plan.work_seconds();
                    next.is_running = false;
                    effects.push(Effect::SaveProgress);
                    effects.push(Effect::Emit(SessionEvent::SessionAdvanced {
                        session: next.current_session,
                        of: walk.sessions,
                    }));
                    return Transition {
                        state: next,
                        effects,
                    };
                }
                finish(&mut next, plan, &mut effects);
            }
        },
        Phase::Completed | Phase::SchemeCompleted => {
            return Transition::unchanged(state);
        }
    }

    tracing::debug!(
        "Phase {} -> {} (set {}, rep {}, {}s)",
        state.phase,
        next.phase,
        next.current_set,
        next.current_rep,
        next.current_time
    );

    // Completion effects already carry their own ordering; the phase
    // notification goes ahead of the final Completed signal.
    let changed = Effect::Emit(SessionEvent::PhaseChanged {
        from: state.phase,
        to: next.phase,
        current_time: next.current_time,
    });
    let position = effects
        .iter()
        .position(|e| matches!(e, Effect::Emit(SessionEvent::Completed { .. })))
        .unwrap_or(effects.len());
    effects.insert(position, changed);

    Transition {
        state: next,
        effects,
    }
}

/// Rep/set bookkeeping at the end of a hold. `reps` is the single
/// snapshot both "last rep" and "last set" are decided from.
fn complete_rep(
    next: &mut TimerState,
    plan: &SessionPlan,
    reps: &RepBasedSettings,
    effects: &mut Vec<Effect>,
) {
    let schema = &reps.reps_schema;
    if schema.is_empty() {
        finish(next, plan, effects);
        return;
    }

    let total_sets = schema.len() as u32;
    let set = clamp_count(next.current_set, total_sets);
    let reps_in_set = schema[set as usize - 1];

    let is_last_rep = next.current_rep >= reps_in_set;
    let is_last_set = set >= total_sets;
    next.current_set = set;
    next.current_rep = clamp_count(next.current_rep, reps_in_set);

    match (is_last_rep, is_last_set) {
        (false, _) => {
            next.current_rep = clamp_count(next.current_rep + 1, reps_in_set);
            if plan.mini_rest_seconds > 0 {
                next.phase = Phase::MiniRest;
                next.current_time = plan.mini_rest_seconds;
                next.hold_sound_played = false;
            } else {
                next.enter_work(plan);
            }
            effects.push(Effect::SaveProgress);
        }
        (true, false) => {
            next.current_set = set + 1;
            next.current_rep = 1;
            if reps.rest_time > 0 {
                next.phase = Phase::Rest;
                next.current_time = reps.rest_time;
                next.hold_sound_played = false;
            } else {
                next.enter_work(plan);
            }
            effects.push(Effect::SaveProgress);
        }
        (true, true) => {
            if plan.is_dual_scheme() && next.current_scheme == Scheme::One {
                next.phase = Phase::SchemeCompleted;
                next.scheme_one_completed = true;
                next.current_scheme = Scheme::Two;
                next.current_set = 1;
                next.current_rep = 1;
                next.current_time = 0;
                next.is_running = false;
                next.hold_sound_played = false;
                effects.push(Effect::SaveProgress);
            } else {
                finish(next, plan, effects);
            }
        }
    }
}

/// Terminal transition. Persistence effects come before the outward signal.
fn finish(next: &mut TimerState, plan: &SessionPlan, effects: &mut Vec<Effect>) {
    next.phase = Phase::Completed;
    next.current_time = 0;
    next.is_running = false;
    effects.push(Effect::MarkDailyCompleted);
    effects.push(Effect::ClearProgress);
    effects.push(Effect::Emit(SessionEvent::Completed {
        exercise_type: plan.exercise_type().to_string(),
        suggested_delay: plan.completion_delay,
    }));
}

fn resume(state: &TimerState, plan: &SessionPlan) -> Transition {
    match state.phase {
        Phase::Completed => Transition::unchanged(state),
        Phase::SchemeCompleted => {
            let mut next = state.clone();
            next.is_running = true;
            next.enter_lead_in(plan);
            Transition {
                effects: vec![Effect::Emit(SessionEvent::PhaseChanged {
                    from: state.phase,
                    to: next.phase,
                    current_time: next.current_time,
                })],
                state: next,
            }
        }
        _ if state.is_running => Transition::unchanged(state),
        _ => {
            let mut next = state.clone();
            next.is_running = true;
            Transition {
                state: next,
                effects: Vec::new(),
            }
        }
    }
}
