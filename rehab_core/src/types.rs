//! Core domain types for the rehab exercise engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercise definitions and the catalog
//! - Per-exercise settings (rep-based or walk)
//! - Session phases and schemes
//! - Persisted progress and daily completion records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Exercise Types
// ============================================================================

/// How an exercise is executed
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseMode {
    /// Timed holds counted in reps and sets
    Reps,
    /// Same counting as `Reps`, but the working phase is `Rolling`
    Rolling,
    /// Time-based walk measured in minutes and sessions
    Walk,
}

/// An exercise definition (e.g., "Bird Dog")
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub mode: ExerciseMode,
    /// Labels for the two variants of a dual-scheme exercise
    pub schemes: Option<[String; 2]>,
}

impl ExerciseDefinition {
    /// Definition used for ids missing from the catalog
    pub fn fallback(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.replace('_', " "),
            mode: ExerciseMode::Reps,
            schemes: None,
        }
    }

    pub fn is_dual_scheme(&self) -> bool {
        self.schemes.is_some() && self.mode != ExerciseMode::Walk
    }

    pub fn is_walk(&self) -> bool {
        self.mode == ExerciseMode::Walk
    }

    /// Label of the given scheme, if this exercise has two
    pub fn scheme_label(&self, scheme: Scheme) -> Option<&str> {
        self.schemes.as_ref().map(|labels| match scheme {
            Scheme::One => labels[0].as_str(),
            Scheme::Two => labels[1].as_str(),
        })
    }
}

/// The complete catalog of known exercises
#[derive(Clone, Debug)]
pub struct Catalog {
    pub exercises: HashMap<String, ExerciseDefinition>,
}

// ============================================================================
// Settings
// ============================================================================

/// Settings for hold-based exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepBasedSettings {
    /// Seconds per rep
    pub hold_time: u32,
    /// One entry per set, value = reps required in that set
    pub reps_schema: Vec<u32>,
    /// Seconds between sets
    pub rest_time: u32,
}

impl Default for RepBasedSettings {
    fn default() -> Self {
        Self {
            hold_time: 5,
            reps_schema: vec![10, 10, 10],
            rest_time: 30,
        }
    }
}

/// Settings for walk exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalkSettings {
    /// Minutes per walk session
    pub duration: u32,
    pub sessions: u32,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            duration: 10,
            sessions: 1,
        }
    }
}

/// Per-user, per-program exercise settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExerciseSettings {
    #[serde(rename = "reps")]
    RepBased(RepBasedSettings),
    Walk(WalkSettings),
}

// ============================================================================
// Session Phase Types
// ============================================================================

/// Stage of an exercise session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prepare,
    Exercise,
    MiniRest,
    Rest,
    Rolling,
    Completed,
    SchemeCompleted,
}

impl Phase {
    /// Phases during which a rep is being held
    pub fn is_working(self) -> bool {
        matches!(self, Phase::Exercise | Phase::Rolling)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Exercise => "exercise",
            Phase::MiniRest => "mini_rest",
            Phase::Rest => "rest",
            Phase::Rolling => "rolling",
            Phase::Completed => "completed",
            Phase::SchemeCompleted => "scheme_completed",
        };
        f.write_str(name)
    }
}

/// Which variant of a dual-scheme exercise is active.
///
/// Persisted as the number `1` or `2`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Scheme {
    #[default]
    One,
    Two,
}

impl From<Scheme> for u8 {
    fn from(scheme: Scheme) -> u8 {
        match scheme {
            Scheme::One => 1,
            Scheme::Two => 2,
        }
    }
}

impl TryFrom<u8> for Scheme {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Scheme::One),
            2 => Ok(Scheme::Two),
            other => Err(format!("scheme must be 1 or 2, got {}", other)),
        }
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// Checkpoint that lets an interrupted session resume on the same day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseProgress {
    pub exercise_type: String,
    pub completed_sets: u32,
    pub current_set: u32,
    pub current_rep: u32,
    /// Stamped by the progress store on save
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_scheme: Option<Scheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme_one_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session: Option<u32>,
}

/// One entry of the per-day assigned exercise list
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyExerciseEntry {
    pub exercise_type: String,
    #[serde(default)]
    pub completed: bool,
}
