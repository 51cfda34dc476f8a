#![forbid(unsafe_code)]

//! Core engine for guided rehabilitation exercise sessions.
//!
//! This crate provides:
//! - Domain types (exercises, settings, phases, progress records)
//! - Exercise catalog
//! - Timer state machine and session driver
//! - Progress persistence over a key-value store, with expiry
//! - Configuration and logging setup

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod clock;
pub mod kv;
pub mod progress;
pub mod timer;
pub mod session;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use clock::{Clock, FixedClock, SystemClock};
pub use kv::{FileStore, KvStore, MemoryStore};
pub use progress::ProgressStore;
pub use timer::{SessionEvent, SessionPlan, TimerState};
pub use session::ExerciseSession;
