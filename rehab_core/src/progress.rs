//! Per-day progress persistence with expiry.
//!
//! Records live under two key shapes:
//! - `exercise_progress_<exercise_type>_<YYYY-MM-DD>`: resume checkpoint
//! - `exercises_<YYYY-MM-DD>`: the day's assigned exercise list
//!
//! Expiry happens on read. A checkpoint whose age has reached the TTL is
//! reported as absent and deleted; there is no background sweep.

use crate::{Clock, DailyExerciseEntry, ExerciseProgress, KvStore, Result};
use chrono::{Duration, NaiveDate};

/// Storage key of a progress checkpoint
pub fn progress_key(exercise_type: &str, date: NaiveDate) -> String {
    format!("exercise_progress_{}_{}", exercise_type, date.format("%Y-%m-%d"))
}

/// Storage key of a day's exercise list
pub fn daily_key(date: NaiveDate) -> String {
    format!("exercises_{}", date.format("%Y-%m-%d"))
}

/// Progress checkpoints and daily completion on top of a `KvStore`
pub struct ProgressStore<S, C> {
    store: S,
    clock: C,
    ttl: Duration,
}

impl<S: KvStore, C: Clock> ProgressStore<S, C> {
    /// Create a store with the default 24 hour expiry window
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::hours(24),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Load a resumable checkpoint
    ///
    /// Returns `Ok(None)` when nothing is stored or the record has expired.
    /// Malformed records surface as `Error::Json`.
    pub fn load(&mut self, exercise_type: &str, date: NaiveDate) -> Result<Option<ExerciseProgress>> {
        let key = progress_key(exercise_type, date);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };

        let progress: ExerciseProgress = serde_json::from_str(&raw)?;

        let age = self.clock.now() - progress.timestamp;
        if age >= self.ttl {
            tracing::info!(
                "Progress for {} is {} hours old, discarding",
                exercise_type,
                age.num_hours()
            );
            if let Err(e) = self.store.remove(&key) {
                tracing::warn!("Failed to delete expired progress {}: {}", key, e);
            }
            return Ok(None);
        }

        tracing::debug!(
            "Loaded progress for {}: set {} rep {}",
            exercise_type,
            progress.current_set,
            progress.current_rep
        );
        Ok(Some(progress))
    }

    /// Overwrite the checkpoint, stamping it with the current time
    ///
    /// Returns the record as stored.
    pub fn save(
        &mut self,
        exercise_type: &str,
        date: NaiveDate,
        progress: &ExerciseProgress,
    ) -> Result<ExerciseProgress> {
        let mut stamped = progress.clone();
        stamped.exercise_type = exercise_type.to_string();
        stamped.timestamp = self.clock.now();

        let contents = serde_json::to_string(&stamped)?;
        self.store.set(&progress_key(exercise_type, date), &contents)?;

        tracing::debug!(
            "Saved progress for {}: set {} rep {}",
            exercise_type,
            stamped.current_set,
            stamped.current_rep
        );
        Ok(stamped)
    }

    /// Delete the checkpoint; succeeds when none exists
    pub fn clear(&mut self, exercise_type: &str, date: NaiveDate) -> Result<()> {
        self.store.remove(&progress_key(exercise_type, date))?;
        tracing::debug!("Cleared progress for {}", exercise_type);
        Ok(())
    }

    /// Read the day's exercise list; an uninitialized day is empty
    pub fn load_daily(&self, date: NaiveDate) -> Result<Vec<DailyExerciseEntry>> {
        match self.store.get(&daily_key(date))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Initialize the day's list
    ///
    /// Exercises already on the list keep their completion flag; the rest
    /// start out incomplete. Order follows `exercise_types`. An unreadable
    /// list is replaced.
    pub fn assign_daily(
        &mut self,
        date: NaiveDate,
        exercise_types: &[String],
    ) -> Result<Vec<DailyExerciseEntry>> {
        let mut entries: Vec<DailyExerciseEntry> = Vec::with_capacity(exercise_types.len());

        self.store.update(
            &daily_key(date),
            &mut |current: Option<String>| -> Result<Option<String>> {
                let existing: Vec<DailyExerciseEntry> = match current {
                    Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                        tracing::warn!("Replacing unreadable exercise list for {}: {}", date, e);
                        Vec::new()
                    }),
                    None => Vec::new(),
                };

                entries.clear();
                for exercise_type in exercise_types {
                    if entries.iter().any(|e| &e.exercise_type == exercise_type) {
                        continue;
                    }
                    let completed = existing
                        .iter()
                        .any(|e| &e.exercise_type == exercise_type && e.completed);
                    entries.push(DailyExerciseEntry {
                        exercise_type: exercise_type.clone(),
                        completed,
                    });
                }

                Ok(Some(serde_json::to_string(&entries)?))
            },
        )?;

        tracing::info!("Assigned {} exercises for {}", entries.len(), date);
        Ok(entries)
    }

    /// Set `completed = true` on the matching day entry
    ///
    /// A missing list or entry is tolerated; returns whether an entry was
    /// updated. The list is rewritten under the store's update lock so
    /// concurrent completions of different exercises all stick.
    pub fn mark_daily_completed(&mut self, exercise_type: &str, date: NaiveDate) -> Result<bool> {
        let mut found = false;

        self.store.update(
            &daily_key(date),
            &mut |current: Option<String>| -> Result<Option<String>> {
                let Some(raw) = current else {
                    return Ok(None);
                };
                let mut entries: Vec<DailyExerciseEntry> = serde_json::from_str(&raw)?;

                let Some(entry) = entries.iter_mut().find(|e| e.exercise_type == exercise_type)
                else {
                    return Ok(None);
                };
                found = true;
                if entry.completed {
                    return Ok(None);
                }

                entry.completed = true;
                Ok(Some(serde_json::to_string(&entries)?))
            },
        )?;

        if found {
            tracing::info!("Marked {} completed for {}", exercise_type, date);
        } else {
            tracing::debug!(
                "No daily entry for {} on {}, nothing to mark",
                exercise_type,
                date
            );
        }
        Ok(found)
    }

    pub fn is_daily_completed(&self, exercise_type: &str, date: NaiveDate) -> Result<bool> {
        Ok(self
            .load_daily(date)?
            .iter()
            .any(|e| e.exercise_type == exercise_type && e.completed))
    }
}
