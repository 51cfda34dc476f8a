//! Configuration file support for the rehab engine.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/rehab/config.toml`.

use crate::{Error, ExerciseSettings, RepBasedSettings, Result, WalkSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Per-exercise settings keyed by exercise id
    #[serde(default)]
    pub exercises: HashMap<String, ExerciseSettings>,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Timing constants for the session engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    /// Lead-in before the first rep of a rep-based exercise
    #[serde(default = "default_prepare_seconds")]
    pub prepare_seconds: u32,

    /// Remaining seconds at which the hold cue fires
    #[serde(default = "default_hold_cue_seconds")]
    pub hold_cue_seconds: u32,

    /// Pause between reps of the same set; 0 disables it
    #[serde(default)]
    pub mini_rest_seconds: u32,

    /// Suggested delay before leaving the screen after completion
    #[serde(default = "default_completion_delay_ms")]
    pub completion_delay_ms: u64,

    /// Age at which a progress record stops being resumable
    #[serde(default = "default_progress_ttl_hours")]
    pub progress_ttl_hours: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            prepare_seconds: default_prepare_seconds(),
            hold_cue_seconds: default_hold_cue_seconds(),
            mini_rest_seconds: 0,
            completion_delay_ms: default_completion_delay_ms(),
            progress_ttl_hours: default_progress_ttl_hours(),
        }
    }
}

impl TimingConfig {
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }

    /// Expiry window for progress checkpoints
    ///
    /// Falls back to 24 hours when the configured value is out of range.
    pub fn progress_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.progress_ttl_hours)
            .unwrap_or_else(|| chrono::Duration::hours(default_progress_ttl_hours()))
    }
}

/// Fallback settings used when an exercise has none, or invalid ones
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub reps: RepBasedSettings,

    #[serde(default)]
    pub walk: WalkSettings,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("rehab")
}

fn default_prepare_seconds() -> u32 {
    3
}

fn default_hold_cue_seconds() -> u32 {
    3
}

fn default_completion_delay_ms() -> u64 {
    2000
}

fn default_progress_ttl_hours() -> i64 {
    24
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.check()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("rehab").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Settings configured for an exercise, if any
    pub fn settings_for(&self, exercise_id: &str) -> Option<ExerciseSettings> {
        self.exercises.get(exercise_id).cloned()
    }

    /// Reject values the engine cannot sensibly fall back from
    fn check(&self) -> Result<()> {
        if self.timing.progress_ttl_hours <= 0 {
            return Err(Error::Config(format!(
                "progress_ttl_hours must be positive, got {}",
                self.timing.progress_ttl_hours
            )));
        }
        if chrono::Duration::try_hours(self.timing.progress_ttl_hours).is_none() {
            return Err(Error::Config(format!(
                "progress_ttl_hours is out of range: {}",
                self.timing.progress_ttl_hours
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timing.prepare_seconds, 3);
        assert_eq!(config.timing.completion_delay(), Duration::from_secs(2));
        assert_eq!(config.timing.progress_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.defaults.reps.reps_schema, vec![10, 10, 10]);
        assert!(config.exercises.is_empty());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[timing]
mini_rest_seconds = 2

[exercises.bird_dog]
mode = "reps"
hold_time = 7
reps_schema = [3, 2, 1]
rest_time = 15

[exercises.walk]
mode = "walk"
duration = 5
sessions = 2
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timing.mini_rest_seconds, 2);
        assert_eq!(config.timing.hold_cue_seconds, 3); // default
        assert_eq!(
            config.settings_for("bird_dog"),
            Some(ExerciseSettings::RepBased(RepBasedSettings {
                hold_time: 7,
                reps_schema: vec![3, 2, 1],
                rest_time: 15,
            }))
        );
        assert_eq!(
            config.settings_for("walk"),
            Some(ExerciseSettings::Walk(WalkSettings {
                duration: 5,
                sessions: 2,
            }))
        );
        assert_eq!(config.settings_for("bridge"), None);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.timing.hold_cue_seconds = 2;
        config.exercises.insert(
            "bridge".into(),
            ExerciseSettings::RepBased(RepBasedSettings {
                hold_time: 4,
                reps_schema: vec![5],
                rest_time: 0,
            }),
        );
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.timing, config.timing);
        assert_eq!(loaded.settings_for("bridge"), config.settings_for("bridge"));
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[timing]\nprogress_ttl_hours = 0\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_ttl() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[timing]\nprogress_ttl_hours = 3000000000000\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_progress_ttl_never_panics() {
        let mut timing = TimingConfig::default();
        timing.progress_ttl_hours = i64::MAX;
        assert_eq!(timing.progress_ttl(), chrono::Duration::hours(24));

        timing.progress_ttl_hours = 48;
        assert_eq!(timing.progress_ttl(), chrono::Duration::hours(48));
    }
}
