//! Default catalog of rehabilitation exercises.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog with the built-in exercises
///
/// Prefer `get_default_catalog()` outside of tests.
pub fn build_default_catalog() -> Catalog {
    let mut exercises = HashMap::new();

    let mut insert = |id: &str, name: &str, mode: ExerciseMode, schemes: Option<[&str; 2]>| {
        exercises.insert(
            id.to_string(),
            ExerciseDefinition {
                id: id.to_string(),
                name: name.to_string(),
                mode,
                schemes: schemes.map(|[a, b]| [a.to_string(), b.to_string()]),
            },
        );
    };

    insert(
        "bird_dog",
        "Bird Dog",
        ExerciseMode::Reps,
        Some(["Left arm, right leg", "Right arm, left leg"]),
    );
    insert(
        "clamshell",
        "Clamshell",
        ExerciseMode::Reps,
        Some(["Left side", "Right side"]),
    );
    insert("bridge", "Glute Bridge", ExerciseMode::Reps, None);
    insert("dead_bug", "Dead Bug", ExerciseMode::Reps, None);
    insert("plank", "Plank", ExerciseMode::Reps, None);
    insert("foam_roll", "Foam Roll", ExerciseMode::Rolling, None);
    insert("walk", "Walk", ExerciseMode::Walk, None);

    Catalog { exercises }
}

impl Catalog {
    /// Look up an exercise, falling back to a plain rep-based definition
    pub fn resolve(&self, id: &str) -> ExerciseDefinition {
        match self.exercises.get(id) {
            Some(def) => def.clone(),
            None => {
                tracing::debug!("Exercise '{}' not in catalog, treating as rep-based", id);
                ExerciseDefinition::fallback(id)
            }
        }
    }

    /// Sorted list of exercise ids
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.exercises.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Validate catalog integrity
    ///
    /// Returns a list of validation errors (empty if valid)
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, def) in &self.exercises {
            if id.is_empty() || def.id.is_empty() {
                errors.push("Exercise has empty ID".to_string());
            }
            if id != &def.id {
                errors.push(format!(
                    "Exercise key '{}' doesn't match definition.id '{}'",
                    id, def.id
                ));
            }
            if def.name.is_empty() {
                errors.push(format!("Exercise '{}' has empty name", id));
            }
            if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                errors.push(format!(
                    "Exercise '{}' has characters that cannot be used in storage keys",
                    id
                ));
            }
            if let Some(labels) = &def.schemes {
                if labels.iter().any(|l| l.is_empty()) {
                    errors.push(format!("Exercise '{}' has an empty scheme label", id));
                }
                if def.mode == ExerciseMode::Walk {
                    errors.push(format!("Walk exercise '{}' cannot have schemes", id));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_bird_dog_is_dual_scheme() {
        let catalog = build_default_catalog();
        let bird_dog = catalog.resolve("bird_dog");
        assert!(bird_dog.is_dual_scheme());
        assert_eq!(bird_dog.scheme_label(Scheme::Two), Some("Right arm, left leg"));
    }

    #[test]
    fn test_walk_mode() {
        let catalog = get_default_catalog();
        assert!(catalog.resolve("walk").is_walk());
        assert_eq!(catalog.resolve("foam_roll").mode, ExerciseMode::Rolling);
    }

    #[test]
    fn test_unknown_exercise_falls_back() {
        let catalog = build_default_catalog();
        let def = catalog.resolve("side_lying_leg_raise");
        assert_eq!(def.mode, ExerciseMode::Reps);
        assert!(!def.is_dual_scheme());
        assert_eq!(def.name, "side lying leg raise");
    }

    #[test]
    fn test_validate_flags_bad_entries() {
        let mut catalog = build_default_catalog();
        catalog.exercises.insert(
            "bad key".into(),
            ExerciseDefinition {
                id: "other".into(),
                name: String::new(),
                mode: ExerciseMode::Walk,
                schemes: Some(["".into(), "b".into()]),
            },
        );

        let errors = catalog.validate();
        assert!(errors.iter().any(|e| e.contains("doesn't match")));
        assert!(errors.iter().any(|e| e.contains("empty name")));
        assert!(errors.iter().any(|e| e.contains("storage keys")));
        assert!(errors.iter().any(|e| e.contains("cannot have schemes")));
    }
}
