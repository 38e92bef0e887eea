//! Core domain types for the repset workout tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Workout sessions and their exercise/set logs
//! - Set types and previous-lift references
//! - Active (in-memory) projections used while a workout is running
//! - Workout templates and body-weight entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Persisted Log Types
// ============================================================================

/// One workout occurrence, template-based or empty.
///
/// Created when a workout starts, closed (`completed_at` set) on finish,
/// deleted outright on cancel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: Uuid,
    pub template_id: Option<Uuid>,
    pub template_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkoutSession {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

/// One exercise instance within a session, ordered by `order_index`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseLog {
    pub id: Uuid,
    pub session_id: Uuid,
    pub exercise_name: String,
    pub order_index: i64,
    pub show_rpe: bool,
    pub note: Option<String>,
}

/// Kind of set within an exercise
///
/// Affects display and previous-set matching, not persistence mechanics.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    Regular,
    Warmup,
    DropSet,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::Regular => "regular",
            SetType::Warmup => "warmup",
            SetType::DropSet => "drop_set",
        }
    }

    /// Parse a stored set type string; unknown values map to None
    pub fn parse(s: &str) -> Option<SetType> {
        match s {
            "regular" => Some(SetType::Regular),
            "warmup" => Some(SetType::Warmup),
            "drop_set" => Some(SetType::DropSet),
            _ => None,
        }
    }
}

/// One performed set: weight, reps, optional RPE, completion state, rest duration.
///
/// `set_number` is 1-based and kept consecutive within an exercise; removals
/// renumber the survivors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetLog {
    pub id: Uuid,
    pub exercise_log_id: Uuid,
    pub set_number: i64,
    pub weight: f64,
    pub reps: i64,
    pub rpe: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub set_type: SetType,
    pub rest_seconds: i64,
}

impl SetLog {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

// ============================================================================
// Active (in-memory) Projections
// ============================================================================

/// The most recent historical values for the same exercise/set-type/position,
/// shown as a progressive-overload reference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviousLift {
    pub weight: f64,
    pub reps: i64,
    pub rpe: Option<f64>,
}

/// A set as displayed while a workout is running: the persisted row plus its
/// previous-lift reference.
#[derive(Clone, Debug)]
pub struct ActiveSet {
    pub log: SetLog,
    pub previous: Option<PreviousLift>,
}

/// An exercise as displayed while a workout is running.
///
/// `expanded` is a display-only flag and is never persisted.
#[derive(Clone, Debug)]
pub struct ActiveExercise {
    pub log: ExerciseLog,
    pub sets: Vec<ActiveSet>,
    pub expanded: bool,
}

// ============================================================================
// Template and Body-Weight Types
// ============================================================================

/// One exercise slot in a workout template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub exercise_name: String,
    pub set_count: i64,
    pub rest_seconds: i64,
    #[serde(default)]
    pub show_rpe: bool,
}

/// A reusable workout template
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub name: String,
    pub exercises: Vec<TemplateExercise>,
    pub created_at: DateTime<Utc>,
}

/// A single body-weight measurement
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BodyWeightEntry {
    pub id: Uuid,
    pub weight_kg: f64,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_type_roundtrip() {
        for ty in [SetType::Regular, SetType::Warmup, SetType::DropSet] {
            assert_eq!(SetType::parse(ty.as_str()), Some(ty));
        }
    }

    #[test]
    fn test_set_type_unknown_is_none() {
        assert_eq!(SetType::parse("negatives"), None);
    }

    #[test]
    fn test_session_open_until_completed() {
        let mut session = WorkoutSession {
            id: Uuid::new_v4(),
            template_id: None,
            template_name: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        assert!(session.is_open());

        session.completed_at = Some(Utc::now());
        assert!(!session.is_open());
    }
}
