//! Workout history with N-day window and per-exercise statistics.
//!
//! Read-only rollups over finished sessions, used by the history and stats
//! views. Open sessions are included in the window so an in-progress workout
//! shows up at the top of the list.

use crate::store::{SqliteStore, WorkoutStore};
use crate::{Result, WorkoutSession};
use chrono::{DateTime, Duration, Utc};

/// One session with its rolled-up totals
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: WorkoutSession,
    pub exercise_count: usize,
    pub completed_sets: usize,
    /// Sum of weight * reps over completed sets
    pub total_volume: f64,
}

/// Lifetime rollup for one exercise name
#[derive(Debug, Clone)]
pub struct ExerciseStats {
    pub exercise_name: String,
    pub session_count: usize,
    pub completed_sets: usize,
    pub best_weight: f64,
    pub best_estimated_one_rm: f64,
    pub last_performed: Option<DateTime<Utc>>,
}

/// Load summaries for sessions started in the last `days` days,
/// sorted newest first.
pub async fn recent_sessions(store: &SqliteStore, days: i64) -> Result<Vec<SessionSummary>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut summaries = Vec::new();

    for session in store.sessions_since(cutoff).await? {
        let mut exercise_count = 0;
        let mut completed_sets = 0;
        let mut total_volume = 0.0;

        for exercise in store.exercises_for_session(session.id).await? {
            exercise_count += 1;
            for set in store.sets_for_exercise(exercise.id).await? {
                if set.is_completed() {
                    completed_sets += 1;
                    total_volume += set.weight * set.reps as f64;
                }
            }
        }

        summaries.push(SessionSummary {
            session,
            exercise_count,
            completed_sets,
            total_volume,
        });
    }

    summaries.sort_by(|a, b| b.session.started_at.cmp(&a.session.started_at));

    tracing::debug!(
        "Loaded {} session summaries from last {} days",
        summaries.len(),
        days
    );
    Ok(summaries)
}

/// Roll up every completed set ever logged under `exercise_name`.
///
/// Returns None when the exercise has never been performed.
pub async fn exercise_stats(
    store: &SqliteStore,
    exercise_name: &str,
) -> Result<Option<ExerciseStats>> {
    let mut stats = ExerciseStats {
        exercise_name: exercise_name.to_string(),
        session_count: 0,
        completed_sets: 0,
        best_weight: 0.0,
        best_estimated_one_rm: 0.0,
        last_performed: None,
    };
    let mut seen = false;

    // Full scan over sessions; history volumes are small
    for session in store.sessions_since(DateTime::<Utc>::MIN_UTC).await? {
        let mut in_session = false;
        for exercise in store.exercises_for_session(session.id).await? {
            if exercise.exercise_name != exercise_name {
                continue;
            }
            seen = true;
            for set in store.sets_for_exercise(exercise.id).await? {
                if !set.is_completed() {
                    continue;
                }
                in_session = true;
                stats.completed_sets += 1;
                stats.best_weight = stats.best_weight.max(set.weight);
                stats.best_estimated_one_rm = stats
                    .best_estimated_one_rm
                    .max(estimated_one_rm(set.weight, set.reps));
                if stats.last_performed.map_or(true, |t| set.completed_at > Some(t)) {
                    stats.last_performed = set.completed_at;
                }
            }
        }
        if in_session {
            stats.session_count += 1;
        }
    }

    Ok(seen.then_some(stats))
}

/// Epley one-rep-max estimate. Single reps return the weight itself.
pub fn estimated_one_rm(weight: f64, reps: i64) -> f64 {
    if reps <= 0 {
        return 0.0;
    }
    if reps == 1 {
        return weight;
    }
    weight * (1.0 + reps as f64 / 30.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExerciseLog, SetLog, SetType};
    use std::sync::Arc;
    use uuid::Uuid;

    async fn store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::connect_in_memory().await.unwrap())
    }

    async fn insert_session_with_sets(
        store: &SqliteStore,
        exercise_name: &str,
        days_ago: i64,
        sets: &[(f64, i64, bool)],
    ) -> WorkoutSession {
        let started_at = Utc::now() - Duration::days(days_ago);
        let session = WorkoutSession {
            id: Uuid::new_v4(),
            template_id: None,
            template_name: None,
            started_at,
            completed_at: Some(started_at + Duration::hours(1)),
        };
        store.insert_session(&session).await.unwrap();

        let exercise = ExerciseLog {
            id: Uuid::new_v4(),
            session_id: session.id,
            exercise_name: exercise_name.into(),
            order_index: 0,
            show_rpe: false,
            note: None,
        };
        store.insert_exercise(&exercise).await.unwrap();

        for (i, (weight, reps, completed)) in sets.iter().enumerate() {
            store
                .insert_set(&SetLog {
                    id: Uuid::new_v4(),
                    exercise_log_id: exercise.id,
                    set_number: i as i64 + 1,
                    weight: *weight,
                    reps: *reps,
                    rpe: None,
                    completed_at: completed.then(|| started_at + Duration::minutes(i as i64)),
                    set_type: SetType::Regular,
                    rest_seconds: 90,
                })
                .await
                .unwrap();
        }
        session
    }

    #[tokio::test]
    async fn test_recent_sessions_window_and_order() {
        let store = store().await;
        insert_session_with_sets(&store, "Squat", 1, &[(100.0, 5, true)]).await;
        insert_session_with_sets(&store, "Squat", 3, &[(95.0, 5, true)]).await;
        insert_session_with_sets(&store, "Squat", 10, &[(90.0, 5, true)]).await; // too old

        let summaries = recent_sessions(&store, 7).await.unwrap();

        assert_eq!(summaries.len(), 2);
        // Newest first
        assert!(summaries[0].session.started_at > summaries[1].session.started_at);
    }

    #[tokio::test]
    async fn test_summary_counts_only_completed_sets() {
        let store = store().await;
        insert_session_with_sets(
            &store,
            "Bench Press",
            1,
            &[(100.0, 5, true), (100.0, 5, true), (105.0, 3, false)],
        )
        .await;

        let summaries = recent_sessions(&store, 7).await.unwrap();

        assert_eq!(summaries[0].exercise_count, 1);
        assert_eq!(summaries[0].completed_sets, 2);
        assert_eq!(summaries[0].total_volume, 1000.0);
    }

    #[tokio::test]
    async fn test_exercise_stats_rollup() {
        let store = store().await;
        insert_session_with_sets(&store, "Deadlift", 5, &[(140.0, 5, true)]).await;
        insert_session_with_sets(&store, "Deadlift", 1, &[(150.0, 3, true), (160.0, 1, true)])
            .await;
        insert_session_with_sets(&store, "Squat", 2, &[(120.0, 5, true)]).await;

        let stats = exercise_stats(&store, "Deadlift").await.unwrap().unwrap();

        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.completed_sets, 3);
        assert_eq!(stats.best_weight, 160.0);
        // 150x3 Epley beats the 160 single
        assert!((stats.best_estimated_one_rm - 165.0).abs() < 0.01);
        assert!(stats.last_performed.is_some());
    }

    #[tokio::test]
    async fn test_unknown_exercise_has_no_stats() {
        let store = store().await;
        insert_session_with_sets(&store, "Squat", 1, &[(100.0, 5, true)]).await;

        assert!(exercise_stats(&store, "Curl").await.unwrap().is_none());
    }

    #[test]
    fn test_epley_estimate() {
        assert_eq!(estimated_one_rm(100.0, 1), 100.0);
        assert!((estimated_one_rm(100.0, 5) - 116.666).abs() < 0.01);
        assert_eq!(estimated_one_rm(100.0, 0), 0.0);
    }
}
