//! SQLite-backed workout storage.
//!
//! The active-session model only sees the `WorkoutStore` trait; `SqliteStore`
//! implements it over an sqlx connection pool. The schema is created on
//! connect, and session deletion cascades to exercise and set rows via
//! foreign keys.

use crate::{
    BodyWeightEntry, Error, ExerciseLog, Result, SetLog, SetType, WorkoutSession, WorkoutTemplate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use uuid::Uuid;

/// Data-access surface the active-session model depends on.
///
/// Callers treat every operation as an external collaborator: they issue the
/// call and assume eventual completion.
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn insert_session(&self, session: &WorkoutSession) -> Result<()>;
    async fn get_session(&self, id: Uuid) -> Result<Option<WorkoutSession>>;
    /// Mark a session completed at the given instant
    async fn complete_session(&self, id: Uuid, completed_at: DateTime<Utc>) -> Result<()>;
    /// Delete a session; exercise and set rows go with it
    async fn delete_session(&self, id: Uuid) -> Result<()>;

    /// Exercises of a session ordered by `order_index`
    async fn exercises_for_session(&self, session_id: Uuid) -> Result<Vec<ExerciseLog>>;
    async fn insert_exercise(&self, exercise: &ExerciseLog) -> Result<()>;
    async fn update_exercise(&self, exercise: &ExerciseLog) -> Result<()>;
    async fn delete_exercise(&self, id: Uuid) -> Result<()>;
    /// Rewrite `order_index` for the given exercise ids
    async fn update_exercise_order(&self, updates: &[(Uuid, i64)]) -> Result<()>;

    /// Sets of an exercise ordered by `set_number`
    async fn sets_for_exercise(&self, exercise_log_id: Uuid) -> Result<Vec<SetLog>>;
    async fn insert_set(&self, set: &SetLog) -> Result<()>;
    async fn update_set(&self, set: &SetLog) -> Result<()>;
    async fn delete_set(&self, id: Uuid) -> Result<()>;
    /// Rewrite `set_number` for the given set ids (renumbering after removal)
    async fn update_set_numbers(&self, updates: &[(Uuid, i64)]) -> Result<()>;

    /// Sets of the most recent other session built from the same template that
    /// contains `exercise_name`, ordered by set number
    async fn previous_sets_by_template(
        &self,
        template_id: Uuid,
        exercise_name: &str,
        exclude_session: Uuid,
    ) -> Result<Vec<SetLog>>;

    /// Sets of the most recent other session containing `exercise_name`,
    /// regardless of template, ordered by set number
    async fn previous_sets_by_name(
        &self,
        exercise_name: &str,
        exclude_session: Uuid,
    ) -> Result<Vec<SetLog>>;
}

/// SQLite implementation of `WorkoutStore`
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS workout_sessions (
        id TEXT PRIMARY KEY,
        template_id TEXT,
        template_name TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS exercise_logs (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES workout_sessions(id) ON DELETE CASCADE,
        exercise_name TEXT NOT NULL,
        order_index INTEGER NOT NULL,
        show_rpe INTEGER NOT NULL DEFAULT 0,
        note TEXT
    )",
    "CREATE TABLE IF NOT EXISTS set_logs (
        id TEXT PRIMARY KEY,
        exercise_log_id TEXT NOT NULL REFERENCES exercise_logs(id) ON DELETE CASCADE,
        set_number INTEGER NOT NULL,
        weight REAL NOT NULL,
        reps INTEGER NOT NULL,
        rpe REAL,
        completed_at TEXT,
        set_type TEXT NOT NULL,
        rest_seconds INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS workout_templates (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        exercises TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS body_weight_entries (
        id TEXT PRIMARY KEY,
        weight_kg REAL NOT NULL,
        recorded_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_exercise_logs_session ON exercise_logs(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_exercise_logs_name ON exercise_logs(exercise_name)",
    "CREATE INDEX IF NOT EXISTS idx_set_logs_exercise ON set_logs(exercise_log_id)",
];

impl SqliteStore {
    /// Open (creating if necessary) the database at `path`
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::debug!("Opened workout database at {:?}", path);
        Ok(store)
    }

    /// Open a private in-memory database (tests)
    ///
    /// Limited to one connection: each SQLite in-memory connection is its own
    /// database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Most recent session without a completion timestamp, if any
    pub async fn latest_open_session(&self) -> Result<Option<WorkoutSession>> {
        let row = sqlx::query(
            "SELECT id, template_id, template_name, started_at, completed_at
             FROM workout_sessions
             WHERE completed_at IS NULL
             ORDER BY started_at DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    /// All sessions started at or after `since`, newest first
    pub async fn sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<WorkoutSession>> {
        let rows = sqlx::query(
            "SELECT id, template_id, template_name, started_at, completed_at
             FROM workout_sessions
             WHERE started_at >= ?1
             ORDER BY started_at DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(session_from_row).collect()
    }

    /// Count of exercise and set rows belonging to a session
    ///
    /// Used to verify that session deletion leaves no orphans behind.
    pub async fn session_row_counts(&self, session_id: Uuid) -> Result<(i64, i64)> {
        let exercises: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM exercise_logs WHERE session_id = ?1")
                .bind(session_id.to_string())
                .fetch_one(&self.pool)
                .await?
                .get("n");
        let sets: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM set_logs
             WHERE exercise_log_id IN (SELECT id FROM exercise_logs WHERE session_id = ?1)",
        )
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await?
        .get("n");
        Ok((exercises, sets))
    }

    pub async fn insert_template(&self, template: &WorkoutTemplate) -> Result<()> {
        let exercises = serde_json::to_string(&template.exercises)?;
        sqlx::query(
            "INSERT INTO workout_templates (id, name, exercises, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(template.id.to_string())
        .bind(&template.name)
        .bind(exercises)
        .bind(template.created_at)
        .execute(&self.pool)
        .await?;
        tracing::debug!("Saved template '{}'", template.name);
        Ok(())
    }

    pub async fn get_template_by_name(&self, name: &str) -> Result<Option<WorkoutTemplate>> {
        let row = sqlx::query(
            "SELECT id, name, exercises, created_at FROM workout_templates WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(template_from_row).transpose()
    }

    pub async fn list_templates(&self) -> Result<Vec<WorkoutTemplate>> {
        let rows = sqlx::query(
            "SELECT id, name, exercises, created_at FROM workout_templates ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(template_from_row).collect()
    }

    pub async fn record_body_weight(&self, entry: &BodyWeightEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO body_weight_entries (id, weight_kg, recorded_at) VALUES (?1, ?2, ?3)",
        )
        .bind(entry.id.to_string())
        .bind(entry.weight_kg)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Body-weight entries, newest first
    pub async fn list_body_weight(&self, limit: i64) -> Result<Vec<BodyWeightEntry>> {
        let rows = sqlx::query(
            "SELECT id, weight_kg, recorded_at FROM body_weight_entries
             ORDER BY recorded_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(BodyWeightEntry {
                    id: parse_uuid(&row.get::<String, _>("id"))?,
                    weight_kg: row.get("weight_kg"),
                    recorded_at: row.get("recorded_at"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl WorkoutStore for SqliteStore {
    async fn insert_session(&self, session: &WorkoutSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO workout_sessions (id, template_id, template_name, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(session.id.to_string())
        .bind(session.template_id.map(|id| id.to_string()))
        .bind(&session.template_name)
        .bind(session.started_at)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await?;
        tracing::debug!("Created workout session {}", session.id);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<WorkoutSession>> {
        let row = sqlx::query(
            "SELECT id, template_id, template_name, started_at, completed_at
             FROM workout_sessions WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn complete_session(&self, id: Uuid, completed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE workout_sessions SET completed_at = ?1 WHERE id = ?2")
            .bind(completed_at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        tracing::info!("Marked session {} completed", id);
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM workout_sessions WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        tracing::info!("Deleted session {} (cascades to exercises/sets)", id);
        Ok(())
    }

    async fn exercises_for_session(&self, session_id: Uuid) -> Result<Vec<ExerciseLog>> {
        let rows = sqlx::query(
            "SELECT id, session_id, exercise_name, order_index, show_rpe, note
             FROM exercise_logs WHERE session_id = ?1
             ORDER BY order_index",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(exercise_from_row).collect()
    }

    async fn insert_exercise(&self, exercise: &ExerciseLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO exercise_logs (id, session_id, exercise_name, order_index, show_rpe, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(exercise.id.to_string())
        .bind(exercise.session_id.to_string())
        .bind(&exercise.exercise_name)
        .bind(exercise.order_index)
        .bind(exercise.show_rpe)
        .bind(&exercise.note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_exercise(&self, exercise: &ExerciseLog) -> Result<()> {
        sqlx::query(
            "UPDATE exercise_logs
             SET exercise_name = ?1, order_index = ?2, show_rpe = ?3, note = ?4
             WHERE id = ?5",
        )
        .bind(&exercise.exercise_name)
        .bind(exercise.order_index)
        .bind(exercise.show_rpe)
        .bind(&exercise.note)
        .bind(exercise.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_exercise(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM exercise_logs WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_exercise_order(&self, updates: &[(Uuid, i64)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (id, order_index) in updates {
            sqlx::query("UPDATE exercise_logs SET order_index = ?1 WHERE id = ?2")
                .bind(order_index)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn sets_for_exercise(&self, exercise_log_id: Uuid) -> Result<Vec<SetLog>> {
        let rows = sqlx::query(
            "SELECT id, exercise_log_id, set_number, weight, reps, rpe, completed_at,
                    set_type, rest_seconds
             FROM set_logs WHERE exercise_log_id = ?1
             ORDER BY set_number",
        )
        .bind(exercise_log_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(set_from_row).collect()
    }

    async fn insert_set(&self, set: &SetLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO set_logs (id, exercise_log_id, set_number, weight, reps, rpe,
                                   completed_at, set_type, rest_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(set.id.to_string())
        .bind(set.exercise_log_id.to_string())
        .bind(set.set_number)
        .bind(set.weight)
        .bind(set.reps)
        .bind(set.rpe)
        .bind(set.completed_at)
        .bind(set.set_type.as_str())
        .bind(set.rest_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_set(&self, set: &SetLog) -> Result<()> {
        sqlx::query(
            "UPDATE set_logs
             SET set_number = ?1, weight = ?2, reps = ?3, rpe = ?4, completed_at = ?5,
                 set_type = ?6, rest_seconds = ?7
             WHERE id = ?8",
        )
        .bind(set.set_number)
        .bind(set.weight)
        .bind(set.reps)
        .bind(set.rpe)
        .bind(set.completed_at)
        .bind(set.set_type.as_str())
        .bind(set.rest_seconds)
        .bind(set.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_set(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM set_logs WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_set_numbers(&self, updates: &[(Uuid, i64)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (id, set_number) in updates {
            sqlx::query("UPDATE set_logs SET set_number = ?1 WHERE id = ?2")
                .bind(set_number)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn previous_sets_by_template(
        &self,
        template_id: Uuid,
        exercise_name: &str,
        exclude_session: Uuid,
    ) -> Result<Vec<SetLog>> {
        let rows = sqlx::query(
            "SELECT s.id, s.exercise_log_id, s.set_number, s.weight, s.reps, s.rpe,
                    s.completed_at, s.set_type, s.rest_seconds
             FROM set_logs s
             WHERE s.exercise_log_id = (
                 SELECT e.id FROM exercise_logs e
                 JOIN workout_sessions w ON e.session_id = w.id
                 WHERE e.exercise_name = ?1 AND w.id != ?2 AND w.template_id = ?3
                 ORDER BY w.started_at DESC, e.order_index
                 LIMIT 1
             )
             ORDER BY s.set_number",
        )
        .bind(exercise_name)
        .bind(exclude_session.to_string())
        .bind(template_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(set_from_row).collect()
    }

    async fn previous_sets_by_name(
        &self,
        exercise_name: &str,
        exclude_session: Uuid,
    ) -> Result<Vec<SetLog>> {
        let rows = sqlx::query(
            "SELECT s.id, s.exercise_log_id, s.set_number, s.weight, s.reps, s.rpe,
                    s.completed_at, s.set_type, s.rest_seconds
             FROM set_logs s
             WHERE s.exercise_log_id = (
                 SELECT e.id FROM exercise_logs e
                 JOIN workout_sessions w ON e.session_id = w.id
                 WHERE e.exercise_name = ?1 AND w.id != ?2
                 ORDER BY w.started_at DESC, e.order_index
                 LIMIT 1
             )
             ORDER BY s.set_number",
        )
        .bind(exercise_name)
        .bind(exclude_session.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(set_from_row).collect()
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Other(format!("Invalid UUID in database: {}", e)))
}

fn session_from_row(row: SqliteRow) -> Result<WorkoutSession> {
    let template_id = row
        .get::<Option<String>, _>("template_id")
        .map(|s| parse_uuid(&s))
        .transpose()?;
    Ok(WorkoutSession {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        template_id,
        template_name: row.get("template_name"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    })
}

fn exercise_from_row(row: SqliteRow) -> Result<ExerciseLog> {
    Ok(ExerciseLog {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        session_id: parse_uuid(&row.get::<String, _>("session_id"))?,
        exercise_name: row.get("exercise_name"),
        order_index: row.get("order_index"),
        show_rpe: row.get("show_rpe"),
        note: row.get("note"),
    })
}

fn set_from_row(row: SqliteRow) -> Result<SetLog> {
    let type_str: String = row.get("set_type");
    let set_type = SetType::parse(&type_str).unwrap_or_else(|| {
        tracing::warn!("Unknown set type '{}' in database, treating as regular", type_str);
        SetType::Regular
    });
    Ok(SetLog {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        exercise_log_id: parse_uuid(&row.get::<String, _>("exercise_log_id"))?,
        set_number: row.get("set_number"),
        weight: row.get("weight"),
        reps: row.get("reps"),
        rpe: row.get("rpe"),
        completed_at: row.get("completed_at"),
        set_type,
        rest_seconds: row.get("rest_seconds"),
    })
}

fn template_from_row(row: SqliteRow) -> Result<WorkoutTemplate> {
    let exercises: String = row.get("exercises");
    Ok(WorkoutTemplate {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        exercises: serde_json::from_str(&exercises)?,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemplateExercise;
    use chrono::Duration;

    fn session(started_days_ago: i64, template_id: Option<Uuid>) -> WorkoutSession {
        WorkoutSession {
            id: Uuid::new_v4(),
            template_id,
            template_name: template_id.map(|_| "Push Day".to_string()),
            started_at: Utc::now() - Duration::days(started_days_ago),
            completed_at: None,
        }
    }

    fn exercise(session_id: Uuid, name: &str, order_index: i64) -> ExerciseLog {
        ExerciseLog {
            id: Uuid::new_v4(),
            session_id,
            exercise_name: name.into(),
            order_index,
            show_rpe: false,
            note: None,
        }
    }

    fn set(exercise_log_id: Uuid, number: i64, weight: f64) -> SetLog {
        SetLog {
            id: Uuid::new_v4(),
            exercise_log_id,
            set_number: number,
            weight,
            reps: 5,
            rpe: Some(8.0),
            completed_at: Some(Utc::now()),
            set_type: SetType::Regular,
            rest_seconds: 90,
        }
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let s = session(0, Some(Uuid::new_v4()));
        store.insert_session(&s).await.unwrap();

        let loaded = store.get_session(s.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, s.id);
        assert_eq!(loaded.template_id, s.template_id);
        assert_eq!(loaded.template_name.as_deref(), Some("Push Day"));
        assert!(loaded.is_open());
    }

    #[tokio::test]
    async fn test_exercises_and_sets_ordered() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let s = session(0, None);
        store.insert_session(&s).await.unwrap();

        let second = exercise(s.id, "Squat", 1);
        let first = exercise(s.id, "Bench Press", 0);
        store.insert_exercise(&second).await.unwrap();
        store.insert_exercise(&first).await.unwrap();

        store.insert_set(&set(first.id, 2, 60.0)).await.unwrap();
        store.insert_set(&set(first.id, 1, 55.0)).await.unwrap();

        let exercises = store.exercises_for_session(s.id).await.unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].exercise_name, "Bench Press");

        let sets = store.sets_for_exercise(first.id).await.unwrap();
        assert_eq!(sets.iter().map(|x| x.set_number).collect::<Vec<_>>(), [1, 2]);
    }

    #[tokio::test]
    async fn test_delete_session_cascades() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let s = session(0, None);
        store.insert_session(&s).await.unwrap();
        let ex = exercise(s.id, "Deadlift", 0);
        store.insert_exercise(&ex).await.unwrap();
        store.insert_set(&set(ex.id, 1, 100.0)).await.unwrap();
        store.insert_set(&set(ex.id, 2, 110.0)).await.unwrap();

        store.delete_session(s.id).await.unwrap();

        assert!(store.get_session(s.id).await.unwrap().is_none());
        let (exercises, sets) = store.session_row_counts(s.id).await.unwrap();
        assert_eq!(exercises, 0);
        assert_eq!(sets, 0);
    }

    #[tokio::test]
    async fn test_complete_session_closes_it() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let s = session(0, None);
        store.insert_session(&s).await.unwrap();

        assert!(store.latest_open_session().await.unwrap().is_some());

        store.complete_session(s.id, Utc::now()).await.unwrap();

        assert!(store.latest_open_session().await.unwrap().is_none());
        let loaded = store.get_session(s.id).await.unwrap().unwrap();
        assert!(!loaded.is_open());
    }

    #[tokio::test]
    async fn test_update_set_numbers_bulk() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let s = session(0, None);
        store.insert_session(&s).await.unwrap();
        let ex = exercise(s.id, "Row", 0);
        store.insert_exercise(&ex).await.unwrap();
        let a = set(ex.id, 1, 50.0);
        let c = set(ex.id, 3, 50.0);
        store.insert_set(&a).await.unwrap();
        store.insert_set(&c).await.unwrap();

        store.update_set_numbers(&[(c.id, 2)]).await.unwrap();

        let sets = store.sets_for_exercise(ex.id).await.unwrap();
        assert_eq!(sets.iter().map(|x| x.set_number).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(sets[1].id, c.id);
    }

    #[tokio::test]
    async fn test_previous_sets_by_name_picks_most_recent() {
        let store = SqliteStore::connect_in_memory().await.unwrap();

        let old = session(10, None);
        let recent = session(2, None);
        let current = session(0, None);
        for s in [&old, &recent, &current] {
            store.insert_session(s).await.unwrap();
        }

        let old_ex = exercise(old.id, "Bench Press", 0);
        let recent_ex = exercise(recent.id, "Bench Press", 0);
        store.insert_exercise(&old_ex).await.unwrap();
        store.insert_exercise(&recent_ex).await.unwrap();
        store.insert_set(&set(old_ex.id, 1, 80.0)).await.unwrap();
        store.insert_set(&set(recent_ex.id, 1, 90.0)).await.unwrap();

        let previous = store
            .previous_sets_by_name("Bench Press", current.id)
            .await
            .unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].weight, 90.0);
    }

    #[tokio::test]
    async fn test_previous_sets_by_name_excludes_current_session() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let current = session(0, None);
        store.insert_session(&current).await.unwrap();
        let ex = exercise(current.id, "Squat", 0);
        store.insert_exercise(&ex).await.unwrap();
        store.insert_set(&set(ex.id, 1, 100.0)).await.unwrap();

        let previous = store.previous_sets_by_name("Squat", current.id).await.unwrap();
        assert!(previous.is_empty());
    }

    #[tokio::test]
    async fn test_previous_sets_by_template_filters_template() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let template_id = Uuid::new_v4();

        let templated = session(5, Some(template_id));
        let freeform = session(1, None);
        let current = session(0, Some(template_id));
        for s in [&templated, &freeform, &current] {
            store.insert_session(s).await.unwrap();
        }

        let templated_ex = exercise(templated.id, "Overhead Press", 0);
        let freeform_ex = exercise(freeform.id, "Overhead Press", 0);
        store.insert_exercise(&templated_ex).await.unwrap();
        store.insert_exercise(&freeform_ex).await.unwrap();
        store.insert_set(&set(templated_ex.id, 1, 40.0)).await.unwrap();
        store.insert_set(&set(freeform_ex.id, 1, 45.0)).await.unwrap();

        // The freeform session is newer, but lookup is pinned to the template
        let previous = store
            .previous_sets_by_template(template_id, "Overhead Press", current.id)
            .await
            .unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].weight, 40.0);
    }

    #[tokio::test]
    async fn test_template_roundtrip() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let template = WorkoutTemplate {
            id: Uuid::new_v4(),
            name: "Pull Day".into(),
            exercises: vec![TemplateExercise {
                exercise_name: "Barbell Row".into(),
                set_count: 4,
                rest_seconds: 120,
                show_rpe: true,
            }],
            created_at: Utc::now(),
        };
        store.insert_template(&template).await.unwrap();

        let loaded = store.get_template_by_name("Pull Day").await.unwrap().unwrap();
        assert_eq!(loaded.exercises.len(), 1);
        assert_eq!(loaded.exercises[0].exercise_name, "Barbell Row");
        assert_eq!(loaded.exercises[0].set_count, 4);

        assert!(store.get_template_by_name("Leg Day").await.unwrap().is_none());
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_body_weight_roundtrip() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        for (days_ago, kg) in [(2, 81.0), (1, 80.5), (0, 80.2)] {
            store
                .record_body_weight(&BodyWeightEntry {
                    id: Uuid::new_v4(),
                    weight_kg: kg,
                    recorded_at: Utc::now() - Duration::days(days_ago),
                })
                .await
                .unwrap();
        }

        let entries = store.list_body_weight(2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].weight_kg, 80.2); // newest first
    }
}
