//! CSV export of the full workout log.
//!
//! One row per set, flattened with its exercise and session context, so the
//! output loads directly into a spreadsheet. The file is fsynced before the
//! function returns.

use crate::store::{SqliteStore, WorkoutStore};
use crate::Result;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::Path;

/// A flattened set row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    session_id: String,
    session_started_at: String,
    template: Option<String>,
    exercise: String,
    exercise_order: i64,
    set_number: i64,
    set_type: &'static str,
    weight: f64,
    reps: i64,
    rpe: Option<f64>,
    completed_at: Option<String>,
    rest_seconds: i64,
}

/// Write every logged set to `path`, oldest session first.
///
/// Returns the number of rows written. An existing file is replaced.
pub async fn export_sets_csv(store: &SqliteStore, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(file);

    let mut sessions = store.sessions_since(DateTime::<Utc>::MIN_UTC).await?;
    sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at));

    let mut count = 0;
    for session in sessions {
        for exercise in store.exercises_for_session(session.id).await? {
            for set in store.sets_for_exercise(exercise.id).await? {
                writer.serialize(CsvRow {
                    session_id: session.id.to_string(),
                    session_started_at: session.started_at.to_rfc3339(),
                    template: session.template_name.clone(),
                    exercise: exercise.exercise_name.clone(),
                    exercise_order: exercise.order_index,
                    set_number: set.set_number,
                    set_type: set.set_type.as_str(),
                    weight: set.weight,
                    reps: set.reps,
                    rpe: set.rpe,
                    completed_at: set.completed_at.map(|t| t.to_rfc3339()),
                    rest_seconds: set.rest_seconds,
                })?;
                count += 1;
            }
        }
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} set rows to {:?}", count, path);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExerciseLog, SetLog, SetType, WorkoutSession};
    use uuid::Uuid;

    async fn seeded_store() -> SqliteStore {
        let store = SqliteStore::connect_in_memory().await.unwrap();

        let session = WorkoutSession {
            id: Uuid::new_v4(),
            template_id: None,
            template_name: Some("Push Day".into()),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        store.insert_session(&session).await.unwrap();

        let exercise = ExerciseLog {
            id: Uuid::new_v4(),
            session_id: session.id,
            exercise_name: "Bench Press".into(),
            order_index: 0,
            show_rpe: true,
            note: None,
        };
        store.insert_exercise(&exercise).await.unwrap();

        for number in 1..=3 {
            store
                .insert_set(&SetLog {
                    id: Uuid::new_v4(),
                    exercise_log_id: exercise.id,
                    set_number: number,
                    weight: 100.0,
                    reps: 5,
                    rpe: Some(8.0),
                    completed_at: Some(Utc::now()),
                    set_type: SetType::Regular,
                    rest_seconds: 90,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_export_writes_one_row_per_set() {
        let store = seeded_store().await;
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export.csv");

        let count = export_sets_csv(&store, &path).await.unwrap();
        assert_eq!(count, 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert!(headers.iter().any(|h| h == "exercise"));
        assert!(headers.iter().any(|h| h == "set_type"));

        let records: Vec<csv::StringRecord> =
            reader.into_records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);

        let exercise_idx = headers.iter().position(|h| h == "exercise").unwrap();
        assert_eq!(&records[0][exercise_idx], "Bench Press");
    }

    #[tokio::test]
    async fn test_export_replaces_existing_file() {
        let store = seeded_store().await;
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export.csv");

        export_sets_csv(&store, &path).await.unwrap();
        export_sets_csv(&store, &path).await.unwrap();

        let reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.into_records().count(), 3);
    }

    #[tokio::test]
    async fn test_export_empty_store() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export.csv");

        let count = export_sets_csv(&store, &path).await.unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }
}
