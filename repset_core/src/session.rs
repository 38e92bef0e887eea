//! Active-workout session model.
//!
//! Owns the authoritative in-memory list of exercises-with-sets for one
//! running workout. Every mutation happens in two phases: the published state
//! is recomputed and replaced synchronously (copy-on-write, so the view
//! reflects the change with zero latency), then the affected rows are
//! persisted on a background task. Phase-2 failures are logged and dropped;
//! the next awaited storage call surfaces real trouble.
//!
//! There are no locks here: every mutation funnels through the single watch
//! sender, and the published list is always replaced wholesale.

use crate::chime::Chime;
use crate::config::{LookupMode, WorkoutConfig};
use crate::previous::match_previous_sets;
use crate::store::WorkoutStore;
use crate::timer::RestTimer;
use crate::{
    ActiveExercise, ActiveSet, Error, ExerciseLog, Result, SetLog, SetType, WorkoutSession,
    WorkoutTemplate,
};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One running workout: in-memory exercise/set lists mirrored to storage.
pub struct ActiveSession {
    store: Arc<dyn WorkoutStore>,
    defaults: WorkoutConfig,
    session: WorkoutSession,
    exercises_tx: watch::Sender<Arc<Vec<ActiveExercise>>>,
    /// Previous-performance sets per exercise log id, fetched once and reused
    /// whenever the set layout changes.
    prior_sets: HashMap<Uuid, Vec<SetLog>>,
    timer: RestTimer,
    pending: Vec<JoinHandle<()>>,
    finished: bool,
}

impl ActiveSession {
    /// Start a new workout, optionally from a template.
    ///
    /// The session row is written before this returns; template exercises are
    /// added through the normal mutation path.
    pub async fn start(
        store: Arc<dyn WorkoutStore>,
        defaults: WorkoutConfig,
        chime: Arc<dyn Chime>,
        template: Option<&WorkoutTemplate>,
    ) -> Result<Self> {
        let session = WorkoutSession {
            id: Uuid::new_v4(),
            template_id: template.map(|t| t.id),
            template_name: template.map(|t| t.name.clone()),
            started_at: Utc::now(),
            completed_at: None,
        };
        store.insert_session(&session).await?;
        tracing::info!(
            "Started workout session {} ({})",
            session.id,
            session.template_name.as_deref().unwrap_or("empty")
        );

        let mut this = Self::empty(store, defaults, chime, session);
        if let Some(template) = template {
            for slot in &template.exercises {
                this.add_exercise_with(
                    &slot.exercise_name,
                    slot.set_count,
                    slot.rest_seconds,
                    slot.show_rpe,
                )
                .await?;
            }
        }
        Ok(this)
    }

    /// Rebuild the model for an existing session id.
    pub async fn load(
        store: Arc<dyn WorkoutStore>,
        defaults: WorkoutConfig,
        chime: Arc<dyn Chime>,
        session_id: Uuid,
    ) -> Result<Self> {
        let session = store
            .get_session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;

        let mut this = Self::empty(store, defaults, chime, session);

        let logs = this.store.exercises_for_session(session_id).await?;
        let mut exercises = Vec::with_capacity(logs.len());
        for log in logs {
            let sets = this.store.sets_for_exercise(log.id).await?;
            let prior = this.fetch_previous(&log.exercise_name).await?;
            let matched = match_previous_sets(&sets, &prior);
            let sets = sets
                .into_iter()
                .zip(matched)
                .map(|(log, previous)| ActiveSet { log, previous })
                .collect();
            this.prior_sets.insert(log.id, prior);
            exercises.push(ActiveExercise {
                log,
                sets,
                expanded: true,
            });
        }
        this.exercises_tx.send_replace(Arc::new(exercises));
        Ok(this)
    }

    fn empty(
        store: Arc<dyn WorkoutStore>,
        defaults: WorkoutConfig,
        chime: Arc<dyn Chime>,
        session: WorkoutSession,
    ) -> Self {
        let (exercises_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            store,
            defaults,
            session,
            exercises_tx,
            prior_sets: HashMap::new(),
            timer: RestTimer::new(chime),
            pending: Vec::new(),
            finished: false,
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn session(&self) -> &WorkoutSession {
        &self.session
    }

    /// Current published exercise list
    pub fn exercises(&self) -> Arc<Vec<ActiveExercise>> {
        self.exercises_tx.borrow().clone()
    }

    /// Subscribe to list updates; receivers see the latest value plus all
    /// subsequent updates.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<ActiveExercise>>> {
        self.exercises_tx.subscribe()
    }

    pub fn timer(&self) -> &RestTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut RestTimer {
        &mut self.timer
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ------------------------------------------------------------------
    // Set mutations
    // ------------------------------------------------------------------

    pub fn set_weight(&mut self, exercise: usize, set_number: i64, weight: f64) {
        self.update_set_field(exercise, set_number, |set| set.weight = weight);
    }

    pub fn set_reps(&mut self, exercise: usize, set_number: i64, reps: i64) {
        self.update_set_field(exercise, set_number, |set| set.reps = reps);
    }

    pub fn set_rpe(&mut self, exercise: usize, set_number: i64, rpe: Option<f64>) {
        self.update_set_field(exercise, set_number, |set| set.rpe = rpe);
    }

    pub fn set_rest_seconds(&mut self, exercise: usize, set_number: i64, rest_seconds: i64) {
        self.update_set_field(exercise, set_number, |set| {
            set.rest_seconds = rest_seconds.max(0)
        });
    }

    /// Change a set's type and refresh previous-lift pairing, which depends on
    /// type positions.
    pub fn set_set_type(&mut self, exercise: usize, set_number: i64, set_type: SetType) {
        let mut updated = None;
        let prior = &self.prior_sets;
        self.publish(|exercises| {
            let Some(ex) = exercises.get_mut(exercise) else {
                return;
            };
            let Some(set) = ex.sets.iter_mut().find(|s| s.log.set_number == set_number) else {
                return;
            };
            set.log.set_type = set_type;
            updated = Some(set.log.clone());
            if let Some(pool) = prior.get(&ex.log.id) {
                refresh_previous(ex, pool);
            }
        });
        if let Some(row) = updated {
            let store = Arc::clone(&self.store);
            self.persist("set", async move { store.update_set(&row).await });
        }
    }

    /// Toggle a set's completion. Completing a set with configured rest starts
    /// the rest timer.
    pub fn complete_set(&mut self, exercise: usize, set_number: i64) {
        let mut updated = None;
        let mut start_rest = None;
        self.publish(|exercises| {
            let Some(ex) = exercises.get_mut(exercise) else {
                return;
            };
            let Some(set) = ex.sets.iter_mut().find(|s| s.log.set_number == set_number) else {
                return;
            };
            if set.log.completed_at.is_some() {
                set.log.completed_at = None;
            } else {
                set.log.completed_at = Some(Utc::now());
                start_rest = Some(set.log.rest_seconds);
            }
            updated = Some(set.log.clone());
        });
        if let Some(row) = updated {
            let store = Arc::clone(&self.store);
            self.persist("set", async move { store.update_set(&row).await });
        }
        if let Some(rest) = start_rest {
            if rest > 0 {
                self.timer.start(u32::try_from(rest).unwrap_or(u32::MAX));
            }
        }
    }

    /// Append a set: number = max existing + 1, rest inherited from the last
    /// set (falling back to the configured default).
    pub fn add_set(&mut self, exercise: usize) {
        let default_rest = self.defaults.default_rest_seconds;
        let mut inserted = None;
        let prior = &self.prior_sets;
        self.publish(|exercises| {
            let Some(ex) = exercises.get_mut(exercise) else {
                return;
            };
            let number = ex.sets.iter().map(|s| s.log.set_number).max().unwrap_or(0) + 1;
            let last = ex.sets.last().map(|s| s.log.clone());
            let log = SetLog {
                id: Uuid::new_v4(),
                exercise_log_id: ex.log.id,
                set_number: number,
                weight: last.as_ref().map_or(0.0, |s| s.weight),
                reps: last.as_ref().map_or(0, |s| s.reps),
                rpe: None,
                completed_at: None,
                set_type: SetType::Regular,
                rest_seconds: last.as_ref().map_or(default_rest, |s| s.rest_seconds),
            };
            ex.sets.push(ActiveSet {
                log: log.clone(),
                previous: None,
            });
            if let Some(pool) = prior.get(&ex.log.id) {
                refresh_previous(ex, pool);
            }
            inserted = Some(log);
        });
        if let Some(row) = inserted {
            let store = Arc::clone(&self.store);
            self.persist("set", async move { store.insert_set(&row).await });
        }
    }

    /// Remove a set and renumber the survivors to a gapless 1..N sequence.
    /// The last remaining set of an exercise cannot be removed. Only rows
    /// whose number actually changed are rewritten in storage.
    pub fn remove_set(&mut self, exercise: usize, set_number: i64) {
        let mut deleted = None;
        let mut renumbered = Vec::new();
        let prior = &self.prior_sets;
        self.publish(|exercises| {
            let Some(ex) = exercises.get_mut(exercise) else {
                return;
            };
            if ex.sets.len() <= 1 {
                tracing::debug!("Refusing to remove the last set of an exercise");
                return;
            }
            let Some(position) = ex.sets.iter().position(|s| s.log.set_number == set_number)
            else {
                return;
            };
            let removed = ex.sets.remove(position);
            deleted = Some(removed.log.id);
            renumbered = renumber_sets(&mut ex.sets);
            if let Some(pool) = prior.get(&ex.log.id) {
                refresh_previous(ex, pool);
            }
        });
        if let Some(id) = deleted {
            let store = Arc::clone(&self.store);
            self.persist("set", async move {
                store.delete_set(id).await?;
                store.update_set_numbers(&renumbered).await
            });
        }
    }

    // ------------------------------------------------------------------
    // Exercise mutations
    // ------------------------------------------------------------------

    /// Append an exercise with the configured default number of sets.
    pub async fn add_exercise(&mut self, name: &str) -> Result<()> {
        self.add_exercise_with(
            name,
            self.defaults.default_sets_per_exercise,
            self.defaults.default_rest_seconds,
            self.defaults.show_rpe,
        )
        .await
    }

    async fn add_exercise_with(
        &mut self,
        name: &str,
        set_count: i64,
        rest_seconds: i64,
        show_rpe: bool,
    ) -> Result<()> {
        let prior = self.fetch_previous(name).await?;
        let session_id = self.session.id;
        let mut created = None;
        {
            let prior = &prior;
            self.publish(|exercises| {
                let log = ExerciseLog {
                    id: Uuid::new_v4(),
                    session_id,
                    exercise_name: name.to_string(),
                    order_index: exercises.len() as i64,
                    show_rpe,
                    note: None,
                };
                let sets: Vec<SetLog> = (1..=set_count.max(1))
                    .map(|number| SetLog {
                        id: Uuid::new_v4(),
                        exercise_log_id: log.id,
                        set_number: number,
                        weight: 0.0,
                        reps: 0,
                        rpe: None,
                        completed_at: None,
                        set_type: SetType::Regular,
                        rest_seconds,
                    })
                    .collect();
                let matched = match_previous_sets(&sets, prior);
                let active_sets = sets
                    .iter()
                    .cloned()
                    .zip(matched)
                    .map(|(log, previous)| ActiveSet { log, previous })
                    .collect();
                exercises.push(ActiveExercise {
                    log: log.clone(),
                    sets: active_sets,
                    expanded: true,
                });
                created = Some((log, sets));
            });
        }
        if let Some((log, sets)) = created {
            self.prior_sets.insert(log.id, prior);
            let store = Arc::clone(&self.store);
            // Single task so the exercise row lands before its set rows
            self.persist("exercise", async move {
                store.insert_exercise(&log).await?;
                for set in &sets {
                    store.insert_set(set).await?;
                }
                Ok(())
            });
        }
        Ok(())
    }

    /// Remove an exercise and reindex the rest.
    pub fn remove_exercise(&mut self, index: usize) {
        let mut deleted: Option<Uuid> = None;
        let mut reordered = Vec::new();
        self.publish(|exercises| {
            if index >= exercises.len() {
                return;
            }
            let removed = exercises.remove(index);
            deleted = Some(removed.log.id);
            for (i, ex) in exercises.iter_mut().enumerate() {
                let want = i as i64;
                if ex.log.order_index != want {
                    ex.log.order_index = want;
                    reordered.push((ex.log.id, want));
                }
            }
        });
        if let Some(id) = deleted {
            self.prior_sets.remove(&id);
            let store = Arc::clone(&self.store);
            self.persist("exercise", async move {
                store.delete_exercise(id).await?;
                store.update_exercise_order(&reordered).await
            });
        }
    }

    /// List-move semantics: remove at `from`, insert at `to`. Only exercises
    /// whose position changed are rewritten in storage.
    pub fn reorder_exercises(&mut self, from: usize, to: usize) {
        let mut reordered = Vec::new();
        self.publish(|exercises| {
            if from >= exercises.len() || from == to {
                return;
            }
            let exercise = exercises.remove(from);
            let to = to.min(exercises.len());
            exercises.insert(to, exercise);
            for (i, ex) in exercises.iter_mut().enumerate() {
                let want = i as i64;
                if ex.log.order_index != want {
                    ex.log.order_index = want;
                    reordered.push((ex.log.id, want));
                }
            }
        });
        if !reordered.is_empty() {
            let store = Arc::clone(&self.store);
            self.persist("exercise order", async move {
                store.update_exercise_order(&reordered).await
            });
        }
    }

    pub fn set_exercise_note(&mut self, index: usize, note: Option<String>) {
        self.update_exercise_field(index, |log| log.note = note);
    }

    pub fn set_show_rpe(&mut self, index: usize, show_rpe: bool) {
        self.update_exercise_field(index, |log| log.show_rpe = show_rpe);
    }

    /// Display-only; never persisted.
    pub fn toggle_expanded(&mut self, index: usize) {
        self.publish(|exercises| {
            if let Some(ex) = exercises.get_mut(index) {
                ex.expanded = !ex.expanded;
            }
        });
    }

    // ------------------------------------------------------------------
    // Terminal operations
    // ------------------------------------------------------------------

    /// Mark the session completed. Idempotent; cancels any running rest timer.
    pub async fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.timer.cancel();
        let now = Utc::now();
        self.store.complete_session(self.session.id, now).await?;
        self.session.completed_at = Some(now);
        self.finished = true;
        tracing::info!("Finished workout session {}", self.session.id);
        Ok(())
    }

    /// Delete the session and everything under it. Idempotent; cancels any
    /// running rest timer.
    pub async fn cancel(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.timer.cancel();
        self.store.delete_session(self.session.id).await?;
        self.finished = true;
        tracing::info!("Cancelled workout session {}", self.session.id);
        Ok(())
    }

    /// Wait for all in-flight persistence tasks to settle.
    pub async fn flush(&mut self) {
        for task in self.pending.drain(..) {
            let _ = task.await;
        }
    }

    /// Deterministic teardown: abort in-flight persistence tasks and stop the
    /// timer.
    pub fn close(mut self) {
        self.timer.cancel();
        for task in self.pending.drain(..) {
            task.abort();
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn fetch_previous(&self, exercise_name: &str) -> Result<Vec<SetLog>> {
        match (self.defaults.previous_lift_lookup, self.session.template_id) {
            (LookupMode::ByTemplate, Some(template_id)) => {
                self.store
                    .previous_sets_by_template(template_id, exercise_name, self.session.id)
                    .await
            }
            _ => {
                self.store
                    .previous_sets_by_name(exercise_name, self.session.id)
                    .await
            }
        }
    }

    /// Phase 1: copy, mutate, publish. The published list is replaced as a
    /// whole so readers never observe a partial edit.
    fn publish<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Vec<ActiveExercise>),
    {
        let mut next: Vec<ActiveExercise> = self.exercises_tx.borrow().as_ref().clone();
        mutate(&mut next);
        self.exercises_tx.send_replace(Arc::new(next));
    }

    /// Phase 2: fire-and-forget storage write.
    fn persist<F>(&mut self, what: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            if let Err(e) = fut.await {
                tracing::warn!("Background {} write failed: {}", what, e);
            }
        });
        self.pending.retain(|t| !t.is_finished());
        self.pending.push(task);
    }

    fn update_set_field<F>(&mut self, exercise: usize, set_number: i64, apply: F)
    where
        F: FnOnce(&mut SetLog),
    {
        let mut updated = None;
        self.publish(|exercises| {
            let Some(ex) = exercises.get_mut(exercise) else {
                return;
            };
            let Some(set) = ex.sets.iter_mut().find(|s| s.log.set_number == set_number) else {
                return;
            };
            apply(&mut set.log);
            updated = Some(set.log.clone());
        });
        if let Some(row) = updated {
            let store = Arc::clone(&self.store);
            self.persist("set", async move { store.update_set(&row).await });
        }
    }

    fn update_exercise_field<F>(&mut self, index: usize, apply: F)
    where
        F: FnOnce(&mut ExerciseLog),
    {
        let mut updated = None;
        self.publish(|exercises| {
            let Some(ex) = exercises.get_mut(index) else {
                return;
            };
            apply(&mut ex.log);
            updated = Some(ex.log.clone());
        });
        if let Some(row) = updated {
            let store = Arc::clone(&self.store);
            self.persist("exercise", async move { store.update_exercise(&row).await });
        }
    }
}

/// Renumber sets to a consecutive 1..N sequence in their existing order,
/// returning only the (id, new number) pairs that actually changed.
fn renumber_sets(sets: &mut [ActiveSet]) -> Vec<(Uuid, i64)> {
    sets.sort_by_key(|s| s.log.set_number);
    let mut changed = Vec::new();
    for (i, set) in sets.iter_mut().enumerate() {
        let want = (i + 1) as i64;
        if set.log.set_number != want {
            set.log.set_number = want;
            changed.push((set.log.id, want));
        }
    }
    changed
}

/// Re-pair an exercise's sets with its previous-performance pool.
fn refresh_previous(exercise: &mut ActiveExercise, prior: &[SetLog]) {
    let current: Vec<SetLog> = exercise.sets.iter().map(|s| s.log.clone()).collect();
    let matched = match_previous_sets(&current, prior);
    for (set, previous) in exercise.sets.iter_mut().zip(matched) {
        set.previous = previous;
    }
}
