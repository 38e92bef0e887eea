use clap::{Parser, Subcommand};
use repset_core::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "repset")]
#[command(about = "Strength workout tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new workout session
    Start {
        /// Build the workout from a saved template
        #[arg(long)]
        template: Option<String>,
    },

    /// Show the active workout
    Status,

    /// Manage exercises in the active workout
    #[command(subcommand)]
    Exercise(ExerciseCommands),

    /// Manage sets in the active workout
    #[command(subcommand)]
    Set(SetCommands),

    /// Run a standalone rest timer
    Rest {
        /// Countdown length in seconds
        seconds: u32,
    },

    /// Finish the active workout
    Finish,

    /// Cancel the active workout, discarding it entirely
    Cancel,

    /// Manage workout templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Track body weight
    #[command(subcommand)]
    Weight(WeightCommands),

    /// Show recent workout history
    History {
        /// Window in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Show lifetime statistics for one exercise
    Stats {
        /// Exercise name
        exercise: String,
    },

    /// Export the full workout log as CSV
    Export {
        /// Output file path
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ExerciseCommands {
    /// Add an exercise to the active workout
    Add { name: String },

    /// Remove an exercise (1-based position)
    Remove { position: usize },

    /// Move an exercise to a new position (both 1-based)
    Move { from: usize, to: usize },

    /// Set or clear an exercise note
    Note {
        position: usize,
        /// Omit to clear the note
        note: Option<String>,
    },
}

#[derive(Subcommand)]
enum SetCommands {
    /// Append a set to an exercise (1-based position)
    Add { exercise: usize },

    /// Toggle a set complete; starts the rest timer when completing
    Done {
        exercise: usize,
        set: i64,

        /// Do not wait out the rest timer
        #[arg(long)]
        skip_rest: bool,
    },

    /// Edit a set's recorded values
    Edit {
        exercise: usize,
        set: i64,

        #[arg(long)]
        weight: Option<f64>,

        #[arg(long)]
        reps: Option<i64>,

        #[arg(long)]
        rpe: Option<f64>,

        /// Rest after this set, in seconds
        #[arg(long)]
        rest: Option<i64>,

        /// Set type: regular, warmup or drop_set
        #[arg(long = "type")]
        set_type: Option<String>,
    },

    /// Remove a set; the rest are renumbered
    Remove { exercise: usize, set: i64 },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Save a template. Slots are NAME:SETS:REST, e.g. "Bench Press:3:120"
    Add {
        name: String,

        /// Exercise slots, repeatable
        #[arg(long = "exercise", required = true)]
        exercises: Vec<String>,
    },

    /// List saved templates
    List,
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Record a body-weight measurement in kilograms
    Log { kg: f64 },

    /// Show recent measurements
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    repset_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    let store = Arc::new(SqliteStore::connect(&config.db_path()).await?);

    match cli.command {
        Commands::Start { template } => cmd_start(store, &config, template).await,
        Commands::Status => cmd_status(store, &config).await,
        Commands::Exercise(cmd) => cmd_exercise(store, &config, cmd).await,
        Commands::Set(cmd) => cmd_set(store, &config, cmd).await,
        Commands::Rest { seconds } => cmd_rest(seconds).await,
        Commands::Finish => cmd_finish(store, &config).await,
        Commands::Cancel => cmd_cancel(store, &config).await,
        Commands::Template(cmd) => cmd_template(store, cmd).await,
        Commands::Weight(cmd) => cmd_weight(store, cmd).await,
        Commands::History { days } => cmd_history(store, days).await,
        Commands::Stats { exercise } => cmd_stats(store, &exercise).await,
        Commands::Export { path } => cmd_export(store, &path).await,
    }
}

/// Resume the single open session, or fail with a clear message.
async fn open_session(store: Arc<SqliteStore>, config: &Config) -> Result<ActiveSession> {
    let open = store
        .latest_open_session()
        .await?
        .ok_or_else(|| Error::Other("No workout in progress. Run `repset start`.".into()))?;
    ActiveSession::load(
        store,
        config.workout.clone(),
        Arc::new(TerminalChime),
        open.id,
    )
    .await
}

async fn cmd_start(
    store: Arc<SqliteStore>,
    config: &Config,
    template: Option<String>,
) -> Result<()> {
    if let Some(open) = store.latest_open_session().await? {
        return Err(Error::Other(format!(
            "A workout started {} is still in progress. Finish or cancel it first.",
            open.started_at.format("%Y-%m-%d %H:%M")
        )));
    }

    let template = match template {
        Some(name) => Some(
            store
                .get_template_by_name(&name)
                .await?
                .ok_or(Error::TemplateNotFound(name))?,
        ),
        None => None,
    };

    let mut session = ActiveSession::start(
        store,
        config.workout.clone(),
        Arc::new(TerminalChime),
        template.as_ref(),
    )
    .await?;
    session.flush().await;

    match template {
        Some(t) => println!("✓ Started workout from template '{}'", t.name),
        None => println!("✓ Started empty workout"),
    }
    print_session(&session);
    Ok(())
}

async fn cmd_status(store: Arc<SqliteStore>, config: &Config) -> Result<()> {
    let session = open_session(store, config).await?;
    print_session(&session);
    Ok(())
}

async fn cmd_exercise(
    store: Arc<SqliteStore>,
    config: &Config,
    cmd: ExerciseCommands,
) -> Result<()> {
    let mut session = open_session(store, config).await?;

    match cmd {
        ExerciseCommands::Add { name } => {
            session.add_exercise(&name).await?;
            println!("✓ Added {}", name);
        }
        ExerciseCommands::Remove { position } => {
            let index = exercise_index(&session, position)?;
            let name = session.exercises()[index].log.exercise_name.clone();
            session.remove_exercise(index);
            println!("✓ Removed {}", name);
        }
        ExerciseCommands::Move { from, to } => {
            let from = exercise_index(&session, from)?;
            let to = exercise_index(&session, to)?;
            session.reorder_exercises(from, to);
            println!("✓ Reordered");
        }
        ExerciseCommands::Note { position, note } => {
            let index = exercise_index(&session, position)?;
            session.set_exercise_note(index, note);
            println!("✓ Note updated");
        }
    }

    session.flush().await;
    print_session(&session);
    Ok(())
}

async fn cmd_set(store: Arc<SqliteStore>, config: &Config, cmd: SetCommands) -> Result<()> {
    let mut session = open_session(store, config).await?;

    match cmd {
        SetCommands::Add { exercise } => {
            let index = exercise_index(&session, exercise)?;
            session.add_set(index);
        }
        SetCommands::Done {
            exercise,
            set,
            skip_rest,
        } => {
            let index = exercise_index(&session, exercise)?;
            session.complete_set(index, set);
            if !skip_rest {
                wait_out_timer(&session).await?;
            }
        }
        SetCommands::Edit {
            exercise,
            set,
            weight,
            reps,
            rpe,
            rest,
            set_type,
        } => {
            let index = exercise_index(&session, exercise)?;
            if let Some(weight) = weight {
                session.set_weight(index, set, weight);
            }
            if let Some(reps) = reps {
                session.set_reps(index, set, reps);
            }
            if rpe.is_some() {
                session.set_rpe(index, set, rpe);
            }
            if let Some(rest) = rest {
                session.set_rest_seconds(index, set, rest);
            }
            if let Some(ref s) = set_type {
                let parsed = SetType::parse(s)
                    .ok_or_else(|| Error::Other(format!("Unknown set type: {}", s)))?;
                session.set_set_type(index, set, parsed);
            }
        }
        SetCommands::Remove { exercise, set } => {
            let index = exercise_index(&session, exercise)?;
            session.remove_set(index, set);
        }
    }

    session.flush().await;
    print_session(&session);
    Ok(())
}

async fn cmd_rest(seconds: u32) -> Result<()> {
    let mut timer = RestTimer::new(Arc::new(TerminalChime));
    timer.start(seconds);

    let mut rx = timer.subscribe();
    if !rx.borrow().is_running() {
        println!("Nothing to time.");
        return Ok(());
    }
    print_timer_line(&rx.borrow())?;
    while rx.changed().await.is_ok() {
        let state = *rx.borrow();
        print_timer_line(&state)?;
        if state.phase == TimerPhase::Completed {
            println!();
            break;
        }
    }
    Ok(())
}

async fn cmd_finish(store: Arc<SqliteStore>, config: &Config) -> Result<()> {
    let mut session = open_session(store, config).await?;
    session.finish().await?;
    session.flush().await;

    let exercises = session.exercises();
    let completed: usize = exercises
        .iter()
        .map(|e| e.sets.iter().filter(|s| s.log.is_completed()).count())
        .sum();
    println!(
        "✓ Workout finished: {} exercises, {} completed sets",
        exercises.len(),
        completed
    );
    Ok(())
}

async fn cmd_cancel(store: Arc<SqliteStore>, config: &Config) -> Result<()> {
    let mut session = open_session(store, config).await?;
    session.cancel().await?;
    println!("✓ Workout cancelled and discarded");
    Ok(())
}

async fn cmd_template(store: Arc<SqliteStore>, cmd: TemplateCommands) -> Result<()> {
    match cmd {
        TemplateCommands::Add { name, exercises } => {
            let slots = exercises
                .iter()
                .map(|s| parse_template_slot(s))
                .collect::<Result<Vec<_>>>()?;
            let template = WorkoutTemplate {
                id: uuid::Uuid::new_v4(),
                name: name.clone(),
                exercises: slots,
                created_at: chrono::Utc::now(),
            };
            store.insert_template(&template).await?;
            println!(
                "✓ Saved template '{}' with {} exercises",
                name,
                template.exercises.len()
            );
        }
        TemplateCommands::List => {
            let templates = store.list_templates().await?;
            if templates.is_empty() {
                println!("No templates saved.");
            }
            for template in templates {
                println!("{}", template.name);
                for slot in &template.exercises {
                    println!(
                        "  {}: {} sets, {}s rest",
                        slot.exercise_name, slot.set_count, slot.rest_seconds
                    );
                }
            }
        }
    }
    Ok(())
}

async fn cmd_weight(store: Arc<SqliteStore>, cmd: WeightCommands) -> Result<()> {
    match cmd {
        WeightCommands::Log { kg } => {
            store
                .record_body_weight(&BodyWeightEntry {
                    id: uuid::Uuid::new_v4(),
                    weight_kg: kg,
                    recorded_at: chrono::Utc::now(),
                })
                .await?;
            println!("✓ Logged {:.1} kg", kg);
        }
        WeightCommands::List => {
            let entries = store.list_body_weight(30).await?;
            if entries.is_empty() {
                println!("No body-weight entries yet.");
            }
            for entry in entries {
                println!(
                    "{}  {:.1} kg",
                    entry.recorded_at.format("%Y-%m-%d"),
                    entry.weight_kg
                );
            }
        }
    }
    Ok(())
}

async fn cmd_history(store: Arc<SqliteStore>, days: i64) -> Result<()> {
    let summaries = recent_sessions(&store, days).await?;
    if summaries.is_empty() {
        println!("No workouts in the last {} days.", days);
        return Ok(());
    }

    for summary in summaries {
        let status = if summary.session.is_open() {
            "in progress"
        } else {
            "finished"
        };
        println!(
            "{}  {}  {} exercises, {} sets, {:.0} volume  [{}]",
            summary.session.started_at.format("%Y-%m-%d %H:%M"),
            summary
                .session
                .template_name
                .as_deref()
                .unwrap_or("(empty workout)"),
            summary.exercise_count,
            summary.completed_sets,
            summary.total_volume,
            status
        );
    }
    Ok(())
}

async fn cmd_stats(store: Arc<SqliteStore>, exercise: &str) -> Result<()> {
    match exercise_stats(&store, exercise).await? {
        Some(stats) => {
            println!("{}", stats.exercise_name);
            println!("  Sessions:      {}", stats.session_count);
            println!("  Completed sets: {}", stats.completed_sets);
            println!("  Best weight:   {:.1}", stats.best_weight);
            println!("  Est. 1RM:      {:.1}", stats.best_estimated_one_rm);
            if let Some(last) = stats.last_performed {
                println!("  Last performed: {}", last.format("%Y-%m-%d"));
            }
        }
        None => println!("No logged sets for '{}'.", exercise),
    }
    Ok(())
}

async fn cmd_export(store: Arc<SqliteStore>, path: &PathBuf) -> Result<()> {
    let count = export_sets_csv(&store, path).await?;
    println!("✓ Exported {} set rows to {}", count, path.display());
    Ok(())
}

/// Translate a 1-based CLI position into a list index.
fn exercise_index(session: &ActiveSession, position: usize) -> Result<usize> {
    let count = session.exercises().len();
    if position == 0 || position > count {
        return Err(Error::Other(format!(
            "No exercise at position {} (workout has {})",
            position, count
        )));
    }
    Ok(position - 1)
}

/// Parse a NAME:SETS:REST template slot.
fn parse_template_slot(s: &str) -> Result<TemplateExercise> {
    let parts: Vec<&str> = s.rsplitn(3, ':').collect();
    if parts.len() != 3 {
        return Err(Error::Other(format!(
            "Invalid exercise slot '{}'. Expected NAME:SETS:REST, e.g. \"Bench Press:3:120\"",
            s
        )));
    }
    let rest_seconds: i64 = parts[0]
        .parse()
        .map_err(|_| Error::Other(format!("Invalid rest seconds in '{}'", s)))?;
    let set_count: i64 = parts[1]
        .parse()
        .map_err(|_| Error::Other(format!("Invalid set count in '{}'", s)))?;
    if set_count < 1 {
        return Err(Error::Other(format!("Set count must be at least 1 in '{}'", s)));
    }
    Ok(TemplateExercise {
        exercise_name: parts[2].to_string(),
        set_count,
        rest_seconds,
        show_rpe: false,
    })
}

/// Block until the rest timer finishes, redrawing the countdown in place.
async fn wait_out_timer(session: &ActiveSession) -> Result<()> {
    let mut rx = session.timer().subscribe();
    if !rx.borrow().is_running() {
        return Ok(());
    }

    print_timer_line(&rx.borrow())?;
    while rx.changed().await.is_ok() {
        let state = *rx.borrow();
        print_timer_line(&state)?;
        if matches!(state.phase, TimerPhase::Completed | TimerPhase::Idle) {
            println!();
            break;
        }
    }
    Ok(())
}

fn print_timer_line(state: &TimerState) -> Result<()> {
    print!("\r  Rest {}  ", state.formatted());
    io::stdout().flush()?;
    Ok(())
}

fn print_session(session: &ActiveSession) {
    let info = session.session();
    println!();
    println!(
        "Workout started {}{}",
        info.started_at.format("%Y-%m-%d %H:%M"),
        info.template_name
            .as_deref()
            .map(|n| format!(" ({})", n))
            .unwrap_or_default()
    );

    let exercises = session.exercises();
    if exercises.is_empty() {
        println!("  (no exercises yet: `repset exercise add NAME`)");
        return;
    }

    for (i, exercise) in exercises.iter().enumerate() {
        println!("  {}. {}", i + 1, exercise.log.exercise_name);
        if let Some(ref note) = exercise.log.note {
            println!("     note: {}", note);
        }
        for set in &exercise.sets {
            let mark = if set.log.is_completed() { "x" } else { " " };
            let kind = match set.log.set_type {
                SetType::Regular => "",
                SetType::Warmup => " W",
                SetType::DropSet => " D",
            };
            let previous = set
                .previous
                .map(|p| format!("  (prev {:.1} x {})", p.weight, p.reps))
                .unwrap_or_default();
            println!(
                "     [{}] #{}{}  {:.1} x {}{}",
                mark, set.log.set_number, kind, set.log.weight, set.log.reps, previous
            );
        }
    }
}
