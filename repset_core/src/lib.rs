#![forbid(unsafe_code)]

//! Core domain model and business logic for the repset workout tracker.
//!
//! This crate provides:
//! - Domain types (sessions, exercise/set logs, templates, body weight)
//! - The active-session model with two-phase (publish then persist) mutations
//! - The rest-timer engine
//! - Previous-lift matching
//! - Persistence (SQLite), history rollups and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod chime;
pub mod store;
pub mod previous;
pub mod timer;
pub mod session;
pub mod history;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, LookupMode, WorkoutConfig};
pub use chime::{Chime, SilentChime, TerminalChime};
pub use store::{SqliteStore, WorkoutStore};
pub use previous::match_previous_sets;
pub use timer::{RestTimer, TimerPhase, TimerState};
pub use session::ActiveSession;
pub use history::{exercise_stats, recent_sessions, ExerciseStats, SessionSummary};
pub use export::export_sets_csv;
