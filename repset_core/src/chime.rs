//! Audio-notification boundary for rest-timer completion.
//!
//! The timer engine only knows how to fire a `Chime`; what that means
//! (terminal bell, system sound, nothing) is up to the consumer.

use std::io::Write;

/// Played once when a rest timer expires. Fire-and-forget: the timer never
/// inspects the outcome.
pub trait Chime: Send + Sync {
    fn play(&self);
}

/// Rings the terminal bell and logs the event
pub struct TerminalChime;

impl Chime for TerminalChime {
    fn play(&self) {
        print!("\x07");
        let _ = std::io::stdout().flush();
        tracing::info!("Rest timer finished");
    }
}

/// Logs the event only (headless environments)
pub struct SilentChime;

impl Chime for SilentChime {
    fn play(&self) {
        tracing::debug!("Rest timer finished (silent chime)");
    }
}
