//! Rest-timer engine.
//!
//! A single countdown per engine instance: started when a set with configured
//! rest time is completed, ticking once per second on a background task, and
//! firing the chime exactly once when it reaches zero. Consumers observe the
//! state through a watch channel; the published value is always replaced as a
//! whole, never mutated in place.

use crate::chime::Chime;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Countdown lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Observable countdown state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimerState {
    pub phase: TimerPhase,
    pub total_seconds: u32,
    pub remaining_seconds: u32,
}

impl TimerState {
    pub const fn idle() -> Self {
        Self {
            phase: TimerPhase::Idle,
            total_seconds: 0,
            remaining_seconds: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    /// Fraction of the countdown remaining, clamped to [0, 1]
    pub fn progress(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        (f64::from(self.remaining_seconds) / f64::from(self.total_seconds)).clamp(0.0, 1.0)
    }

    /// Remaining time as "M:SS"
    pub fn formatted(&self) -> String {
        format!(
            "{}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }
}

/// Countdown engine with pause/resume/skip/adjust.
///
/// All operations are infallible; out-of-range inputs are clamped or ignored.
/// At most one ticking task exists at any time: starting a new countdown always
/// cancels the previous task first.
pub struct RestTimer {
    state_tx: watch::Sender<TimerState>,
    tick_task: Option<JoinHandle<()>>,
    chime: Arc<dyn Chime>,
}

impl RestTimer {
    pub fn new(chime: Arc<dyn Chime>) -> Self {
        let (state_tx, _) = watch::channel(TimerState::idle());
        Self {
            state_tx,
            tick_task: None,
            chime,
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> TimerState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state updates; the receiver sees the latest value plus all
    /// subsequent updates until dropped.
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state_tx.subscribe()
    }

    /// Begin a countdown of `seconds`. A zero duration is ignored.
    pub fn start(&mut self, seconds: u32) {
        if seconds == 0 {
            tracing::debug!("Ignoring zero-length rest timer");
            return;
        }

        self.stop_ticking();
        self.state_tx.send_replace(TimerState {
            phase: TimerPhase::Running,
            total_seconds: seconds,
            remaining_seconds: seconds,
        });
        self.spawn_tick();
        tracing::debug!("Rest timer started: {}s", seconds);
    }

    /// Running -> Paused; no-op in any other phase
    pub fn pause(&mut self) {
        if self.state().phase != TimerPhase::Running {
            return;
        }
        self.stop_ticking();
        self.state_tx.send_modify(|s| {
            if s.phase == TimerPhase::Running {
                s.phase = TimerPhase::Paused;
            }
        });
    }

    /// Paused -> Running; no-op in any other phase
    pub fn resume(&mut self) {
        if self.state().phase != TimerPhase::Paused {
            return;
        }
        self.state_tx.send_modify(|s| s.phase = TimerPhase::Running);
        self.spawn_tick();
    }

    /// Abandon the countdown without firing the chime
    pub fn skip(&mut self) {
        self.stop_ticking();
        self.state_tx.send_replace(TimerState::idle());
    }

    /// Same terminal transition as `skip`; reads better at session teardown
    pub fn cancel(&mut self) {
        self.skip();
    }

    /// Extend the countdown. Only meaningful once started; no upper bound.
    pub fn add_time(&mut self, seconds: u32) {
        self.state_tx.send_modify(|s| {
            if matches!(s.phase, TimerPhase::Running | TimerPhase::Paused) {
                s.remaining_seconds += seconds;
            }
        });
    }

    /// Shorten the countdown, floored at zero. Reaching zero this way completes
    /// the timer and fires the chime exactly like natural expiry.
    pub fn subtract_time(&mut self, seconds: u32) {
        let mut finished = false;
        self.state_tx.send_modify(|s| {
            if !matches!(s.phase, TimerPhase::Running | TimerPhase::Paused) {
                return;
            }
            s.remaining_seconds = s.remaining_seconds.saturating_sub(seconds);
            if s.remaining_seconds == 0 {
                s.phase = TimerPhase::Completed;
                finished = true;
            }
        });
        if finished {
            self.stop_ticking();
            self.chime.play();
        }
    }

    fn stop_ticking(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
    }

    fn spawn_tick(&mut self) {
        let state_tx = self.state_tx.clone();
        let chime = Arc::clone(&self.chime);
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let mut finished = false;
                state_tx.send_modify(|s| {
                    if s.phase == TimerPhase::Running && s.remaining_seconds > 0 {
                        s.remaining_seconds -= 1;
                        if s.remaining_seconds == 0 {
                            s.phase = TimerPhase::Completed;
                            finished = true;
                        }
                    }
                });
                if finished {
                    chime.play();
                    break;
                }
            }
        });
        self.tick_task = Some(task);
    }
}

impl Drop for RestTimer {
    fn drop(&mut self) {
        self.stop_ticking();
    }
}
