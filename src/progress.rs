//! Progress indicator for long-running remote operations.
//!
//! ```text
//! start() ──► Processing ──(+5 s)──► Planning ──(+10 s)──► Generating
//!                 │                      │                     │
//!                 └──────────── complete() ────────────────────┘
//!                                   │
//!                               Completed ──(+2 s)──► removed
//! ```
//!
//! Planning and Generating are elapsed-time approximations scheduled from the
//! action start. The protocol has no mid-flight milestones, so they say
//! nothing about what the backend is actually doing.
//!
//! At most one indicator is live. Each [`ProgressReporter::start`] bumps a
//! generation counter; timers belonging to an older generation are no-ops.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, trace};

use crate::config::Timings;
use crate::feedback::{Feedback, UiEvent};

// ============================================================================
// ProgressState
// ============================================================================

/// Indicator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressState {
    /// Action sent, waiting.
    Processing,
    /// Shown after the planning offset.
    Planning,
    /// Shown after the generating offset.
    Generating,
    /// Terminal outcome handled.
    Completed,
}

impl ProgressState {
    /// Returns the label shown next to the indicator.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Processing => "Processing your request...",
            Self::Planning => "Planning the design...",
            Self::Generating => "Generating CAD model...",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Indicator
// ============================================================================

/// The live indicator.
struct Indicator {
    /// Generation this indicator belongs to.
    generation: u64,
    /// Current state.
    state: ProgressState,
    /// Action start.
    started: Instant,
    /// Phase timer task.
    phases: Option<JoinHandle<()>>,
    /// Removal timer task.
    removal: Option<JoinHandle<()>>,
}

impl Indicator {
    /// Aborts both timers.
    fn abort_timers(&mut self) {
        if let Some(task) = self.phases.take() {
            task.abort();
        }
        if let Some(task) = self.removal.take() {
            task.abort();
        }
    }
}

#[derive(Default)]
struct ReporterState {
    /// Last issued generation.
    generation: u64,
    /// Live indicator, if any.
    live: Option<Indicator>,
}

struct ReporterInner {
    state: Mutex<ReporterState>,
    feedback: Feedback,
    timings: Timings,
}

// ============================================================================
// ProgressReporter
// ============================================================================

/// Drives the single progress indicator.
///
/// Cheap to clone; clones share the indicator. Must be used inside a tokio
/// runtime because phase and removal timers are spawned tasks.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<ReporterInner>,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    /// Creates a reporter with no live indicator.
    #[must_use]
    pub fn new(feedback: Feedback, timings: Timings) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                state: Mutex::new(ReporterState::default()),
                feedback,
                timings,
            }),
        }
    }

    /// Returns the live indicator's state.
    #[must_use]
    pub fn state(&self) -> Option<ProgressState> {
        self.inner.state.lock().live.as_ref().map(|i| i.state)
    }

    /// Returns `true` while an indicator is shown.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state().is_some()
    }

    /// Shows a fresh indicator in `Processing` and schedules the phase timers.
    ///
    /// A previous indicator, if still shown, is removed first.
    pub fn start(&self) {
        let started = Instant::now();

        let generation = {
            let mut state = self.inner.state.lock();
            if let Some(mut previous) = state.live.take() {
                previous.abort_timers();
                self.inner.feedback.emit(UiEvent::ProgressRemoved);
            }

            state.generation += 1;
            let generation = state.generation;
            state.live = Some(Indicator {
                generation,
                state: ProgressState::Processing,
                started,
                phases: None,
                removal: None,
            });
            generation
        };

        self.inner.feedback.emit(UiEvent::Progress {
            state: ProgressState::Processing,
            elapsed: Duration::ZERO,
        });
        debug!(generation, "Progress started");

        let this = self.clone();
        let task = tokio::spawn(async move {
            let timings = this.inner.timings;
            sleep_until(started + timings.planning_after).await;
            this.advance(generation, ProgressState::Planning);
            sleep_until(started + timings.generating_after).await;
            this.advance(generation, ProgressState::Generating);
        });

        let mut state = self.inner.state.lock();
        match state.live.as_mut() {
            Some(live) if live.generation == generation => live.phases = Some(task),
            _ => task.abort(),
        }
    }

    /// Moves the live indicator to `Completed` and schedules its removal.
    ///
    /// Returns `false` if no indicator is live or it already completed.
    pub fn complete(&self) -> bool {
        let (generation, elapsed) = {
            let mut state = self.inner.state.lock();
            let Some(live) = state.live.as_mut() else {
                return false;
            };
            if live.state == ProgressState::Completed {
                return false;
            }
            if let Some(task) = live.phases.take() {
                task.abort();
            }
            live.state = ProgressState::Completed;
            (live.generation, live.started.elapsed())
        };

        self.inner.feedback.emit(UiEvent::Progress {
            state: ProgressState::Completed,
            elapsed,
        });
        debug!(generation, elapsed_ms = elapsed.as_millis() as u64, "Progress completed");

        let this = self.clone();
        let grace = self.inner.timings.completed_grace;
        let task = tokio::spawn(async move {
            sleep(grace).await;
            this.remove(generation);
        });

        let mut state = self.inner.state.lock();
        match state.live.as_mut() {
            Some(live) if live.generation == generation => live.removal = Some(task),
            _ => task.abort(),
        }
        true
    }

    /// Applies a timed phase if `generation` is still the live one.
    fn advance(&self, generation: u64, next: ProgressState) {
        let elapsed = {
            let mut state = self.inner.state.lock();
            let Some(live) = state.live.as_mut() else {
                return;
            };
            if live.generation != generation || live.state >= next {
                return;
            }
            live.state = next;
            live.started.elapsed()
        };

        trace!(generation, state = ?next, "Progress advanced");
        self.inner.feedback.emit(UiEvent::Progress {
            state: next,
            elapsed,
        });
    }

    /// Removes the indicator if `generation` is still the live one.
    fn remove(&self, generation: u64) {
        let removed = {
            let mut state = self.inner.state.lock();
            match state.live.as_ref() {
                Some(live) if live.generation == generation => state.live.take().is_some(),
                _ => false,
            }
        };

        if removed {
            trace!(generation, "Progress removed");
            self.inner.feedback.emit(UiEvent::ProgressRemoved);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
