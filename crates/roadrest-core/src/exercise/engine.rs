//! Exercise session state machine.
//!
//! Operates on wall-clock deltas -- no internal thread. The orchestrator
//! drives it behind a lock; active time accumulates across pause/resume
//! so the completion percentage reflects time actually exercised.
//!
//! ## State transitions
//!
//! ```text
//! Idle -> Recommending -> InProgress <-> Paused -> Completed -> Idle
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{Exercise, ExerciseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recommending,
    InProgress,
    Paused,
    Completed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recommending => "recommending",
            Self::InProgress => "in progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[derive(Debug, Clone)]
pub struct SessionEngine {
    phase: SessionPhase,
    current: Option<Exercise>,
    started_at: Option<DateTime<Utc>>,
    /// Milliseconds spent in `InProgress`, excluding paused spans.
    active_ms: u64,
    /// Timestamp of the last transition into `InProgress`.
    resumed_at_ms: Option<u64>,
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEngine {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            current: None,
            started_at: None,
            active_ms: 0,
            resumed_at_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current(&self) -> Option<&Exercise> {
        self.current.as_ref()
    }

    /// A session is active in `InProgress` or `Paused`.
    pub fn session_active(&self) -> bool {
        matches!(self.phase, SessionPhase::InProgress | SessionPhase::Paused)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Enter `Recommending`. Returns `false` (and changes nothing) when
    /// a session is active.
    pub fn mark_recommending(&mut self) -> bool {
        if self.session_active() {
            return false;
        }
        self.phase = SessionPhase::Recommending;
        true
    }

    /// Leave `Recommending` for `Idle` (upcoming break went away).
    pub fn mark_idle(&mut self) -> bool {
        if self.phase == SessionPhase::Recommending {
            self.phase = SessionPhase::Idle;
            return true;
        }
        false
    }

    /// Begin a session.
    ///
    /// # Errors
    /// [`CoreError::InvalidTransition`] while a session is active; the
    /// running session (current exercise, start time) is left untouched.
    pub fn start(&mut self, exercise: Exercise) -> Result<(), CoreError> {
        if self.session_active() {
            return Err(CoreError::InvalidTransition {
                op: "start exercise",
                state: self.phase.to_string(),
            });
        }
        self.current = Some(exercise);
        self.started_at = Some(Utc::now());
        self.active_ms = 0;
        self.resumed_at_ms = Some(now_ms());
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Pause. No-op unless `InProgress`.
    pub fn pause(&mut self) -> bool {
        if self.phase != SessionPhase::InProgress {
            return false;
        }
        self.flush_active();
        self.phase = SessionPhase::Paused;
        true
    }

    /// Resume. No-op unless `Paused`.
    pub fn resume(&mut self) -> bool {
        if self.phase != SessionPhase::Paused {
            return false;
        }
        self.resumed_at_ms = Some(now_ms());
        self.phase = SessionPhase::InProgress;
        true
    }

    /// End the session and produce its result.
    ///
    /// # Errors
    /// [`CoreError::InvalidTransition`] unless `InProgress` or `Paused`.
    pub fn stop(&mut self) -> Result<ExerciseResult, CoreError> {
        if !self.session_active() {
            return Err(CoreError::InvalidTransition {
                op: "stop exercise",
                state: self.phase.to_string(),
            });
        }
        self.flush_active();
        let Some(exercise) = self.current.take() else {
            // session_active guarantees a current exercise
            return Err(CoreError::InvalidTransition {
                op: "stop exercise",
                state: self.phase.to_string(),
            });
        };
        let ended_at = Utc::now();
        let started_at = self.started_at.take().unwrap_or(ended_at);
        let nominal_ms = exercise.duration_secs.max(0) as u64 * 1000;
        let completion_pct = if nominal_ms == 0 {
            100.0
        } else {
            (self.active_ms as f64 / nominal_ms as f64 * 100.0).clamp(0.0, 100.0)
        };
        let result = ExerciseResult {
            id: Uuid::new_v4().to_string(),
            exercise_id: exercise.id,
            started_at,
            ended_at,
            duration_secs: (self.active_ms / 1000) as i64,
            completion_pct,
            feedback: None,
        };
        self.active_ms = 0;
        self.resumed_at_ms = None;
        self.phase = SessionPhase::Completed;
        Ok(result)
    }

    /// Settle `Completed` back to `Idle` once the result is recorded.
    pub fn finish(&mut self) {
        if self.phase == SessionPhase::Completed {
            self.phase = SessionPhase::Idle;
        }
    }

    fn flush_active(&mut self) {
        if let Some(resumed) = self.resumed_at_ms.take() {
            self.active_ms += now_ms().saturating_sub(resumed);
        }
    }
}
