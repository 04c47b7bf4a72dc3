//! Countdown state machine
//!
//! The engine holds no clock and does no I/O. Every query takes `now`, and
//! every transition that needs the server is split in two: `begin`/`claim_*`
//! before the request goes out, `apply_*` once the server answered.
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            v
//!        Completed
//! ```

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::TimerError, session::TimerSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Server-backed actions guarded against duplicate in-flight requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Complete,
}

impl fmt::Display for TimerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// What noticed that the countdown reached zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    /// First reconciliation after the timer was created
    Mount,
    Tick,
    /// The host became visible again after being backgrounded
    Visibility,
    /// Recheck before handling a user command
    Recheck,
    /// The user (or an auto-closing prompt) confirmed completion
    Confirmation,
}

impl CompletionTrigger {
    /// Explicit triggers may retry a completion request that failed
    pub fn is_explicit(self) -> bool {
        matches!(self, Self::Confirmation)
    }
}

/// Progress of the one-shot completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionState {
    /// Not requested yet
    Pending,
    InFlight,
    /// The request failed; only an explicit confirmation may retry
    Failed,
    Confirmed,
}

/// Countdown for one timer session
#[derive(Debug, Clone)]
pub struct TimerEngine {
    total_seconds: u64,
    session_id: Option<Uuid>,
    session: Option<TimerSession>,
    phase: TimerPhase,
    completion: CompletionState,
    start_in_flight: bool,
    pause_in_flight: bool,
    resume_in_flight: bool,
}

impl TimerEngine {
    /// A timer that has not been started on the server yet
    pub fn idle(total_seconds: u64) -> Self {
        Self {
            total_seconds,
            session_id: None,
            session: None,
            phase: TimerPhase::Idle,
            completion: CompletionState::Pending,
            start_in_flight: false,
            pause_in_flight: false,
            resume_in_flight: false,
        }
    }

    /// Pick up an existing server session, paused or running
    pub fn restore(session_id: Uuid, session: TimerSession) -> Self {
        let phase = if session.is_paused() {
            TimerPhase::Paused
        } else {
            TimerPhase::Running
        };
        Self {
            total_seconds: session.total_seconds,
            session_id: Some(session_id),
            session: Some(session),
            phase,
            ..Self::idle(0)
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn completion(&self) -> CompletionState {
        self.completion
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn session(&self) -> Option<&TimerSession> {
        self.session.as_ref()
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    pub fn is_in_flight(&self, action: TimerAction) -> bool {
        match action {
            TimerAction::Start => self.start_in_flight,
            TimerAction::Pause => self.pause_in_flight,
            TimerAction::Resume => self.resume_in_flight,
            TimerAction::Complete => self.completion == CompletionState::InFlight,
        }
    }

    /// Any server request outstanding
    pub fn is_busy(&self) -> bool {
        self.start_in_flight
            || self.pause_in_flight
            || self.resume_in_flight
            || self.completion == CompletionState::InFlight
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        match (self.phase, &self.session) {
            (TimerPhase::Completed, _) => self.total_seconds,
            (_, Some(session)) => session.elapsed_seconds(now),
            (_, None) => 0,
        }
    }

    /// Remaining time, re-derived from the session timestamps
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.total_seconds - self.elapsed_seconds(now).min(self.total_seconds)
    }

    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        match (self.phase, &self.session) {
            (TimerPhase::Completed, _) => 1.0,
            (_, Some(session)) => session.progress(now),
            (_, None) => 0.0,
        }
    }

    /// Running, out of time, and nobody has asked the server to complete yet
    pub fn needs_completion(&self, now: DateTime<Utc>) -> bool {
        self.phase == TimerPhase::Running
            && self.completion == CompletionState::Pending
            && self.remaining_seconds(now) == 0
    }

    // ── Server-backed transitions ────────────────────────────────────

    /// Mark a start/pause/resume request as in flight
    pub fn begin(&mut self, action: TimerAction) -> Result<(), TimerError> {
        if self.is_in_flight(action) {
            return Err(TimerError::InFlight(action));
        }

        let allowed = match action {
            TimerAction::Start => self.phase == TimerPhase::Idle,
            TimerAction::Pause => {
                self.phase == TimerPhase::Running && self.completion == CompletionState::Pending
            }
            TimerAction::Resume => self.phase == TimerPhase::Paused,
            TimerAction::Complete => false,
        };
        if !allowed {
            return Err(TimerError::InvalidTransition {
                action,
                phase: self.phase,
            });
        }

        self.set_in_flight(action, true);
        Ok(())
    }

    /// The request for `action` failed; state stays as it was
    pub fn abort(&mut self, action: TimerAction) {
        match action {
            TimerAction::Complete => {
                if self.completion == CompletionState::InFlight {
                    self.completion = CompletionState::Failed;
                }
            }
            other => self.set_in_flight(other, false),
        }
    }

    fn set_in_flight(&mut self, action: TimerAction, value: bool) {
        match action {
            TimerAction::Start => self.start_in_flight = value,
            TimerAction::Pause => self.pause_in_flight = value,
            TimerAction::Resume => self.resume_in_flight = value,
            TimerAction::Complete => {}
        }
    }

    /// Adopt the server's start answer
    pub fn apply_started(&mut self, session_id: Uuid, started_at: DateTime<Utc>, total_seconds: u64) -> bool {
        self.start_in_flight = false;
        if self.phase != TimerPhase::Idle {
            return false;
        }
        self.total_seconds = total_seconds;
        self.session_id = Some(session_id);
        self.session = Some(TimerSession::new(total_seconds, started_at));
        self.phase = TimerPhase::Running;
        true
    }

    /// Adopt the server's pause timestamp
    pub fn apply_paused(&mut self, paused_at: DateTime<Utc>) -> bool {
        self.pause_in_flight = false;
        match (&mut self.session, self.phase) {
            (Some(session), TimerPhase::Running) => {
                session.paused_at = Some(paused_at);
                self.phase = TimerPhase::Paused;
                true
            }
            _ => false,
        }
    }

    /// Adopt the server's cumulative pause total
    pub fn apply_resumed(&mut self, paused_seconds: u64) -> bool {
        self.resume_in_flight = false;
        match (&mut self.session, self.phase) {
            (Some(session), TimerPhase::Paused) => {
                session.paused_at = None;
                session.paused_seconds = paused_seconds;
                self.phase = TimerPhase::Running;
                true
            }
            _ => false,
        }
    }

    /// Take the one-shot completion guard
    ///
    /// Automatic triggers only succeed the first time; an explicit
    /// confirmation may also retry after a failed request.
    pub fn claim_completion(&mut self, trigger: CompletionTrigger, now: DateTime<Utc>) -> Result<(), TimerError> {
        if self.phase != TimerPhase::Running {
            return Err(TimerError::InvalidTransition {
                action: TimerAction::Complete,
                phase: self.phase,
            });
        }
        let remaining = self.remaining_seconds(now);
        if remaining > 0 {
            return Err(TimerError::NotExpired { remaining });
        }

        match self.completion {
            CompletionState::Pending => {}
            CompletionState::Failed if trigger.is_explicit() => {}
            CompletionState::InFlight => return Err(TimerError::InFlight(TimerAction::Complete)),
            CompletionState::Failed | CompletionState::Confirmed => return Err(TimerError::CompletionClaimed),
        }

        self.completion = CompletionState::InFlight;
        Ok(())
    }

    /// The server confirmed completion (or reported the session already closed)
    ///
    /// Returns true only for the call that performed the transition.
    pub fn apply_completed(&mut self) -> bool {
        if self.completion != CompletionState::InFlight {
            return false;
        }
        self.completion = CompletionState::Confirmed;
        self.phase = TimerPhase::Completed;
        true
    }
}
