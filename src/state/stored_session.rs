//! Server-side record of a timer session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::responses::SessionResponse,
    session::{SessionKind, TimerSession},
};

/// Lifecycle of a stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

/// A timer session as the service keeps it
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub id: Uuid,
    pub kind: SessionKind,
    pub context_id: String,
    /// Timestamps and pause totals; `recorded_elapsed_seconds` holds the last saved progress
    pub timer: TimerSession,
    pub status: SessionStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub fn new(kind: SessionKind, context_id: String, total_seconds: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            context_id,
            timer: TimerSession::new(total_seconds, started_at),
            status: SessionStatus::Active,
            completed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Mark the session completed at `now`
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Build the snapshot returned to clients
    pub fn to_response(&self, now: DateTime<Utc>) -> SessionResponse {
        let remaining_seconds = match self.status {
            SessionStatus::Active => self.timer.remaining_seconds(now),
            SessionStatus::Completed | SessionStatus::Abandoned => 0,
        };

        SessionResponse {
            session_id: self.id,
            kind: self.kind,
            context_id: self.context_id.clone(),
            status: self.status,
            timer: self.timer.clone(),
            remaining_seconds,
            completed_at: self.completed_at,
        }
    }
}
