//! Session service state management

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};
use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{SessionStatus, StoredSession};
use crate::{
    api::responses::{
        CompleteResponse, PauseResponse, ResumeResponse, SessionResponse, StartSessionRequest,
        StartSessionResponse,
    },
    error::StoreError,
    session::{Clock, SystemClock, MAX_DURATION_MINUTES},
};

/// Shared state of the session service
///
/// All timestamps handed to clients are taken from `clock` here, never from
/// the client, so pause and resume stay consistent across devices.
#[derive(Debug)]
pub struct AppState {
    /// Sessions by id
    pub sessions: Arc<Mutex<HashMap<Uuid, StoredSession>>>,
    pub clock: Arc<dyn Clock>,
    /// How long an expired session may wait for its client before the sweep closes it
    pub expiry_grace_seconds: u64,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    /// Create a new AppState on the system clock
    pub fn new(port: u16, host: String, expiry_grace_seconds: u64) -> Self {
        Self::with_clock(port, host, expiry_grace_seconds, Arc::new(SystemClock))
    }

    /// Create a new AppState reading time from `clock`
    pub fn with_clock(port: u16, host: String, expiry_grace_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            clock,
            expiry_grace_seconds,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<Uuid, StoredSession>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("Failed to lock sessions: {}", e)))
    }

    /// Run `f` against an active session
    fn with_active<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut StoredSession) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut sessions = self.lock_sessions()?;
        let session = sessions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !session.is_active() {
            return Err(StoreError::NotInUse(id));
        }
        f(session)
    }

    /// Start a new session stamped with the server's clock
    pub fn start_session(&self, request: StartSessionRequest) -> Result<StartSessionResponse, StoreError> {
        let total_seconds = match request.duration_minutes {
            minutes @ 1..=MAX_DURATION_MINUTES => minutes * 60,
            minutes => return Err(StoreError::InvalidDuration(minutes)),
        };

        let now = self.clock.now();
        let session = StoredSession::new(request.kind, request.context_id, total_seconds, now);
        let response = StartSessionResponse {
            session_id: session.id,
            started_at: now,
            total_seconds,
        };

        info!(
            "Started {} session {} for {} ({}s)",
            session.kind, session.id, session.context_id, total_seconds
        );
        self.lock_sessions()?.insert(session.id, session);
        Ok(response)
    }

    /// Pause a running session and return the authoritative pause timestamp
    pub fn pause_session(&self, id: Uuid) -> Result<PauseResponse, StoreError> {
        let now = self.clock.now();
        self.with_active(id, |session| {
            if session.timer.is_paused() {
                return Err(StoreError::AlreadyPaused(id));
            }
            if session.timer.is_expired(now) {
                return Err(StoreError::NotInUse(id));
            }
            session.timer.paused_at = Some(now);
            info!("Paused session {} with {}s remaining", id, session.timer.remaining_seconds(now));
            Ok(PauseResponse { paused_at: now })
        })
    }

    /// Resume a paused session and return the cumulative pause total
    pub fn resume_session(&self, id: Uuid) -> Result<ResumeResponse, StoreError> {
        let now = self.clock.now();
        self.with_active(id, |session| {
            let paused_at = session.timer.paused_at.ok_or(StoreError::NotPaused(id))?;
            let pause = (now - paused_at).num_seconds().max(0) as u64;
            session.timer.paused_seconds += pause;
            session.timer.paused_at = None;
            info!("Resumed session {} after {}s pause", id, pause);
            Ok(ResumeResponse {
                paused_seconds: session.timer.paused_seconds,
            })
        })
    }

    /// Record progress reported by a client (last write wins)
    pub fn save_progress(&self, id: Uuid, elapsed_seconds: u64) -> Result<(), StoreError> {
        self.with_active(id, |session| {
            session.timer.recorded_elapsed_seconds = elapsed_seconds.min(session.timer.total_seconds);
            debug!("Saved progress for session {}: {}s", id, elapsed_seconds);
            Ok(())
        })
    }

    /// Complete an active session
    ///
    /// A second call answers `NotInUse`; clients treat that as success.
    pub fn complete_session(&self, id: Uuid) -> Result<CompleteResponse, StoreError> {
        let now = self.clock.now();
        self.with_active(id, |session| {
            session.complete(now);
            info!("Completed session {}", id);
            Ok(CompleteResponse {
                status: session.status,
                completed_at: now,
            })
        })
    }

    /// Abandon an active session without completing it
    pub fn abandon_session(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_active(id, |session| {
            session.status = SessionStatus::Abandoned;
            info!("Abandoned session {}", id);
            Ok(())
        })
    }

    /// Get a snapshot of any session, active or not
    pub fn get_session(&self, id: Uuid) -> Result<SessionResponse, StoreError> {
        let now = self.clock.now();
        let sessions = self.lock_sessions()?;
        sessions
            .get(&id)
            .map(|session| session.to_response(now))
            .ok_or(StoreError::NotFound(id))
    }

    /// Complete running sessions that ran out more than the grace period ago
    ///
    /// Returns the ids closed by this sweep.
    pub fn sweep_expired(&self) -> Result<Vec<Uuid>, StoreError> {
        let now = self.clock.now();
        let cutoff = now - Duration::seconds(self.expiry_grace_seconds as i64);
        let mut sessions = self.lock_sessions()?;

        let mut closed = Vec::new();
        for session in sessions.values_mut() {
            if session.is_active() && !session.timer.is_paused() && session.timer.is_expired(cutoff) {
                session.complete(now);
                closed.push(session.id);
            }
        }
        Ok(closed)
    }

    /// Count (active, total) sessions
    pub fn session_counts(&self) -> Result<(usize, usize), StoreError> {
        let sessions = self.lock_sessions()?;
        let active = sessions.values().filter(|s| s.is_active()).count();
        Ok((active, sessions.len()))
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
