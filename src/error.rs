//! Error types
//!
//! Errors are grouped by who sees them: the session service (`StoreError`),
//! callers of the session endpoints (`ApiError`), the countdown state machine
//! (`TimerError`) and the best-effort platform capabilities.

use std::{io, path::PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::timer::{TimerAction, TimerPhase};

/// Error code the service answers with when a session is no longer active
pub const NOT_IN_USE_CODE: &str = "session_not_in_use";

/// Errors raised by the in-memory session store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    /// The session was already completed, abandoned or has run out
    #[error("session {0} is not in use")]
    NotInUse(Uuid),

    #[error("session {0} is already paused")]
    AlreadyPaused(Uuid),

    #[error("session {0} is not paused")]
    NotPaused(Uuid),

    #[error("invalid session duration: {0} minutes")]
    InvalidDuration(u64),

    #[error("session store unavailable: {0}")]
    Poisoned(String),
}

impl StoreError {
    /// Machine-readable code sent in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "session_not_found",
            Self::NotInUse(_) => NOT_IN_USE_CODE,
            Self::AlreadyPaused(_) => "already_paused",
            Self::NotPaused(_) => "not_paused",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::Poisoned(_) => "internal",
        }
    }
}

/// Errors returned by a [`SessionApi`](crate::client::SessionApi) call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The session is no longer active on the server
    #[error("session not in use: {0}")]
    NotInUse(String),

    #[error("server answered {status} ({code}): {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },

    #[error("session store error: {0}")]
    Store(StoreError),
}

impl ApiError {
    pub fn is_not_in_use(&self) -> bool {
        matches!(self, Self::NotInUse(_))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotInUse(_) => Self::NotInUse(err.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Guard violations of the countdown state machine
///
/// These are expected during races (two triggers at once, a double click) and
/// are logged rather than shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("{0} request already in flight")]
    InFlight(TimerAction),

    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: TimerAction,
        phase: TimerPhase,
    },

    #[error("completion already claimed")]
    CompletionClaimed,

    #[error("{remaining}s still remaining")]
    NotExpired { remaining: u64 },
}

/// Wake lock acquisition failures (never fatal)
#[derive(Debug, Error)]
pub enum WakeLockError {
    #[error("failed to spawn inhibitor: {0}")]
    Spawn(#[from] io::Error),
}

/// Completion sound failures (never fatal)
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("sound sample unavailable: {}", .0.display())]
    SampleUnavailable(PathBuf),

    #[error("audio playback failed: {0}")]
    Playback(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_in_use_store_error_maps_to_benign_api_error() {
        let id = Uuid::new_v4();
        let err: ApiError = StoreError::NotInUse(id).into();
        assert!(err.is_not_in_use());

        let err: ApiError = StoreError::NotFound(id).into();
        assert!(!err.is_not_in_use());
    }

    #[test]
    fn codes_are_stable() {
        let id = Uuid::new_v4();
        assert_eq!(StoreError::NotInUse(id).code(), NOT_IN_USE_CODE);
        assert_eq!(StoreError::NotFound(id).code(), "session_not_found");
        assert_eq!(StoreError::InvalidDuration(0).code(), "invalid_duration");
    }
}
