//! Session endpoint clients
//!
//! [`SessionApi`] is the request/response contract the countdown depends on.
//! `HttpSessionApi` speaks JSON over HTTP; `LocalSessionApi` calls an
//! in-process [`AppState`](crate::state::AppState) directly.

pub mod http;
pub mod local;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::responses::{
        CompleteResponse, PauseResponse, ResumeResponse, SessionResponse, StartSessionRequest,
        StartSessionResponse,
    },
    error::ApiError,
};

pub use http::HttpSessionApi;
pub use local::LocalSessionApi;

/// Result of a completion request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAck {
    /// This request completed the session
    Completed,
    /// The session had already been closed (duplicate tab, retry, server sweep)
    AlreadyInactive,
}

/// Server actions used by the countdown
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn start_session(&self, request: &StartSessionRequest) -> Result<StartSessionResponse, ApiError>;

    /// Returns the server's pause timestamp
    async fn pause_session(&self, id: Uuid) -> Result<PauseResponse, ApiError>;

    /// Returns the cumulative pause total
    async fn resume_session(&self, id: Uuid) -> Result<ResumeResponse, ApiError>;

    async fn save_progress(&self, id: Uuid, elapsed_seconds: u64) -> Result<(), ApiError>;

    /// Confirm completion; an already-inactive session is `Ok(AlreadyInactive)`
    async fn complete_session(&self, id: Uuid) -> Result<CompletionAck, ApiError>;

    async fn abandon_session(&self, id: Uuid) -> Result<(), ApiError>;

    async fn fetch_session(&self, id: Uuid) -> Result<SessionResponse, ApiError>;
}

/// Fold the "not in use" answer of a completion request into success
pub(crate) fn completion_ack(result: Result<CompleteResponse, ApiError>) -> Result<CompletionAck, ApiError> {
    match result {
        Ok(_) => Ok(CompletionAck::Completed),
        Err(e) if e.is_not_in_use() => Ok(CompletionAck::AlreadyInactive),
        Err(e) => Err(e),
    }
}
