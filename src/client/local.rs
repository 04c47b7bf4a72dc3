//! In-process session client

use std::sync::Arc;
use async_trait::async_trait;
use uuid::Uuid;

use super::{completion_ack, CompletionAck, SessionApi};
use crate::{
    api::responses::{
        PauseResponse, ResumeResponse, SessionResponse, StartSessionRequest, StartSessionResponse,
    },
    error::ApiError,
    state::AppState,
};

/// Talks to an [`AppState`] living in the same process
#[derive(Debug, Clone)]
pub struct LocalSessionApi {
    state: Arc<AppState>,
}

impl LocalSessionApi {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl SessionApi for LocalSessionApi {
    async fn start_session(&self, request: &StartSessionRequest) -> Result<StartSessionResponse, ApiError> {
        Ok(self.state.start_session(request.clone())?)
    }

    async fn pause_session(&self, id: Uuid) -> Result<PauseResponse, ApiError> {
        Ok(self.state.pause_session(id)?)
    }

    async fn resume_session(&self, id: Uuid) -> Result<ResumeResponse, ApiError> {
        Ok(self.state.resume_session(id)?)
    }

    async fn save_progress(&self, id: Uuid, elapsed_seconds: u64) -> Result<(), ApiError> {
        Ok(self.state.save_progress(id, elapsed_seconds)?)
    }

    async fn complete_session(&self, id: Uuid) -> Result<CompletionAck, ApiError> {
        completion_ack(self.state.complete_session(id).map_err(ApiError::from))
    }

    async fn abandon_session(&self, id: Uuid) -> Result<(), ApiError> {
        Ok(self.state.abandon_session(id)?)
    }

    async fn fetch_session(&self, id: Uuid) -> Result<SessionResponse, ApiError> {
        Ok(self.state.get_session(id)?)
    }
}
