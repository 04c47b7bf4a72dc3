//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{error::StoreError, state::AppState};
use super::responses::{
    AckResponse, CompleteResponse, HealthResponse, PauseResponse, ResumeResponse,
    SaveProgressRequest, SessionResponse, StartSessionRequest, StartSessionResponse,
    StatusResponse,
};

/// Handle POST /sessions - Start a timer session
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<StartSessionResponse>), StoreError> {
    let response = state.start_session(request).map_err(|e| {
        warn!("Failed to start session: {}", e);
        e
    })?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handle POST /sessions/:id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PauseResponse>, StoreError> {
    state.pause_session(id).map(Json).map_err(|e| {
        warn!("Pause rejected: {}", e);
        e
    })
}

/// Handle POST /sessions/:id/resume
pub async fn resume_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeResponse>, StoreError> {
    state.resume_session(id).map(Json).map_err(|e| {
        warn!("Resume rejected: {}", e);
        e
    })
}

/// Handle POST /sessions/:id/progress - Best-effort progress save
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SaveProgressRequest>,
) -> Result<Json<AckResponse>, StoreError> {
    state.save_progress(id, request.elapsed_seconds)?;
    Ok(Json(AckResponse::ok()))
}

/// Handle POST /sessions/:id/complete
///
/// Repeated calls answer 409 `session_not_in_use`.
pub async fn complete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompleteResponse>, StoreError> {
    match state.complete_session(id) {
        Ok(response) => Ok(Json(response)),
        Err(e @ StoreError::NotInUse(_)) => {
            info!("Completion for inactive session {} (duplicate or already closed)", id);
            Err(e)
        }
        Err(e) => {
            error!("Failed to complete session {}: {}", id, e);
            Err(e)
        }
    }
}

/// Handle POST /sessions/:id/abandon
pub async fn abandon_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AckResponse>, StoreError> {
    state.abandon_session(id)?;
    Ok(Json(AckResponse::ok()))
}

/// Handle GET /sessions/:id - Session snapshot for remounting a timer
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, StoreError> {
    state.get_session(id).map(Json)
}

/// Handle GET /status - Return service counters
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StoreError> {
    let (active_sessions, total_sessions) = state.session_counts().map_err(|e| {
        error!("Failed to read session counts: {}", e);
        e
    })?;

    Ok(Json(StatusResponse {
        active_sessions,
        total_sessions,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
