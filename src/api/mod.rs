//! HTTP API module
//!
//! Endpoints of the reference session service the countdown talks to.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sessions", post(start_handler))
        .route("/sessions/:id", get(session_handler))
        .route("/sessions/:id/pause", post(pause_handler))
        .route("/sessions/:id/resume", post(resume_handler))
        .route("/sessions/:id/progress", post(progress_handler))
        .route("/sessions/:id/complete", post(complete_handler))
        .route("/sessions/:id/abandon", post(abandon_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
