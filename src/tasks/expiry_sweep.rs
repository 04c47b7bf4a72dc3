//! Expiry sweep background task

use std::{sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::{info, warn};

use crate::state::AppState;

/// Background task that completes sessions whose client never confirmed them
///
/// A client that was closed while its timer ran out will later see its own
/// completion request answered with `session_not_in_use`.
pub async fn expiry_sweep_task(state: Arc<AppState>, every: Duration) {
    info!("Starting expiry sweep task (every {:?}, grace {}s)", every, state.expiry_grace_seconds);

    let mut interval = interval(every);

    loop {
        interval.tick().await;

        match state.sweep_expired() {
            Ok(closed) if !closed.is_empty() => {
                info!("Expiry sweep completed {} session(s): {:?}", closed.len(), closed);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Expiry sweep failed: {}", e);
            }
        }
    }
}
