//! Signal handling for graceful shutdown and job-control resume

use futures::stream::StreamExt;
use signal_hook_tokio::Signals;
use tracing::{info, warn};

/// Wait for shutdown signals (SIGTERM, SIGINT)
pub async fn shutdown_signal() {
    let mut signals = match Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
    ]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Failed to register signal handler, falling back to ctrl-c: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
            }
            return;
        }
    };

    if let Some(signal) = signals.next().await {
        info!("Received signal: {}", signal);
    }
}

/// Stream that yields whenever the process is continued after being stopped
///
/// A stopped terminal job is the CLI's equivalent of a backgrounded tab:
/// on SIGCONT the timer rechecks its remaining time.
pub fn foreground_signals() -> std::io::Result<Signals> {
    Signals::new([signal_hook::consts::SIGCONT])
}
