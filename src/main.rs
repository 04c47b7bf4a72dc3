//! EarnQuest Timer - session service and terminal countdown
//!
//! `serve` runs the in-memory session service; `run` starts a session on a
//! service and counts it down in the terminal.

use std::{sync::Arc, time::Duration};
use futures::stream::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    sync::{broadcast::error::RecvError, Notify},
};
use tracing::{debug, info, warn};

use earnquest_timer::{
    api::{create_router, responses::StartSessionRequest},
    client::HttpSessionApi,
    config::{Command, Config, RunArgs, ServeArgs},
    platform::{CompletionChime, TerminalSink, WakeLockCapability},
    session::SystemClock,
    state::AppState,
    tasks::expiry_sweep_task,
    timer::{spawn_timer, CompletionPrompt, TimerConfig, TimerDeps, TimerEvent},
    utils::{foreground_signals, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("earnquest_timer={},tower_http=info", config.log_level()))
        .init();

    match config.command {
        Command::Serve(args) => serve(args).await,
        Command::Run(args) => run(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting earnquest-timer session service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, sweep={}s, grace={}s",
        args.host, args.port, args.sweep_interval, args.grace
    );

    let state = Arc::new(AppState::new(args.port, args.host.clone(), args.grace));

    // Start the expiry sweep background task
    let sweep_state = Arc::clone(&state);
    let sweep_every = Duration::from_secs(args.sweep_interval.max(1));
    tokio::spawn(async move {
        expiry_sweep_task(sweep_state, sweep_every).await;
    });

    let app = create_router(state);

    let addr = args.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /sessions              - Start a session");
    info!("  GET  /sessions/:id          - Session snapshot");
    info!("  POST /sessions/:id/pause    - Pause (returns pausedAt)");
    info!("  POST /sessions/:id/resume   - Resume (returns pausedSeconds)");
    info!("  POST /sessions/:id/progress - Save elapsed seconds");
    info!("  POST /sessions/:id/complete - Complete (409 when not in use)");
    info!("  POST /sessions/:id/abandon  - Abandon");
    info!("  GET  /status                - Service counters");
    info!("  GET  /health                - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let api = Arc::new(HttpSessionApi::new(args.server.clone())?);
    let wake_lock = WakeLockCapability::detect().await;
    let chime = CompletionChime::new(Box::new(TerminalSink::default()), args.sound.clone());

    let config = TimerConfig::new(args.total_seconds())
        .with_save_interval(args.save_interval())
        .with_mode(args.completion_mode());
    let deps = TimerDeps::new(api, Arc::new(SystemClock))
        .with_wake_lock(wake_lock)
        .with_chime(chime);
    let (timer, mut events) = spawn_timer(config, deps);

    timer.start(StartSessionRequest {
        kind: args.kind.into(),
        context_id: args.context_id.clone(),
        duration_minutes: args.minutes,
    });

    let mut views = timer.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut foreground = foreground_signals()?;
    let acknowledge = Arc::new(Notify::new());
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("Controls: p = pause, r = resume, c = confirm, q = quit");
    let mut last_label = String::new();

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                let label = format!("{} {} ({:.0}%)", view.phase, view.clock_label(), view.progress * 100.0);
                if label != last_label {
                    info!("{}", label);
                    last_label = label;
                }
            }
            event = events.recv() => match event {
                Ok(TimerEvent::Completed { ack }) => {
                    info!("Time is up! Session closed ({:?})", ack);
                    break;
                }
                Ok(TimerEvent::ConfirmationRequested { auto_close }) => {
                    info!("Time is up! Press c to confirm (closes in {}s)", auto_close.as_secs());
                    let control = timer.control();
                    let acknowledge = Arc::clone(&acknowledge);
                    tokio::spawn(async move {
                        let prompt = CompletionPrompt::new(auto_close);
                        let outcome = prompt.run(&control, acknowledge.notified()).await;
                        debug!("Prompt outcome: {:?}", outcome);
                    });
                }
                Ok(TimerEvent::Notice(notice)) => warn!("{}", notice.message),
                Ok(other) => debug!("Timer event: {:?}", other),
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} timer events", skipped),
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "p" => { timer.pause(); }
                    "r" => { timer.resume(); }
                    "c" => {
                        if timer.view().awaiting_confirmation {
                            acknowledge.notify_one();
                        } else {
                            timer.confirm_completion();
                        }
                    }
                    "q" => break,
                    other => debug!("Unknown input: {:?}", other),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    stdin_open = false;
                }
            },
            Some(_) = foreground.next() => {
                info!("Back in the foreground, rechecking timer");
                timer.visibility_changed(true);
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    timer.teardown().await;
    info!("Timer stopped");
    Ok(())
}
