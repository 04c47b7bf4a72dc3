//! EarnQuest Timer - drift-free countdown for screen-time rewards and timed tasks
//!
//! The countdown re-derives remaining time from server timestamps on every
//! tick, so it stays correct across suspension. Pause and resume are
//! server-authoritative and completion is confirmed exactly once. The crate
//! also ships the in-memory session service the countdown talks to.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;
pub mod state;
pub mod tasks;
pub mod timer;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use client::{CompletionAck, HttpSessionApi, LocalSessionApi, SessionApi};
pub use config::Config;
pub use error::{ApiError, StoreError, TimerError};
pub use session::{Clock, SessionKind, SystemClock, TimerSession};
pub use state::AppState;
pub use timer::{spawn_timer, TimerConfig, TimerDeps, TimerEvent, TimerHandle, TimerView};
pub use utils::signals::shutdown_signal;
