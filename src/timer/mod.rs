//! Countdown timer
//!
//! `engine` is the pure state machine, `driver` runs it on a tokio task
//! with ticks, persistence and platform side effects, and `confirmation`
//! is the auto-closing prompt used by timed tasks.

pub mod confirmation;
pub mod driver;
pub mod engine;
pub mod view;

// Re-export main types
pub use confirmation::{CompletionPrompt, PromptOutcome};
pub use driver::{
    spawn_timer, CompletionMode, Notice, TimerCommand, TimerConfig, TimerControl, TimerDeps, TimerEvent,
    TimerHandle,
};
pub use engine::{CompletionState, CompletionTrigger, TimerAction, TimerEngine, TimerPhase};
pub use view::{format_clock, TimerView};
