//! Render-ready snapshot of a timer

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::engine::{CompletionState, TimerEngine, TimerPhase};

/// What a timer display shows at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub phase: TimerPhase,
    pub remaining_seconds: u64,
    pub total_seconds: u64,
    /// Completed fraction in `[0, 1]`
    pub progress: f64,
    pub completion: CompletionState,
    /// Zero was reached and the timer waits for the user to confirm
    pub awaiting_confirmation: bool,
    /// A start/pause/resume/complete request is outstanding
    pub busy: bool,
}

impl TimerView {
    pub fn from_engine(engine: &TimerEngine, now: DateTime<Utc>, awaiting_confirmation: bool) -> Self {
        Self {
            phase: engine.phase(),
            remaining_seconds: engine.remaining_seconds(now),
            total_seconds: engine.total_seconds(),
            progress: engine.progress(now),
            completion: engine.completion(),
            awaiting_confirmation,
            busy: engine.is_busy(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase == TimerPhase::Completed
    }

    /// Remaining time as `MM:SS`, or `H:MM:SS` from one hour up
    pub fn clock_label(&self) -> String {
        format_clock(self.remaining_seconds)
    }
}

pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
