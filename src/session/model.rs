//! Timer session projection and drift-free remaining-time math

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a timer session counts down for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// A timed household task
    Task,
    /// A redeemed screen-time reward
    Reward,
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Reward => write!(f, "reward"),
        }
    }
}

/// Longest session the service accepts (one day)
pub const MAX_DURATION_MINUTES: u64 = 24 * 60;

/// Client-visible projection of a server-persisted timer session
///
/// Remaining time is never stored: it is recomputed from the absolute
/// timestamps on every query so that a suspended process shows the right
/// value the moment it wakes up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    /// Configured duration of the session
    pub total_seconds: u64,
    /// Server timestamp at which the session began running
    pub started_at: DateTime<Utc>,
    /// Server timestamp of the current pause, if paused
    pub paused_at: Option<DateTime<Utc>>,
    /// Cumulative length of all finished pauses
    pub paused_seconds: u64,
    /// Progress the server already recorded; elapsed time never drops below it
    #[serde(default)]
    pub recorded_elapsed_seconds: u64,
}

impl TimerSession {
    /// Create a running session with no pauses
    pub fn new(total_seconds: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            total_seconds,
            started_at,
            paused_at: None,
            paused_seconds: 0,
            recorded_elapsed_seconds: 0,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Seconds of active (unpaused) time consumed as of `now`, capped at the total
    ///
    /// While paused the reference point is `paused_at`, which freezes the value.
    /// A clock reading earlier than `started_at` counts as no time elapsed.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        let reference = self.paused_at.unwrap_or(now);
        let wall = (reference - self.started_at).num_seconds().max(0) as u64;

        wall.saturating_sub(self.paused_seconds)
            .max(self.recorded_elapsed_seconds)
            .min(self.total_seconds)
    }

    /// `max(0, total - (now - started_at - paused_seconds))`
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.total_seconds - self.elapsed_seconds(now)
    }

    /// Completed fraction in `[0, 1]`
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.total_seconds == 0 {
            return 1.0;
        }
        let elapsed = self.elapsed_seconds(now) as f64;
        (elapsed / self.total_seconds as f64).clamp(0.0, 1.0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_seconds(now) == 0
    }
}
