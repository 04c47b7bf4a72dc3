//! Auto-closing completion prompt
//!
//! Shown when a timed task reaches zero. It counts down on its own and
//! resolves either on the user's acknowledgement or when the countdown
//! runs out; both paths go through the timer's one-shot completion guard.

use std::{future::Future, time::Duration};
use tokio::{
    sync::watch,
    time::{interval, sleep_until, Instant, MissedTickBehavior},
};
use tracing::info;

use super::driver::TimerControl;

/// How the prompt closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Acknowledged,
    TimedOut,
}

#[derive(Debug)]
pub struct CompletionPrompt {
    auto_close: Duration,
    remaining_tx: watch::Sender<u64>,
}

impl CompletionPrompt {
    pub fn new(auto_close: Duration) -> Self {
        let (remaining_tx, _) = watch::channel(ceil_secs(auto_close));
        Self {
            auto_close,
            remaining_tx,
        }
    }

    /// Seconds left before the prompt closes itself
    pub fn remaining(&self) -> watch::Receiver<u64> {
        self.remaining_tx.subscribe()
    }

    /// Wait for `acknowledged` or the timeout, then confirm completion on `timer`
    pub async fn run<F>(&self, timer: &TimerControl, acknowledged: F) -> PromptOutcome
    where
        F: Future<Output = ()>,
    {
        let deadline = Instant::now() + self.auto_close;
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(acknowledged);

        let outcome = loop {
            tokio::select! {
                _ = &mut acknowledged => break PromptOutcome::Acknowledged,
                _ = sleep_until(deadline) => break PromptOutcome::TimedOut,
                _ = ticker.tick() => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    self.remaining_tx.send_replace(ceil_secs(left));
                }
            }
        };

        self.remaining_tx.send_replace(0);
        info!("Completion prompt closed: {:?}", outcome);
        timer.confirm_completion();
        outcome
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_seconds_round_up() {
        assert_eq!(ceil_secs(Duration::from_millis(0)), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_secs(10)), 10);
        assert_eq!(ceil_secs(Duration::from_millis(9_500)), 10);
    }

    #[test]
    fn starts_at_full_countdown() {
        let prompt = CompletionPrompt::new(Duration::from_secs(30));
        assert_eq!(*prompt.remaining().borrow(), 30);
    }
}
