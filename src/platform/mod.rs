//! Platform capabilities
//!
//! Wake lock and audio are injected into the timer so it runs the same with
//! real hardware, without it, and under test.

pub mod sound;
pub mod wake_lock;

// Re-export main types
pub use sound::{AudioSink, CompletionChime, SilentSink, TerminalSink, Tone, FALLBACK_CHIME};
pub use wake_lock::{SystemdInhibitor, WakeLock, WakeLockCapability, WakeLockProvider, WakeLockSentinel};
