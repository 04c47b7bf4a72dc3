//! Session data model
//!
//! The timestamp-based projection of a timer session shared by the
//! countdown driver and the reference session service.

pub mod clock;
pub mod model;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{SessionKind, TimerSession, MAX_DURATION_MINUTES};
