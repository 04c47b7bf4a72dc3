//! State management module
//!
//! In-memory session store of the reference session service.

pub mod app_state;
pub mod stored_session;

// Re-export main types
pub use app_state::AppState;
pub use stored_session::{SessionStatus, StoredSession};
