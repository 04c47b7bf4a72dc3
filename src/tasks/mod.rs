//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod expiry_sweep;

// Re-export main functions
pub use expiry_sweep::expiry_sweep_task;
