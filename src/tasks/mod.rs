//! Background tasks module
//!
//! This module contains the tick task that drives each running timer.

pub mod tick;

// Re-export main types
pub use tick::TickHandle;
