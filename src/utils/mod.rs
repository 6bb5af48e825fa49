//! Utility functions module
//!
//! This module contains utility functions used throughout the application.

pub mod format;
pub mod signals;

// Re-export main functions
pub use format::{format_duration, format_preset_time, format_time};
pub use signals::shutdown_signal;
