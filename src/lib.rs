//! Multi Timer - independent countdown/count-up timers with completion alerts
//!
//! This library provides a registry of concurrently running timers, a
//! pluggable completion notifier, a history of completed runs and the flat
//! key-value persistence they share.

pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AlertError, StorageError};
pub use services::{NotificationService, RecordingNotifier};
pub use state::{AppContext, TimerMode, TimerRegistry};
pub use utils::signals::shutdown_signal;
