//! State management module
//!
//! This module contains the timers, their registry, the completion history,
//! user settings and the application context that wires them together.

pub mod app_state;
pub mod history;
pub mod registry;
pub mod settings;
pub mod timer_state;

// Re-export main types
pub use app_state::AppContext;
pub use history::{HistoryStatistics, HistoryStore, NewHistoryEntry, TimerHistoryEntry};
pub use registry::{TimerEvent, TimerRegistry};
pub use settings::{SettingsStore, TimerSettings};
pub use timer_state::{Timer, TimerMode, TimerSnapshot, TimerState};
