//! Platform service module
//!
//! This module contains the collaborators the timers talk to: flat storage,
//! completion notifications and completion sounds.

pub mod notification;
pub mod recording;
pub mod sound;
pub mod storage;

// Re-export main types
pub use notification::{
    notify_timer_complete, NotificationOptions, NotificationService, Permission, SystemNotifier,
};
pub use recording::{RecordingNotifier, SentNotification};
pub use sound::{play_completion_alert, AlertCall, AlertPlayer, CommandPlayer, RecordingPlayer};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
