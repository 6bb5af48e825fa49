//! Deterministic in-memory notifier for tests

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::notification::{NotificationOptions, NotificationService, Permission};

/// A notification captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub title: String,
    pub options: NotificationOptions,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    supported: bool,
    permission: Permission,
    sent: Vec<SentNotification>,
}

/// Records every dispatched notification instead of showing it
///
/// Permission requests auto-grant unless the notifier is unsupported or
/// permission was already denied.
#[derive(Debug)]
pub struct RecordingNotifier {
    inner: Mutex<Inner>,
}

impl RecordingNotifier {
    /// Supported, permission not yet requested
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                supported: true,
                permission: Permission::Default,
                sent: Vec::new(),
            }),
        }
    }

    /// Supported with permission already granted
    pub fn granted() -> Self {
        let notifier = Self::new();
        notifier.set_permission(Permission::Granted);
        notifier
    }

    pub fn set_supported(&self, supported: bool) {
        self.lock().supported = supported;
    }

    pub fn set_permission(&self, permission: Permission) {
        self.lock().permission = permission;
    }

    pub fn set_permission_granted(&self, granted: bool) {
        self.set_permission(if granted {
            Permission::Granted
        } else {
            Permission::Denied
        });
    }

    pub fn sent_notifications(&self) -> Vec<SentNotification> {
        self.lock().sent.clone()
    }

    pub fn clear_sent_notifications(&self) {
        self.lock().sent.clear();
    }

    pub fn last_notification(&self) -> Option<SentNotification> {
        self.lock().sent.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn request_permission(&self) -> bool {
        let mut inner = self.lock();
        if !inner.supported || inner.permission == Permission::Denied {
            return false;
        }
        inner.permission = Permission::Granted;
        true
    }

    fn send_notification(&self, title: &str, options: NotificationOptions) {
        let mut inner = self.lock();
        if inner.permission != Permission::Granted {
            warn!("Notification permission not granted");
            return;
        }
        inner.sent.push(SentNotification {
            title: title.to_string(),
            options,
            timestamp: Utc::now(),
        });
    }

    fn is_supported(&self) -> bool {
        self.lock().supported
    }

    fn get_permission(&self) -> Option<Permission> {
        let inner = self.lock();
        inner.supported.then_some(inner.permission)
    }
}
