//! Completion notifier capability and its desktop implementation

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::state::SettingsStore;

/// Title of every timer completion notification
pub const COMPLETION_TITLE: &str = "タイマー終了！";
/// Body used when the caller provides no message
pub const DEFAULT_COMPLETION_BODY: &str = "設定した時間が経過しました。";
pub const DEFAULT_ICON: &str = "/timer/icon-192x192.png";
pub const COMPLETION_TAG: &str = "timer-complete";
/// Notifications dismiss themselves after this long
pub const AUTO_DISMISS_MS: u64 = 10_000;

const APP_NAME: &str = "multi-timer";
const NOTIFICATION_VIBRATION: [u64; 3] = [200, 100, 200];

/// User permission for delivering notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not yet asked
    Default,
}

/// Presentation details for a notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    /// Keep the notification around until dismissed or expired; defaults to on
    pub require_interaction: Option<bool>,
    pub vibrate: Option<Vec<u64>>,
}

/// Delivers user-visible completion signals
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Ask for permission. Never prompts again once denied.
    async fn request_permission(&self) -> bool;

    /// Dispatch a notification; a no-op when permission is missing
    fn send_notification(&self, title: &str, options: NotificationOptions);

    fn is_permission_granted(&self) -> bool {
        self.get_permission() == Some(Permission::Granted)
    }

    /// Whether the platform offers notifications at all
    fn is_supported(&self) -> bool;

    /// Current permission, `None` when unsupported
    fn get_permission(&self) -> Option<Permission>;
}

/// Send the standard timer completion notification
pub fn notify_timer_complete(notifier: &dyn NotificationService, message: Option<&str>) {
    notifier.send_notification(
        COMPLETION_TITLE,
        NotificationOptions {
            body: Some(message.unwrap_or(DEFAULT_COMPLETION_BODY).to_string()),
            icon: Some(DEFAULT_ICON.to_string()),
            ..NotificationOptions::default()
        },
    );
}

/// Desktop notifications through a `notify-send` compatible command
///
/// Desktop sessions have no permission prompt of their own, so a pending
/// request is granted once support has been detected. Passing
/// [`Permission::Denied`] at construction keeps notifications off for good.
pub struct SystemNotifier {
    program: String,
    supported: bool,
    permission: Mutex<Permission>,
    settings: Arc<SettingsStore>,
}

impl SystemNotifier {
    /// Probe for `notify-send` and build a notifier around it
    pub async fn detect(settings: Arc<SettingsStore>, permission: Permission) -> Self {
        Self::detect_program("notify-send", settings, permission).await
    }

    /// Probe for an arbitrary notification command
    pub async fn detect_program(
        program: &str,
        settings: Arc<SettingsStore>,
        permission: Permission,
    ) -> Self {
        let supported = match Command::new(program).arg("--version").output().await {
            Ok(_) => {
                info!("{} is available for notifications", program);
                true
            }
            Err(e) => {
                warn!("{} is not available, notifications disabled: {}", program, e);
                false
            }
        };
        Self::new(program, supported, settings, permission)
    }

    pub fn new(
        program: &str,
        supported: bool,
        settings: Arc<SettingsStore>,
        permission: Permission,
    ) -> Self {
        Self {
            program: program.to_string(),
            supported,
            permission: Mutex::new(permission),
            settings,
        }
    }

    fn permission(&self) -> MutexGuard<'_, Permission> {
        self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Program and arguments for a notification, `None` when it must not be sent
    fn command(&self, title: &str, options: NotificationOptions) -> Option<(String, Vec<String>)> {
        // Alerts off silences notifications regardless of permission
        if !self.settings.sound_enabled() {
            debug!("Alerts disabled in settings, skipping notification");
            return None;
        }

        if !self.is_permission_granted() {
            warn!("Notification permission not granted");
            return None;
        }

        let settings = self.settings.get();
        let options = NotificationOptions {
            icon: options.icon.or_else(|| Some(DEFAULT_ICON.to_string())),
            badge: options.badge.or_else(|| Some(DEFAULT_ICON.to_string())),
            tag: options.tag.or_else(|| Some(COMPLETION_TAG.to_string())),
            vibrate: options.vibrate.or_else(|| {
                settings
                    .vibration_enabled
                    .then(|| NOTIFICATION_VIBRATION.to_vec())
            }),
            require_interaction: options.require_interaction.or(Some(true)),
            body: options.body,
        };

        Some((self.program.clone(), command_args(title, &options)))
    }
}

/// `notify-send` arguments. Critical urgency would disable the expiry.
fn command_args(title: &str, options: &NotificationOptions) -> Vec<String> {
    let mut args = vec![
        "--app-name".to_string(),
        APP_NAME.to_string(),
        "--expire-time".to_string(),
        AUTO_DISMISS_MS.to_string(),
        "--urgency=normal".to_string(),
    ];
    if options.require_interaction == Some(true) {
        args.push("--hint=boolean:resident:true".to_string());
    }
    if let Some(icon) = &options.icon {
        args.push(format!("--icon={icon}"));
    }
    if let Some(tag) = &options.tag {
        // Replaces an earlier notification with the same tag
        args.push(format!("--hint=string:x-canonical-private-synchronous:{tag}"));
    }
    args.push(title.to_string());
    if let Some(body) = &options.body {
        args.push(body.clone());
    }
    args
}

#[async_trait]
impl NotificationService for SystemNotifier {
    async fn request_permission(&self) -> bool {
        if !self.supported {
            warn!("This platform does not support notifications");
            return false;
        }

        let mut permission = self.permission();
        match *permission {
            Permission::Granted => true,
            Permission::Denied => false,
            Permission::Default => {
                info!("Notification permission granted");
                *permission = Permission::Granted;
                true
            }
        }
    }

    fn send_notification(&self, title: &str, options: NotificationOptions) {
        let Some((program, args)) = self.command(title, options) else {
            return;
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to send notification: no async runtime: {}", e);
                return;
            }
        };

        runtime.spawn(async move {
            match Command::new(&program).args(&args).output().await {
                Ok(output) if output.status.success() => {
                    debug!("Notification dispatched via {}", program);
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    error!("Failed to send notification: {} failed: {}", program, stderr);
                }
                Err(e) => error!("Failed to send notification: {}", e),
            }
        });
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn get_permission(&self) -> Option<Permission> {
        if !self.supported {
            return None;
        }
        Some(*self.permission())
    }
}
