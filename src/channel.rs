use crate::error::{AppError, AppResult};
use crate::permission::PermissionStatus;

/// Delivery hints derived from a reminder's channel preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendOptions {
    pub sound: bool,
    pub vibrate: bool,
    pub persistent: bool,
}

/// External collaborator that shows a notification to the user.
///
/// Delivery is best-effort: `send` may fail and callers treat that as a
/// logged `Delivery` error, never as a reason to skip the dedup update.
pub trait NotificationChannel: Send + Sync {
    /// Ask the platform for notification permission. Called at most once per
    /// gate; implementations that need no prompt answer immediately.
    fn request_permission(&self) -> PermissionStatus;

    fn send(&self, title: &str, body: &str, options: &SendOptions) -> AppResult<()>;
}

/// Platform-backed channel using the desktop notification service.
#[derive(Debug, Default)]
pub struct DesktopChannel;

impl NotificationChannel for DesktopChannel {
    fn request_permission(&self) -> PermissionStatus {
        // Desktop notification daemons have no prompt step; presence of the
        // service is discovered on first send.
        PermissionStatus::Granted
    }

    fn send(&self, title: &str, body: &str, options: &SendOptions) -> AppResult<()> {
        let mut notification = notify_rust::Notification::new();
        notification.summary(title).body(body);
        if options.sound {
            notification.sound_name("default");
        }
        if options.persistent {
            notification.timeout(notify_rust::Timeout::Never);
        }
        // vibrate has no desktop equivalent; it stays a hint for mobile shells
        notification
            .show()
            .map(|_| ())
            .map_err(|e| AppError::delivery(e.to_string()))
    }
}

/// No-op channel for tests and for running with platform delivery disabled.
#[derive(Debug)]
pub struct NullChannel {
    permission: PermissionStatus,
}

impl NullChannel {
    pub fn granted() -> Self {
        Self {
            permission: PermissionStatus::Granted,
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: PermissionStatus::Denied,
        }
    }
}

impl NotificationChannel for NullChannel {
    fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn send(&self, _title: &str, _body: &str, _options: &SendOptions) -> AppResult<()> {
        Ok(())
    }
}
