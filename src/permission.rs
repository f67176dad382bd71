use crate::channel::NotificationChannel;
use once_cell::sync::OnceCell;
use serde::Serialize;

/// Lifecycle of platform notification permission:
/// `Unknown -> Default -> (request) -> Granted | Denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Unknown,
    Default,
    Granted,
    Denied,
}

/// Caches the platform's permission answer so the underlying request runs
/// at most once per gate lifetime, no matter how often it is asked.
#[derive(Debug, Default)]
pub struct PermissionGate {
    resolved: OnceCell<PermissionStatus>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state without triggering a request. `Default` means the gate
    /// exists but the platform has not been asked yet.
    pub fn status(&self) -> PermissionStatus {
        self.resolved
            .get()
            .copied()
            .unwrap_or(PermissionStatus::Default)
    }

    /// Idempotently ensure the platform has been asked. Returns whether
    /// delivery is permitted.
    pub fn ensure_requested(&self, channel: &dyn NotificationChannel) -> bool {
        let status = self
            .resolved
            .get_or_init(|| channel.request_permission());
        *status == PermissionStatus::Granted
    }

    pub fn is_granted(&self) -> bool {
        self.status() == PermissionStatus::Granted
    }
}
