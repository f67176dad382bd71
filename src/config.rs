/// Engine configuration constants
///
/// Centralized configuration for the reminder engine.
use std::path::PathBuf;
use std::time::Duration;

/// Seconds between scheduler ticks
pub const TICK_INTERVAL_SECS: u64 = 60;

/// Maximum number of notification records kept in the inbox
pub const INBOX_CAPACITY: usize = 50;

/// Subdirectory under the platform-local data dir
pub const APP_DATA_DIR: &str = "FitTrackReminders";

/// File name of the persisted reminder document
pub const DATA_FILE_NAME: &str = "reminders.json";

/// Runtime configuration for a [`ReminderEngine`](crate::ReminderEngine) instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for the persisted document; `None` resolves the platform
    /// data dir at startup.
    pub data_dir: Option<PathBuf>,
    pub tick_interval: Duration,
    pub inbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
            inbox_capacity: INBOX_CAPACITY,
        }
    }
}
