use crate::reminder::ReminderKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Meal,
    Workout,
    Other,
}

impl From<&ReminderKind> for NotificationKind {
    fn from(kind: &ReminderKind) -> Self {
        match kind {
            ReminderKind::Meal { .. } => NotificationKind::Meal,
            ReminderKind::Workout { .. } => NotificationKind::Workout,
        }
    }
}

/// A fired notification as held by the inbox and shown by the bell widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: String,
    pub read: bool,
    /// Back-reference for lookup only; the record outlives the reminder.
    pub source_reminder_id: Option<i64>,
}

impl NotificationRecord {
    pub fn new(
        kind: NotificationKind,
        title: String,
        message: String,
        source_reminder_id: Option<i64>,
    ) -> Self {
        Self {
            id: 0, // Will be set by the inbox
            kind,
            title,
            message,
            timestamp: Utc::now().to_rfc3339(),
            read: false,
            source_reminder_id,
        }
    }
}
