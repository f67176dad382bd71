mod local;

use crate::config::APP_DATA_DIR;
use crate::error::{AppError, AppResult};
use crate::notification::NotificationRecord;
use crate::reminder::{Reminder, ReminderPatch};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted document: three named collections, dates as ISO strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderData {
    #[serde(default)]
    pub meal_reminders: Vec<Reminder>,
    #[serde(default)]
    pub workout_reminders: Vec<Reminder>,
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
}

/// Storage over the local reminder document.
///
/// Every mutation is written durably before it returns; on a failed write
/// the in-memory state is rolled back to match the last durable state.
pub struct Storage {
    data: ReminderData,
    app_data_path: PathBuf,
}

impl Storage {
    pub fn new() -> AppResult<Self> {
        let app_data_path = dirs::data_local_dir()
            .ok_or_else(|| AppError::storage("failed to resolve local data dir"))?
            .join(APP_DATA_DIR);
        Self::with_path(app_data_path)
    }

    /// Open storage rooted at an explicit directory (tests, portable mode).
    pub fn with_path<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        let app_data_path = path.into();
        fs::create_dir_all(&app_data_path).map_err(|e| AppError::storage(e.to_string()))?;
        let data = local::load_local(&app_data_path)?;
        Ok(Self {
            data,
            app_data_path,
        })
    }

    fn save(&self) -> AppResult<()> {
        local::save_local(&self.app_data_path, &self.data)
    }

    /// Persist the current document, restoring `backup` if the write fails.
    fn commit(&mut self, backup: ReminderData) -> AppResult<()> {
        if let Err(e) = self.save() {
            self.data = backup;
            return Err(e);
        }
        Ok(())
    }

    fn next_reminder_id(&self) -> i64 {
        let max_meal = self.data.meal_reminders.iter().map(|r| r.id).max().unwrap_or(0);
        let max_workout = self
            .data
            .workout_reminders
            .iter()
            .map(|r| r.id)
            .max()
            .unwrap_or(0);
        max_meal.max(max_workout) + 1
    }

    fn find(&self, id: i64) -> Option<&Reminder> {
        self.data
            .meal_reminders
            .iter()
            .chain(self.data.workout_reminders.iter())
            .find(|r| r.id == id)
    }

    fn find_mut(&mut self, id: i64) -> Option<&mut Reminder> {
        self.data
            .meal_reminders
            .iter_mut()
            .chain(self.data.workout_reminders.iter_mut())
            .find(|r| r.id == id)
    }

    fn sorted(reminders: &[Reminder]) -> Vec<Reminder> {
        let mut out = reminders.to_vec();
        out.sort_by(|a, b| {
            a.schedule_time
                .cmp(&b.schedule_time)
                .then(a.id.cmp(&b.id))
        });
        out
    }

    // ============ Reminder operations ============

    /// Validates and stores a new reminder, assigning its id.
    pub fn add_reminder(&mut self, mut reminder: Reminder) -> AppResult<i64> {
        reminder.validate()?;
        reminder.id = self.next_reminder_id();
        let id = reminder.id;
        let now = Utc::now().to_rfc3339();
        reminder.created_at = now.clone();
        reminder.updated_at = now;

        let backup = self.data.clone();
        if reminder.kind.is_meal() {
            self.data.meal_reminders.push(reminder);
        } else {
            self.data.workout_reminders.push(reminder);
        }
        self.commit(backup)?;
        Ok(id)
    }

    pub fn get_reminder(&self, id: i64) -> AppResult<Reminder> {
        self.find(id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("reminder {}", id)))
    }

    /// Applies a partial update. The patched reminder is re-validated before
    /// anything is written; a kind change across the meal/workout boundary
    /// is rejected.
    pub fn update_reminder(&mut self, id: i64, patch: ReminderPatch) -> AppResult<()> {
        let current = self.get_reminder(id)?;

        let mut updated = current.clone();
        if let Some(title) = patch.title {
            updated.title = title;
        }
        if let Some(schedule_time) = patch.schedule_time {
            updated.schedule_time = schedule_time;
        }
        if let Some(recurrence_days) = patch.recurrence_days {
            updated.recurrence_days = recurrence_days;
        }
        if let Some(active) = patch.active {
            updated.active = active;
        }
        if let Some(channel_prefs) = patch.channel_prefs {
            updated.channel_prefs = channel_prefs;
        }
        if let Some(custom_message) = patch.custom_message {
            updated.custom_message = custom_message;
        }
        if let Some(kind) = patch.kind {
            if kind.is_meal() != current.kind.is_meal() {
                return Err(AppError::validation(
                    "cannot change a reminder between meal and workout",
                ));
            }
            updated.kind = kind;
        }
        updated.validate()?;
        updated.updated_at = Utc::now().to_rfc3339();

        let backup = self.data.clone();
        if let Some(slot) = self.find_mut(id) {
            *slot = updated;
        }
        self.commit(backup)
    }

    pub fn delete_reminder(&mut self, id: i64) -> AppResult<()> {
        if self.find(id).is_none() {
            return Err(AppError::not_found(format!("reminder {}", id)));
        }
        let backup = self.data.clone();
        self.data.meal_reminders.retain(|r| r.id != id);
        self.data.workout_reminders.retain(|r| r.id != id);
        self.commit(backup)
    }

    /// Snapshot of meal reminders, ordered by schedule time then id.
    pub fn list_meal_reminders(&self) -> Vec<Reminder> {
        Self::sorted(&self.data.meal_reminders)
    }

    /// Snapshot of workout reminders, ordered by schedule time then id.
    pub fn list_workout_reminders(&self) -> Vec<Reminder> {
        Self::sorted(&self.data.workout_reminders)
    }

    /// Snapshot of all reminders for a scheduler pass.
    pub fn all_reminders(&self) -> Vec<Reminder> {
        self.data
            .meal_reminders
            .iter()
            .chain(self.data.workout_reminders.iter())
            .cloned()
            .collect()
    }

    /// Records a fire date. `last_triggered` never moves backward, so a
    /// host clock jumping back across midnight cannot re-arm a reminder.
    pub fn mark_fired(&mut self, id: i64, date: NaiveDate) -> AppResult<()> {
        if self.find(id).is_none() {
            return Err(AppError::not_found(format!("reminder {}", id)));
        }
        let backup = self.data.clone();
        if let Some(reminder) = self.find_mut(id) {
            reminder.last_triggered = match reminder.last_triggered {
                Some(existing) => Some(existing.max(date)),
                None => Some(date),
            };
            reminder.updated_at = Utc::now().to_rfc3339();
        }
        self.commit(backup)
    }

    // ============ Notification history ============

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.data.notifications.clone()
    }

    /// Write-through for the inbox: replaces the persisted history.
    pub fn set_notifications(&mut self, records: Vec<NotificationRecord>) -> AppResult<()> {
        let backup = self.data.clone();
        self.data.notifications = records;
        self.commit(backup)
    }
}
