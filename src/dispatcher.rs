use crate::channel::{NotificationChannel, SendOptions};
use crate::error::AppResult;
use crate::inbox::Inbox;
use crate::notification::{NotificationKind, NotificationRecord};
use crate::permission::PermissionGate;
use crate::reminder::Reminder;
use crate::storage::Storage;
use chrono::NaiveDate;
use std::sync::Arc;
use std::thread;

/// Turns a positive trigger decision into a notification record, fans it out
/// to the inbox and both channels, and records the fire date for dedup.
pub struct Dispatcher {
    platform: Arc<dyn NotificationChannel>,
    in_app: Arc<dyn NotificationChannel>,
    gate: Arc<PermissionGate>,
}

impl Dispatcher {
    pub fn new(
        platform: Arc<dyn NotificationChannel>,
        in_app: Arc<dyn NotificationChannel>,
        gate: Arc<PermissionGate>,
    ) -> Self {
        Self {
            platform,
            in_app,
            gate,
        }
    }

    /// Fire `reminder` for `fired_on`.
    ///
    /// The inbox append and the dedup update always run; channel failures
    /// are logged and never propagate. The error path here is storage only.
    pub fn fire(
        &self,
        storage: &mut Storage,
        inbox: &mut Inbox,
        reminder: &Reminder,
        fired_on: NaiveDate,
    ) -> AppResult<NotificationRecord> {
        let message = reminder
            .custom_message
            .clone()
            .unwrap_or_else(|| reminder.kind.default_message(&reminder.title));

        let record = NotificationRecord::new(
            NotificationKind::from(&reminder.kind),
            reminder.title.clone(),
            message.clone(),
            Some(reminder.id),
        );
        let stored = inbox.append(record);

        // History durability is best-effort during a fire; dedup outranks it.
        if let Err(e) = storage.set_notifications(inbox.records().to_vec()) {
            log::warn!("failed to persist notification history: {}", e);
        }

        let options = SendOptions {
            sound: reminder.channel_prefs.sound_enabled,
            vibrate: reminder.channel_prefs.vibration_enabled,
            persistent: reminder.channel_prefs.persistent && reminder.kind.is_meal(),
        };

        // In-app alert goes out on every fire, even when the platform
        // channel is denied.
        if let Err(e) = self.in_app.send(&reminder.title, &message, &options) {
            log::warn!("in-app alert failed for reminder {}: {}", reminder.id, e);
        }

        if self.gate.is_granted() {
            let platform = Arc::clone(&self.platform);
            let title = reminder.title.clone();
            let reminder_id = reminder.id;
            // Fire-and-forget: never awaited, never blocks the dedup update.
            thread::spawn(move || {
                if let Err(e) = platform.send(&title, &message, &options) {
                    log::warn!(
                        "platform delivery failed for reminder {}: {}",
                        reminder_id,
                        e
                    );
                }
            });
        }

        storage.mark_fired(reminder.id, fired_on)?;
        log::info!(
            "reminder {} fired on {} -> notification {}",
            reminder.id,
            fired_on,
            stored.id
        );
        Ok(stored)
    }
}
