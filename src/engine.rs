use crate::channel::{DesktopChannel, NotificationChannel, NullChannel};
use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::AppResult;
use crate::inbox::{Inbox, InboxListener, ListenerId};
use crate::notification::NotificationRecord;
use crate::permission::{PermissionGate, PermissionStatus};
use crate::reminder::{
    MealType, Reminder, ReminderKind, ReminderPatch, ScheduleTime, WorkoutType,
};
use crate::scheduler::Scheduler;
use crate::storage::Storage;
use crate::trigger;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Shared state behind the engine facade: the store, the inbox, the
/// permission gate, and the dispatcher that ties them together.
pub(crate) struct EngineInner {
    storage: Mutex<Storage>,
    inbox: Mutex<Inbox>,
    gate: Arc<PermissionGate>,
    dispatcher: Dispatcher,
    platform: Arc<dyn NotificationChannel>,
}

impl EngineInner {
    /// Lock storage, recovering from poison if needed
    fn lock_storage(&self) -> MutexGuard<'_, Storage> {
        self.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One scheduler pass: snapshot the definitions, evaluate each, and
    /// dispatch the positives. Runs inline on the scheduler thread, so ticks
    /// can never overlap.
    pub(crate) fn run_tick(&self, now: NaiveDateTime) {
        let snapshot = self.lock_storage().all_reminders();
        for reminder in &snapshot {
            if !trigger::should_fire(reminder, now) {
                continue;
            }
            self.fire_if_due(reminder.id, now);
        }
    }

    /// Dispatch one reminder, re-fetching it under the lock first: a delete
    /// or deactivate landing after the tick's snapshot must not fire a
    /// stale copy.
    pub(crate) fn fire_if_due(&self, id: i64, now: NaiveDateTime) {
        let mut storage = self.lock_storage();
        let mut inbox = self.lock_inbox();

        let reminder = match storage.get_reminder(id) {
            Ok(reminder) => reminder,
            Err(_) => return, // deleted since the snapshot
        };
        if !trigger::should_fire(&reminder, now) {
            return;
        }

        if let Err(e) = self
            .dispatcher
            .fire(&mut storage, &mut inbox, &reminder, now.date())
        {
            log::warn!("fire failed for reminder {}: {}", reminder.id, e);
        }
    }

    /// Persist the inbox; on a failed write, revert it to the durable state.
    fn persist_inbox(&self, storage: &mut Storage, inbox: &mut Inbox) -> AppResult<()> {
        if let Err(e) = storage.set_notifications(inbox.records().to_vec()) {
            inbox.restore_records(storage.notifications());
            return Err(e);
        }
        Ok(())
    }
}

/// Disposer returned by [`ReminderEngine::subscribe_notifications`]. The
/// listener stays registered for as long as this guard is alive.
pub struct Subscription {
    inner: Weak<EngineInner>,
    id: Option<ListenerId>,
}

impl Subscription {
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let (Some(inner), Some(id)) = (self.inner.upgrade(), self.id.take()) {
            inner.lock_inbox().unsubscribe(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// The reminder scheduling and notification engine.
///
/// One instance owns its store, inbox, permission gate, and scheduler
/// thread; constructed at startup and torn down with [`stop`](Self::stop).
pub struct ReminderEngine {
    inner: Arc<EngineInner>,
    scheduler: Mutex<Option<Scheduler>>,
    config: EngineConfig,
}

impl ReminderEngine {
    /// Engine with the real desktop platform channel and no in-app sink.
    /// The UI layer passes its toast sink via [`with_channels`](Self::with_channels).
    pub fn new(config: EngineConfig) -> AppResult<Self> {
        Self::with_channels(
            config,
            Arc::new(DesktopChannel),
            Arc::new(NullChannel::granted()),
        )
    }

    pub fn with_channels(
        config: EngineConfig,
        platform: Arc<dyn NotificationChannel>,
        in_app: Arc<dyn NotificationChannel>,
    ) -> AppResult<Self> {
        let storage = match &config.data_dir {
            Some(dir) => Storage::with_path(dir.clone())?,
            None => Storage::new()?,
        };
        let inbox = Inbox::with_records(config.inbox_capacity, storage.notifications());

        let gate = Arc::new(PermissionGate::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&platform),
            in_app,
            Arc::clone(&gate),
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                storage: Mutex::new(storage),
                inbox: Mutex::new(inbox),
                gate,
                dispatcher,
                platform,
            }),
            scheduler: Mutex::new(None),
            config,
        })
    }

    /// Start the tick loop. An immediate evaluation pass runs right away so
    /// reminders due at startup are not missed. Idempotent.
    pub fn start(&self) {
        let mut slot = self.scheduler.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(Scheduler::start(
                Arc::clone(&self.inner),
                self.config.tick_interval,
            ));
            log::info!(
                "reminder engine started (tick every {:?})",
                self.config.tick_interval
            );
        }
    }

    /// Stop the tick loop and clear all inbox subscribers. In-flight
    /// platform deliveries are not cancelled, just not awaited.
    pub fn stop(&self) {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop();
        }
        self.inner.lock_inbox().clear_subscribers();
        log::info!("reminder engine stopped");
    }

    // ============ Reminder operations ============

    pub fn add_meal_reminder(
        &self,
        title: impl Into<String>,
        meal_type: MealType,
        schedule_time: ScheduleTime,
        recurrence_days: BTreeSet<u8>,
    ) -> AppResult<i64> {
        self.add_reminder(Reminder::new(
            ReminderKind::Meal { meal_type },
            title.into(),
            schedule_time,
            recurrence_days,
        ))
    }

    pub fn add_workout_reminder(
        &self,
        title: impl Into<String>,
        workout_type: WorkoutType,
        schedule_time: ScheduleTime,
        recurrence_days: BTreeSet<u8>,
    ) -> AppResult<i64> {
        self.add_reminder(Reminder::new(
            ReminderKind::Workout { workout_type },
            title.into(),
            schedule_time,
            recurrence_days,
        ))
    }

    fn add_reminder(&self, reminder: Reminder) -> AppResult<i64> {
        // First reminder that needs platform delivery triggers the lazy
        // permission request; answered once, cached for the gate's lifetime.
        self.inner
            .gate
            .ensure_requested(self.inner.platform.as_ref());
        self.inner.lock_storage().add_reminder(reminder)
    }

    pub fn update_reminder(&self, id: i64, patch: ReminderPatch) -> AppResult<()> {
        self.inner.lock_storage().update_reminder(id, patch)
    }

    pub fn delete_reminder(&self, id: i64) -> AppResult<()> {
        self.inner.lock_storage().delete_reminder(id)
    }

    pub fn get_reminder(&self, id: i64) -> AppResult<Reminder> {
        self.inner.lock_storage().get_reminder(id)
    }

    pub fn list_meal_reminders(&self) -> Vec<Reminder> {
        self.inner.lock_storage().list_meal_reminders()
    }

    pub fn list_workout_reminders(&self) -> Vec<Reminder> {
        self.inner.lock_storage().list_workout_reminders()
    }

    // ============ Inbox operations ============

    pub fn get_notifications(&self) -> Vec<NotificationRecord> {
        self.inner.lock_inbox().list()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.lock_inbox().unread_count()
    }

    pub fn mark_notification_read(&self, id: i64) -> AppResult<()> {
        let mut storage = self.inner.lock_storage();
        let mut inbox = self.inner.lock_inbox();
        inbox.mark_read(id)?;
        self.inner.persist_inbox(&mut storage, &mut inbox)
    }

    pub fn mark_all_read(&self) -> AppResult<()> {
        let mut storage = self.inner.lock_storage();
        let mut inbox = self.inner.lock_inbox();
        inbox.mark_all_read();
        self.inner.persist_inbox(&mut storage, &mut inbox)
    }

    pub fn delete_notification(&self, id: i64) -> AppResult<()> {
        let mut storage = self.inner.lock_storage();
        let mut inbox = self.inner.lock_inbox();
        inbox.delete(id)?;
        self.inner.persist_inbox(&mut storage, &mut inbox)
    }

    /// Register a listener called synchronously after every inbox mutation.
    /// Dropping the returned guard unregisters it.
    ///
    /// Listeners run while the engine's internal locks are held, so they
    /// must not call back into engine operations; doing so deadlocks. The
    /// callback already receives the full updated list, so there is no need
    /// to re-query the engine from inside it.
    pub fn subscribe_notifications(&self, listener: InboxListener) -> Subscription {
        let id = self.inner.lock_inbox().subscribe(listener);
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    // ============ Permission ============

    pub fn get_permission_status(&self) -> PermissionStatus {
        self.inner.gate.status()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<EngineInner> {
        &self.inner
    }
}

impl Drop for ReminderEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_support::RecordingChannel;
    use crate::config::EngineConfig;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex as StdMutex;

    fn test_config(name: &str) -> (EngineConfig, PathBuf) {
        let dir = env::temp_dir().join(format!("fittrack_engine_{}", name));
        let _ = fs::remove_dir_all(&dir);
        let config = EngineConfig {
            data_dir: Some(dir.clone()),
            ..EngineConfig::default()
        };
        (config, dir)
    }

    fn test_engine(name: &str) -> (ReminderEngine, Arc<RecordingChannel>, PathBuf) {
        let (config, dir) = test_config(name);
        let platform = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
        let in_app = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
        let engine = ReminderEngine::with_channels(
            config,
            Arc::clone(&platform) as Arc<dyn NotificationChannel>,
            in_app,
        )
        .unwrap();
        (engine, platform, dir)
    }

    fn every_day() -> BTreeSet<u8> {
        (0..=6).collect()
    }

    fn monday_8am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 31)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_add_triggers_permission_request_once() {
        let (engine, platform, dir) = test_engine("permission_once");
        assert_eq!(engine.get_permission_status(), PermissionStatus::Default);

        engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();
        engine
            .add_workout_reminder(
                "Run",
                WorkoutType::Cardio,
                ScheduleTime { hour: 18, minute: 0 },
                every_day(),
            )
            .unwrap();

        assert_eq!(platform.requests.load(Ordering::SeqCst), 1);
        assert_eq!(engine.get_permission_status(), PermissionStatus::Granted);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_add_rejects_empty_recurrence_days() {
        let (engine, _, dir) = test_engine("reject_days");
        let result = engine.add_meal_reminder(
            "Lunch",
            MealType::Lunch,
            ScheduleTime { hour: 12, minute: 0 },
            BTreeSet::new(),
        );
        assert!(matches!(result, Err(crate::error::AppError::Validation(_))));
        assert!(engine.list_meal_reminders().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_tick_fires_once_per_day() {
        let (engine, _, dir) = test_engine("fires_once");
        let id = engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();

        engine.inner().run_tick(monday_8am());
        assert_eq!(engine.get_notifications().len(), 1);
        assert_eq!(
            engine.get_reminder(id).unwrap().last_triggered,
            NaiveDate::from_ymd_opt(2026, 8, 31)
        );

        // A later evaluation the same Monday does not fire again.
        engine.inner().run_tick(monday_8am());
        assert_eq!(engine.get_notifications().len(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_inactive_reminder_is_skipped() {
        let (engine, _, dir) = test_engine("inactive");
        let id = engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();
        engine
            .update_reminder(
                id,
                ReminderPatch {
                    active: Some(false),
                    ..ReminderPatch::default()
                },
            )
            .unwrap();

        engine.inner().run_tick(monday_8am());
        assert!(engine.get_notifications().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_deleted_reminder_never_fires() {
        let (engine, _, dir) = test_engine("deleted");
        let id = engine
            .add_workout_reminder(
                "Run",
                WorkoutType::Cardio,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();
        engine.delete_reminder(id).unwrap();

        engine.inner().run_tick(monday_8am());
        assert!(engine.get_notifications().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_stale_snapshot_cannot_fire_deleted_reminder() {
        let (engine, _, dir) = test_engine("stale_deleted");
        let id = engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();

        // The tick snapshotted this id, then the UI deleted it before the
        // dispatch lock was taken.
        engine.delete_reminder(id).unwrap();
        engine.inner().fire_if_due(id, monday_8am());

        assert!(engine.get_notifications().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_stale_snapshot_cannot_fire_deactivated_reminder() {
        let (engine, _, dir) = test_engine("stale_inactive");
        let id = engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();

        engine
            .update_reminder(
                id,
                ReminderPatch {
                    active: Some(false),
                    ..ReminderPatch::default()
                },
            )
            .unwrap();
        engine.inner().fire_if_due(id, monday_8am());

        assert!(engine.get_notifications().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_mark_read_and_delete_notification() {
        let (engine, _, dir) = test_engine("mark_read");
        engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();
        engine.inner().run_tick(monday_8am());

        let record_id = engine.get_notifications()[0].id;
        assert_eq!(engine.unread_count(), 1);

        engine.mark_notification_read(record_id).unwrap();
        assert_eq!(engine.unread_count(), 0);

        engine.delete_notification(record_id).unwrap();
        assert!(engine.get_notifications().is_empty());
        assert!(matches!(
            engine.mark_notification_read(record_id),
            Err(crate::error::AppError::NotFound(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_notification_history_reloads_across_instances() {
        let (config, dir) = test_config("history_reload");
        {
            let platform = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
            let in_app = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
            let engine = ReminderEngine::with_channels(
                config.clone(),
                platform as Arc<dyn NotificationChannel>,
                in_app,
            )
            .unwrap();
            engine
                .add_meal_reminder(
                    "Breakfast",
                    MealType::Breakfast,
                    ScheduleTime { hour: 8, minute: 0 },
                    every_day(),
                )
                .unwrap();
            engine.inner().run_tick(monday_8am());
        }

        let platform = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
        let in_app = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
        let engine = ReminderEngine::with_channels(
            config,
            platform as Arc<dyn NotificationChannel>,
            in_app,
        )
        .unwrap();
        assert_eq!(engine.get_notifications().len(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_subscription_guard_unregisters_on_drop() {
        let (engine, _, dir) = test_engine("subscription");
        let seen: Arc<StdMutex<Vec<usize>>> = Arc::new(StdMutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        let subscription = engine.subscribe_notifications(Box::new(move |records| {
            s.lock().unwrap().push(records.len());
        }));

        engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();
        engine.inner().run_tick(monday_8am());
        assert_eq!(seen.lock().unwrap().as_slice(), &[1]);

        drop(subscription);
        engine.mark_all_read().unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[1]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_stop_clears_subscribers() {
        let (engine, _, dir) = test_engine("stop_clears");
        let seen = Arc::new(StdMutex::new(0usize));

        let s = Arc::clone(&seen);
        let _subscription = engine.subscribe_notifications(Box::new(move |_| {
            *s.lock().unwrap() += 1;
        }));

        engine.stop();
        engine
            .add_meal_reminder(
                "Breakfast",
                MealType::Breakfast,
                ScheduleTime { hour: 8, minute: 0 },
                every_day(),
            )
            .unwrap();
        engine.inner().run_tick(monday_8am());

        assert_eq!(*seen.lock().unwrap(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_inbox_capacity_from_config() {
        let (mut config, dir) = test_config("capacity");
        config.inbox_capacity = 2;
        let platform = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
        let in_app = Arc::new(RecordingChannel::new(PermissionStatus::Granted));
        let engine = ReminderEngine::with_channels(
            config,
            platform as Arc<dyn NotificationChannel>,
            in_app,
        )
        .unwrap();

        for hour in [6, 7, 8] {
            engine
                .add_meal_reminder(
                    format!("Meal at {}", hour),
                    MealType::Snack,
                    ScheduleTime { hour, minute: 0 },
                    every_day(),
                )
                .unwrap();
            let now = NaiveDate::from_ymd_opt(2026, 8, 31)
                .unwrap()
                .and_hms_opt(hour as u32, 0, 0)
                .unwrap();
            engine.inner().run_tick(now);
        }

        let records = engine.get_notifications();
        assert_eq!(records.len(), 2);
        // Oldest (06:00) evicted; newest first.
        assert_eq!(records[0].title, "Meal at 8");
        assert_eq!(records[1].title, "Meal at 7");
        let _ = fs::remove_dir_all(&dir);
    }
}
