use crate::error::{AppError, AppResult};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Cardio,
    Strength,
    Yoga,
    Stretching,
}

/// Discriminates the two reminder kinds and carries the kind-specific field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReminderKind {
    Meal { meal_type: MealType },
    Workout { workout_type: WorkoutType },
}

impl ReminderKind {
    pub fn is_meal(&self) -> bool {
        matches!(self, ReminderKind::Meal { .. })
    }

    /// Default notification body used when no custom message is set.
    pub fn default_message(&self, title: &str) -> String {
        match self {
            ReminderKind::Meal { meal_type } => {
                let meal = match meal_type {
                    MealType::Breakfast => "breakfast",
                    MealType::Lunch => "lunch",
                    MealType::Dinner => "dinner",
                    MealType::Snack => "a snack",
                };
                format!("Time for {}! Don't forget to log {}.", meal, title)
            }
            ReminderKind::Workout { .. } => {
                format!("Time to move! Your workout \"{}\" is scheduled now.", title)
            }
        }
    }
}

/// Wall-clock time of day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleTime {
    pub hour: u8,
    pub minute: u8,
}

impl ScheduleTime {
    pub fn new(hour: u8, minute: u8) -> AppResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(AppError::validation(format!(
                "schedule time {:02}:{:02} is out of range",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn minute_of_day(&self) -> u32 {
        self.hour as u32 * 60 + self.minute as u32
    }
}

impl std::fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Per-reminder delivery hints passed to the notification channel.
/// `persistent` is only honored for meal reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPrefs {
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    #[serde(default)]
    pub persistent: bool,
}

impl Default for ChannelPrefs {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            vibration_enabled: true,
            persistent: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    #[serde(flatten)]
    pub kind: ReminderKind,
    pub title: String,
    pub schedule_time: ScheduleTime,
    /// Weekday indices, 0 = Sunday .. 6 = Saturday. Never empty once stored.
    pub recurrence_days: BTreeSet<u8>,
    pub active: bool,
    /// Calendar date of the most recent fire; drives the once-per-day dedup.
    pub last_triggered: Option<NaiveDate>,
    #[serde(default)]
    pub channel_prefs: ChannelPrefs,
    pub custom_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Reminder {
    pub fn new(
        kind: ReminderKind,
        title: String,
        schedule_time: ScheduleTime,
        recurrence_days: BTreeSet<u8>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: 0, // Will be set by storage
            kind,
            title,
            schedule_time,
            recurrence_days,
            active: true,
            last_triggered: None,
            channel_prefs: ChannelPrefs::default(),
            custom_message: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Checks the invariants the store enforces on every write.
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("title must not be empty"));
        }
        if self.recurrence_days.is_empty() {
            return Err(AppError::validation(
                "at least one recurrence day is required",
            ));
        }
        if let Some(&day) = self.recurrence_days.iter().find(|&&d| d > 6) {
            return Err(AppError::validation(format!(
                "recurrence day {} is out of range (0=Sunday..6=Saturday)",
                day
            )));
        }
        if self.schedule_time.hour > 23 || self.schedule_time.minute > 59 {
            return Err(AppError::validation(format!(
                "schedule time {} is out of range",
                self.schedule_time
            )));
        }
        Ok(())
    }
}

/// Partial update applied through `Storage::update_reminder`.
/// `custom_message` uses a double `Option` so a patch can clear the override.
#[derive(Debug, Clone, Default)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub schedule_time: Option<ScheduleTime>,
    pub recurrence_days: Option<BTreeSet<u8>>,
    pub active: Option<bool>,
    pub channel_prefs: Option<ChannelPrefs>,
    pub custom_message: Option<Option<String>>,
    pub kind: Option<ReminderKind>,
}

#[cfg(test)]
pub(crate) fn test_reminder(id: i64, hour: u8, minute: u8, days: &[u8]) -> Reminder {
    let mut reminder = Reminder::new(
        ReminderKind::Meal {
            meal_type: MealType::Lunch,
        },
        format!("Reminder {}", id),
        ScheduleTime { hour, minute },
        days.iter().copied().collect(),
    );
    reminder.id = id;
    reminder
}
