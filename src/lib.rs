//! Reminder scheduling and notification engine for the FitTrack app.
//!
//! The UI layer creates one [`ReminderEngine`], calls its operations, and
//! renders the observable inbox; everything visual stays out of this crate.

mod channel;
mod config;
mod dispatcher;
mod engine;
mod error;
mod inbox;
mod notification;
mod permission;
mod reminder;
mod scheduler;
mod storage;
mod trigger;

pub use channel::{DesktopChannel, NotificationChannel, NullChannel, SendOptions};
pub use config::EngineConfig;
pub use engine::{ReminderEngine, Subscription};
pub use error::{AppError, AppResult};
pub use inbox::{InboxListener, ListenerId};
pub use notification::{NotificationKind, NotificationRecord};
pub use permission::{PermissionGate, PermissionStatus};
pub use reminder::{
    ChannelPrefs, MealType, Reminder, ReminderKind, ReminderPatch, ScheduleTime, WorkoutType,
};
pub use trigger::should_fire;
