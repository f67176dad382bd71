use crate::reminder::Reminder;
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Weekday index with 0 = Sunday .. 6 = Saturday, matching the persisted
/// recurrence-day encoding.
pub fn weekday_index(now: NaiveDateTime) -> u8 {
    now.weekday().num_days_from_sunday() as u8
}

/// Pure trigger decision: whether `reminder` should fire at `now`.
///
/// Fires only when the reminder is active, the minute-of-day matches
/// exactly, today is a recurrence day, and it has not already fired today.
pub fn should_fire(reminder: &Reminder, now: NaiveDateTime) -> bool {
    if !reminder.active {
        return false;
    }

    let minute_of_day = now.hour() * 60 + now.minute();
    if minute_of_day != reminder.schedule_time.minute_of_day() {
        return false;
    }

    if !reminder.recurrence_days.contains(&weekday_index(now)) {
        return false;
    }

    // Already fired today, or on a later date the clock has since jumped
    // back across; the fire date never moves backward.
    if reminder
        .last_triggered
        .map_or(false, |fired| fired >= now.date())
    {
        return false;
    }

    true
}
