//! Due predicates for reminders and events.
//!
//! Storage adapters express the same conditions as query filters; these
//! functions are the reference definition and back the in-memory store.

use chrono::{Duration, NaiveDateTime};

use crate::domain::{Event, Reminder};

/// Enabled, past its fire time, not acknowledged, and outside the re-send cooldown.
pub fn reminder_is_due(reminder: &Reminder, now: NaiveDateTime, cooldown: Duration) -> bool {
    if !reminder.enabled || reminder.acknowledged_at.is_some() {
        return false;
    }
    let Some(remind_at) = reminder.remind_at else {
        return false;
    };
    if remind_at > now {
        return false;
    }
    match reminder.notified_at {
        None => true,
        Some(notified) => notified <= now - cooldown,
    }
}

/// The pending occurrence is within its lead window and not yet announced.
pub fn event_in_notify_window(event: &Event, now: NaiveDateTime) -> bool {
    let (Some(next), Some(from)) = (event.next_occurrence, event.notify_from()) else {
        return false;
    };
    event.notified_at.is_none() && from <= now && now < next
}

/// The pending occurrence has started and must be rolled forward or cleared.
pub fn event_elapsed(event: &Event, now: NaiveDateTime) -> bool {
    event.next_occurrence.is_some_and(|next| next <= now)
}
