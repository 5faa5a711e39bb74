//! crates/lifeline_core/src/advance.rs
//!
//! State transitions applied after a notification fires or is acknowledged.
//!
//! The pure functions decide the next fire time; [`OccurrenceAdvancer`] persists
//! the decision with single-row repository updates.

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{Event, MessageHandle, Reminder};
use crate::ports::{EventRepository, PortResult, ReminderRepository};
use crate::rrule::{self, RecurrenceRule};

/// What acknowledging a reminder did to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Rescheduled(NaiveDateTime),
    Disabled,
}

/// The next fire time of a reminder acknowledged at `now`, strictly after `now`.
/// `None` for one-shot reminders, exhausted rules and unparsable rules.
pub fn next_reminder_fire(reminder: &Reminder, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if !reminder.is_recurring() {
        return None;
    }
    let (rule, anchor) = (reminder.recurrence_rule.as_deref()?, reminder.dtstart?);
    match RecurrenceRule::parse(rule) {
        Ok(parsed) => rrule::next_occurrence_strict(&parsed, anchor, now),
        Err(e) => {
            warn!(reminder_id = reminder.id, rule, error = %e, "Invalid recurrence rule");
            None
        }
    }
}

/// Where an event's pending occurrence moves once it has elapsed at `now`.
///
/// An occurrence landing exactly on `now` has already elapsed, so the search
/// falls back to the strictly later one.
pub fn next_event_occurrence(event: &Event, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let rule = event.recurrence_rule.as_deref().filter(|r| rrule::is_recurring(r))?;
    let parsed = match RecurrenceRule::parse(rule) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(event_id = event.id, rule, error = %e, "Invalid recurrence rule");
            return None;
        }
    };
    match rrule::next_occurrence(&parsed, event.dtstart, now) {
        Some(next) if next > now => Some(next),
        Some(_) => rrule::next_occurrence_strict(&parsed, event.dtstart, now),
        None => None,
    }
}

/// The first pending occurrence of a newly created item.
///
/// Future anchors and one-shot items start at their anchor; a recurring item
/// anchored in the past starts at its first occurrence from `now`. A broken
/// rule falls back to the anchor.
pub fn initial_next_occurrence(
    rule: Option<&str>,
    dtstart: NaiveDateTime,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let Some(rule) = rule.filter(|r| rrule::is_recurring(r)) else {
        return Some(dtstart);
    };
    if dtstart >= now {
        return Some(dtstart);
    }
    match RecurrenceRule::parse(rule) {
        Ok(parsed) => rrule::next_occurrence(&parsed, dtstart, now),
        Err(_) => Some(dtstart),
    }
}

/// Persists occurrence transitions through the repositories.
#[derive(Clone)]
pub struct OccurrenceAdvancer {
    reminders: Arc<dyn ReminderRepository>,
    events: Arc<dyn EventRepository>,
}

impl OccurrenceAdvancer {
    pub fn new(reminders: Arc<dyn ReminderRepository>, events: Arc<dyn EventRepository>) -> Self {
        Self { reminders, events }
    }

    /// `Scheduled -> Notified`. `remind_at` stays put so the reminder re-fires
    /// after the cooldown until acknowledged.
    pub async fn reminder_notified(
        &self,
        reminder: &Reminder,
        handle: MessageHandle,
        now: NaiveDateTime,
    ) -> PortResult<()> {
        self.reminders
            .mark_reminder_notified(reminder.id, now, handle)
            .await
    }

    /// `Notified -> Acknowledged -> {Scheduled, Disabled}`.
    ///
    /// The outcome is decided before anything is written and persisted with a
    /// single update, so a failed write leaves the reminder as it was and the
    /// acknowledgement can simply be repeated.
    pub async fn acknowledge_reminder(
        &self,
        reminder: &Reminder,
        now: NaiveDateTime,
    ) -> PortResult<AckOutcome> {
        match next_reminder_fire(reminder, now) {
            Some(next) => {
                self.reminders.reschedule_reminder(reminder.id, next).await?;
                info!(reminder_id = reminder.id, next = %next, "Reminder rescheduled");
                Ok(AckOutcome::Rescheduled(next))
            }
            None => {
                self.reminders.complete_reminder(reminder.id, now).await?;
                info!(reminder_id = reminder.id, "Reminder completed and disabled");
                Ok(AckOutcome::Disabled)
            }
        }
    }

    pub async fn event_notified(&self, event: &Event, now: NaiveDateTime) -> PortResult<()> {
        self.events.set_event_notified(event.id, now).await
    }

    /// Rolls an elapsed event forward (or clears it), resetting its notified flag.
    pub async fn roll_event_forward(
        &self,
        event: &Event,
        now: NaiveDateTime,
    ) -> PortResult<Option<NaiveDateTime>> {
        let next = next_event_occurrence(event, now);
        self.events.set_event_next_occurrence(event.id, next).await?;
        match next {
            Some(next) => info!(event_id = event.id, next = %next, "Scheduled next event occurrence"),
            None => info!(event_id = event.id, "Event has no further occurrences"),
        }
        Ok(next)
    }
}
