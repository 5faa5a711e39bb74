//! crates/lifeline_core/src/backoff.rs
//!
//! Priority- and urgency-weighted re-notification intervals for todos.

use chrono::{Duration, NaiveDateTime};

use crate::domain::ReminderIntervals;

/// Bucket of time-to-due that selects a base interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgencyZone {
    Overdue,
    Urgent,
    Soon,
    Normal,
}

impl UrgencyZone {
    /// Zone for a todo due at `due` as seen at `now`. `None` from seven days out.
    pub fn classify(due: NaiveDateTime, now: NaiveDateTime) -> Option<Self> {
        let remaining = due - now;
        if remaining < Duration::zero() {
            Some(UrgencyZone::Overdue)
        } else if remaining < Duration::hours(2) {
            Some(UrgencyZone::Urgent)
        } else if remaining < Duration::hours(24) {
            Some(UrgencyZone::Soon)
        } else if remaining < Duration::days(7) {
            Some(UrgencyZone::Normal)
        } else {
            None
        }
    }

    pub fn base_interval(&self, intervals: &ReminderIntervals) -> u32 {
        match self {
            UrgencyZone::Overdue => intervals.overdue,
            UrgencyZone::Urgent => intervals.urgent,
            UrgencyZone::Soon => intervals.soon,
            UrgencyZone::Normal => intervals.normal,
        }
    }
}

/// Interval multiplier in tenths: 5 gives 0.5x, 1 gives 2.0x. Unknown priorities are neutral.
pub fn priority_multiplier_tenths(priority: u8) -> u32 {
    match priority {
        5 => 5,
        4 => 7,
        3 => 10,
        2 => 15,
        1 => 20,
        _ => 10,
    }
}

/// Minutes between notifications, or `None` when the zone is disabled.
pub fn notify_interval(zone: UrgencyZone, priority: u8, intervals: &ReminderIntervals) -> Option<u32> {
    let base = zone.base_interval(intervals);
    if base == 0 {
        return None;
    }
    let scaled = u64::from(base) * u64::from(priority_multiplier_tenths(priority)) / 10;
    Some(u32::try_from(scaled).unwrap_or(u32::MAX).max(1))
}

/// Whether a todo should be included in this cycle's batch, plus the zone it fell into.
pub fn should_notify(
    due: Option<NaiveDateTime>,
    last_notified: Option<NaiveDateTime>,
    priority: u8,
    intervals: &ReminderIntervals,
    now: NaiveDateTime,
) -> (bool, Option<UrgencyZone>) {
    let Some(due) = due else {
        return (false, None);
    };
    let Some(zone) = UrgencyZone::classify(due, now) else {
        return (false, None);
    };
    let Some(interval) = notify_interval(zone, priority, intervals) else {
        return (false, Some(zone));
    };

    let eligible = match last_notified {
        None => true,
        Some(last) => now - last >= Duration::minutes(i64::from(interval)),
    };
    (eligible, Some(zone))
}
