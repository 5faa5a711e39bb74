//! crates/lifeline_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.
//!
//! All timestamps are wall-clock values in the deployment's local time zone,
//! stored without zone information.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rrule;

/// A chat user. Doubles as the recipient address for the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a delivered message, kept so it can be retracted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub i64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//=========================================================================================
// Reminders
//=========================================================================================

/// Where a reminder sits in its acknowledgement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    Scheduled,
    Notified,
    Acknowledged,
    Disabled,
}

/// A one-shot or recurring message that nags until the user confirms it.
#[derive(Debug, Clone)]
pub struct Reminder {
    pub id: i64,
    pub user_id: UserId,
    pub enabled: bool,
    pub message: String,
    pub description: Option<String>,
    pub recurrence_rule: Option<String>,
    pub dtstart: Option<NaiveDateTime>,
    pub remind_at: Option<NaiveDateTime>,
    pub notified_at: Option<NaiveDateTime>,
    pub acknowledged_at: Option<NaiveDateTime>,
    pub last_message: Option<MessageHandle>,
    pub created_at: NaiveDateTime,
}

impl Reminder {
    /// A reminder only recurs when it carries both a rule and an anchor.
    pub fn is_recurring(&self) -> bool {
        self.dtstart.is_some()
            && self
                .recurrence_rule
                .as_deref()
                .is_some_and(rrule::is_recurring)
    }

    pub fn state(&self) -> ReminderState {
        if !self.enabled {
            ReminderState::Disabled
        } else if self.acknowledged_at.is_some() {
            ReminderState::Acknowledged
        } else if self.notified_at.is_some() {
            ReminderState::Notified
        } else {
            ReminderState::Scheduled
        }
    }
}

/// The fields the command layer supplies when creating a reminder.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: UserId,
    pub message: String,
    pub description: Option<String>,
    pub recurrence_rule: Option<String>,
    pub dtstart: Option<NaiveDateTime>,
    pub remind_at: Option<NaiveDateTime>,
}

//=========================================================================================
// Events
//=========================================================================================

/// A possibly recurring calendar item with a duration.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub dtstart: NaiveDateTime,
    pub duration_minutes: u32,
    pub recurrence_rule: Option<String>,
    /// The materialized next fire time; `None` once a one-shot event is over.
    pub next_occurrence: Option<NaiveDateTime>,
    pub notify_before_minutes: u32,
    pub notified_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule
            .as_deref()
            .is_some_and(rrule::is_recurring)
    }

    /// The moment the lead window for the pending occurrence opens.
    pub fn notify_from(&self) -> Option<NaiveDateTime> {
        self.next_occurrence
            .map(|next| next - Duration::minutes(i64::from(self.notify_before_minutes)))
    }

    /// When the pending occurrence (or the anchor, once cleared) ends.
    /// `None` for events without a duration.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        if self.duration_minutes == 0 {
            return None;
        }
        let start = self.next_occurrence.unwrap_or(self.dtstart);
        Some(start + Duration::minutes(i64::from(self.duration_minutes)))
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub dtstart: NaiveDateTime,
    pub duration_minutes: u32,
    pub recurrence_rule: Option<String>,
    pub next_occurrence: Option<NaiveDateTime>,
    pub notify_before_minutes: u32,
}

//=========================================================================================
// Todos
//=========================================================================================

/// A task with an optional deadline and a 1–5 priority (5 highest).
#[derive(Debug, Clone)]
pub struct Todo {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub priority: u8,
    pub due_time: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub last_notified_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Todo {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub priority: u8,
    pub due_time: Option<NaiveDateTime>,
}

//=========================================================================================
// Memos and Ledger
//=========================================================================================

/// A free-form note.
#[derive(Debug, Clone)]
pub struct Memo {
    pub id: i64,
    pub user_id: UserId,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMemo {
    pub user_id: UserId,
    pub content: String,
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(EntryKind::Income),
            "expense" => Some(EntryKind::Expense),
            _ => None,
        }
    }
}

/// A recorded income or expense. Amounts are in hundredths of the currency unit.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub kind: EntryKind,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub occurred_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: UserId,
    pub kind: EntryKind,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub occurred_at: NaiveDateTime,
}

/// Income and expense totals over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub income_cents: i64,
    pub expense_cents: i64,
}

impl Balance {
    pub fn net_cents(&self) -> i64 {
        self.income_cents - self.expense_cents
    }
}

//=========================================================================================
// User Settings
//=========================================================================================

/// Base re-notification intervals per urgency zone, in minutes. Zero disables a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderIntervals {
    pub overdue: u32,
    pub urgent: u32,
    pub soon: u32,
    pub normal: u32,
}

impl Default for ReminderIntervals {
    fn default() -> Self {
        Self {
            overdue: 30,
            urgent: 30,
            soon: 120,
            normal: 480,
        }
    }
}

/// Per-user notification preferences and bookkeeping.
#[derive(Debug, Clone)]
pub struct UserSettings {
    pub user_id: UserId,
    /// Zero means unlimited.
    pub max_daily_notifications: u32,
    pub quiet_start: NaiveTime,
    pub quiet_end: NaiveTime,
    pub intervals: ReminderIntervals,
    pub todo_reminders_enabled: bool,
    pub daily_summary_enabled: bool,
    pub daily_summary_time: NaiveTime,
    pub last_summary_date: Option<NaiveDate>,
    pub last_todo_message: Option<MessageHandle>,
}

impl UserSettings {
    pub fn new_default(user_id: UserId) -> Self {
        Self {
            user_id,
            max_daily_notifications: 10,
            quiet_start: hm(22, 0),
            quiet_end: hm(8, 0),
            intervals: ReminderIntervals::default(),
            todo_reminders_enabled: true,
            daily_summary_enabled: true,
            daily_summary_time: hm(8, 0),
            last_summary_date: None,
            last_todo_message: None,
        }
    }

    /// Whether `at` falls inside the quiet window. The window may wrap midnight;
    /// an empty window (start == end) is never quiet.
    pub fn is_quiet_hours(&self, at: NaiveDateTime) -> bool {
        let current = minute_of_day(at.time());
        let start = minute_of_day(self.quiet_start);
        let end = minute_of_day(self.quiet_end);

        if start > end {
            current >= start || current < end
        } else {
            current >= start && current < end
        }
    }

    /// Whether another todo batch would exceed the daily cap.
    pub fn daily_cap_reached(&self, sent_today: u32) -> bool {
        self.max_daily_notifications > 0 && sent_today >= self.max_daily_notifications
    }

    /// The summary goes out once per day, at or after the configured time.
    pub fn should_send_daily_summary(&self, now: NaiveDateTime) -> bool {
        if !self.daily_summary_enabled {
            return false;
        }
        if self
            .last_summary_date
            .is_some_and(|last| last >= now.date())
        {
            return false;
        }
        now.time() >= self.daily_summary_time
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

//=========================================================================================
// Intents
//=========================================================================================

/// What the natural-language layer understood from a free-form message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    CreateReminder {
        message: String,
        remind_at: NaiveDateTime,
        #[serde(default)]
        recurrence_rule: Option<String>,
    },
    CreateEvent {
        title: String,
        #[serde(default)]
        description: Option<String>,
        dtstart: NaiveDateTime,
        #[serde(default)]
        duration_minutes: u32,
        #[serde(default)]
        notify_before_minutes: Option<u32>,
        #[serde(default)]
        recurrence_rule: Option<String>,
    },
    CreateTodo {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        due_time: Option<NaiveDateTime>,
        #[serde(default)]
        priority: Option<u8>,
    },
    /// Nothing to create; answer the user with this text instead.
    Reply { text: String },
}
