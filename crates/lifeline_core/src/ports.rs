//! crates/lifeline_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store, chat transport, and intent parser.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;

use crate::domain::{
    Balance, Event, Intent, LedgerEntry, Memo, MessageHandle, NewEvent, NewLedgerEntry, NewMemo,
    NewReminder, NewTodo, Reminder, Todo, UserId, UserSettings,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Repository Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Enabled, unacknowledged reminders with `remind_at <= now` that were never
    /// notified or were last notified at or before `cooldown_cutoff`.
    async fn fetch_due_reminders(
        &self,
        now: NaiveDateTime,
        cooldown_cutoff: NaiveDateTime,
    ) -> PortResult<Vec<Reminder>>;

    async fn get_reminder(&self, id: i64) -> PortResult<Reminder>;

    async fn create_reminder(&self, reminder: NewReminder) -> PortResult<Reminder>;

    /// A user's reminders, enabled first, then by `remind_at`.
    async fn list_reminders(&self, user_id: UserId) -> PortResult<Vec<Reminder>>;

    /// Records a delivery: sets `notified_at` and the message handle in one update.
    async fn mark_reminder_notified(
        &self,
        id: i64,
        at: NaiveDateTime,
        handle: MessageHandle,
    ) -> PortResult<()>;

    /// Final acknowledgement: sets `acknowledged_at` and disables the reminder
    /// in one update.
    async fn complete_reminder(&self, id: i64, at: NaiveDateTime) -> PortResult<()>;

    /// Moves `remind_at` and clears `notified_at`, `acknowledged_at` and the
    /// message handle in one update.
    async fn reschedule_reminder(&self, id: i64, remind_at: NaiveDateTime) -> PortResult<()>;

    async fn set_reminder_enabled(&self, id: i64, enabled: bool) -> PortResult<()>;

    async fn delete_reminder(&self, id: i64) -> PortResult<()>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Events whose lead window contains `now` and that have not been announced.
    async fn fetch_events_pending_notification(&self, now: NaiveDateTime) -> PortResult<Vec<Event>>;

    /// Events whose `next_occurrence` is at or before `now`.
    async fn fetch_elapsed_events(&self, now: NaiveDateTime) -> PortResult<Vec<Event>>;

    async fn set_event_notified(&self, id: i64, at: NaiveDateTime) -> PortResult<()>;

    /// Sets (or clears) the pending occurrence and clears `notified_at` in one update.
    async fn set_event_next_occurrence(&self, id: i64, next: Option<NaiveDateTime>) -> PortResult<()>;

    async fn create_event(&self, event: NewEvent) -> PortResult<Event>;

    /// A user's events that still have a pending occurrence, soonest first.
    async fn list_upcoming_events(&self, user_id: UserId) -> PortResult<Vec<Event>>;

    /// A user's events whose pending occurrence (or anchor, once cleared) lies in `[from, to)`.
    async fn events_between(
        &self,
        user_id: UserId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Vec<Event>>;
}

#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Incomplete todos with a due time, the only ones the backoff policy can select.
    async fn fetch_notifiable_todos(&self, user_id: UserId) -> PortResult<Vec<Todo>>;

    async fn batch_set_todo_last_notified(&self, ids: &[i64], at: NaiveDateTime) -> PortResult<()>;

    /// Incomplete todos, highest priority first, then earliest due.
    async fn list_open_todos(&self, user_id: UserId) -> PortResult<Vec<Todo>>;

    async fn create_todo(&self, todo: NewTodo) -> PortResult<Todo>;

    /// Fails with `NotFound` unless the todo exists, is open and belongs to `user_id`.
    async fn complete_todo(&self, user_id: UserId, id: i64, at: NaiveDateTime) -> PortResult<()>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_or_create_settings(&self, user_id: UserId) -> PortResult<UserSettings>;

    async fn get_settings(&self, user_id: UserId) -> PortResult<UserSettings>;

    async fn update_settings(&self, settings: &UserSettings) -> PortResult<()>;

    async fn users_with_todo_reminders(&self) -> PortResult<Vec<UserId>>;

    async fn users_with_daily_summary(&self) -> PortResult<Vec<UserId>>;

    async fn daily_notification_count(&self, user_id: UserId, day: NaiveDate) -> PortResult<u32>;

    async fn increment_daily_notification_count(&self, user_id: UserId, day: NaiveDate) -> PortResult<()>;

    async fn set_last_todo_message(&self, user_id: UserId, handle: Option<MessageHandle>) -> PortResult<()>;

    async fn set_last_summary_date(&self, user_id: UserId, day: NaiveDate) -> PortResult<()>;
}

#[async_trait]
pub trait MemoRepository: Send + Sync {
    async fn create_memo(&self, memo: NewMemo) -> PortResult<Memo>;

    /// The `limit` most recent memos, newest first.
    async fn list_recent_memos(&self, user_id: UserId, limit: u32) -> PortResult<Vec<Memo>>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn record_entry(&self, entry: NewLedgerEntry) -> PortResult<LedgerEntry>;

    /// Income and expense totals for entries dated in `[from, to)`.
    async fn totals_between(
        &self,
        user_id: UserId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Balance>;
}

/// Every repository, shared by the scheduler and the command layer.
#[derive(Clone)]
pub struct Repositories {
    pub reminders: Arc<dyn ReminderRepository>,
    pub events: Arc<dyn EventRepository>,
    pub todos: Arc<dyn TodoRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub memos: Arc<dyn MemoRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
}

impl Repositories {
    /// Uses one store for every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ReminderRepository
            + EventRepository
            + TodoRepository
            + SettingsRepository
            + MemoRepository
            + LedgerRepository
            + 'static,
    {
        Self {
            reminders: store.clone(),
            events: store.clone(),
            todos: store.clone(),
            settings: store.clone(),
            memos: store.clone(),
            ledger: store,
        }
    }
}

//=========================================================================================
// Transport, Intent and Clock Ports
//=========================================================================================

/// An inline button attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAction {
    pub label: String,
    pub callback_data: String,
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub actions: Vec<MessageAction>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        self.actions.push(MessageAction {
            label: label.into(),
            callback_data: callback_data.into(),
        });
        self
    }
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Delivers a message and returns the handle needed to retract it.
    async fn send_message(&self, recipient: UserId, message: &OutboundMessage) -> PortResult<MessageHandle>;

    /// Best-effort removal of an earlier delivery.
    async fn retract_message(&self, recipient: UserId, handle: MessageHandle) -> PortResult<()>;
}

/// Conversational replies outside the notification flow: plain answers, edits of
/// an earlier message, and acknowledgement of a pressed button.
#[async_trait]
pub trait ChatChannel: NotificationTransport {
    async fn send_text(&self, recipient: UserId, text: &str) -> PortResult<MessageHandle> {
        self.send_message(recipient, &OutboundMessage::text(text)).await
    }

    /// Replaces the text of an earlier message and drops its buttons.
    async fn edit_text(&self, recipient: UserId, handle: MessageHandle, text: &str) -> PortResult<()>;

    /// Stops the pending indicator on a pressed button, optionally with a toast.
    async fn answer_action(&self, action_id: &str, toast: Option<&str>) -> PortResult<()>;
}

#[async_trait]
pub trait IntentParser: Send + Sync {
    /// Extracts a structured intent from free text, resolving relative dates against `now`.
    async fn parse_intent(&self, text: &str, now: NaiveDateTime) -> PortResult<Intent>;
}

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The deployment's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
