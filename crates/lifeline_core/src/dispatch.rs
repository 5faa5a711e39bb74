//! crates/lifeline_core/src/dispatch.rs
//!
//! Formats due items and hands them to the transport.

use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backoff::UrgencyZone;
use crate::domain::{Event, MessageHandle, Reminder, Todo, UserId};
use crate::format::{DailySummary, NotificationFormatter};
use crate::ports::{NotificationTransport, PortResult};

#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    formatter: Arc<dyn NotificationFormatter>,
}

impl NotificationDispatcher {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        formatter: Arc<dyn NotificationFormatter>,
    ) -> Self {
        Self { transport, formatter }
    }

    /// Replaces the previous delivery of this reminder, if any, with a fresh one.
    pub async fn send_reminder(&self, reminder: &Reminder) -> PortResult<MessageHandle> {
        if let Some(previous) = reminder.last_message {
            self.retract_quietly(reminder.user_id, previous).await;
        }
        let message = self.formatter.reminder(reminder);
        self.transport.send_message(reminder.user_id, &message).await
    }

    pub async fn send_event(&self, event: &Event, now: NaiveDateTime) -> PortResult<MessageHandle> {
        let message = self.formatter.event(event, now);
        self.transport.send_message(event.user_id, &message).await
    }

    /// Sends one combined message for the batch, retracting the previous combined message first.
    pub async fn send_todo_batch(
        &self,
        user_id: UserId,
        previous: Option<MessageHandle>,
        todos: &[(Todo, UrgencyZone)],
        now: NaiveDateTime,
    ) -> PortResult<MessageHandle> {
        if let Some(previous) = previous {
            self.retract_quietly(user_id, previous).await;
        }
        let message = self.formatter.todo_batch(todos, now);
        self.transport.send_message(user_id, &message).await
    }

    pub async fn send_daily_summary(
        &self,
        user_id: UserId,
        summary: &DailySummary<'_>,
    ) -> PortResult<MessageHandle> {
        let message = self.formatter.daily_summary(summary);
        self.transport.send_message(user_id, &message).await
    }

    /// The message may already be gone; a failed retraction never blocks the new delivery.
    async fn retract_quietly(&self, user_id: UserId, handle: MessageHandle) {
        match self.transport.retract_message(user_id, handle).await {
            Ok(()) => debug!(%user_id, %handle, "Retracted previous message"),
            Err(e) => warn!(%user_id, %handle, error = %e, "Failed to retract previous message"),
        }
    }
}
