//! Todo pass: one combined, backoff-filtered message per user.

use chrono::NaiveDateTime;
use tracing::{debug, error, info};

use super::{CycleReport, Scheduler};
use crate::backoff;
use crate::domain::UserId;
use crate::ports::PortResult;

impl Scheduler {
    pub(super) async fn check_todos(&self, now: NaiveDateTime, report: &mut CycleReport) {
        let users = match self.repos.settings.users_with_todo_reminders().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Failed to list users with todo reminders");
                report.failures += 1;
                return;
            }
        };

        for user_id in users {
            match self.notify_user_todos(user_id, now).await {
                Ok(true) => report.todo_batches += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(%user_id, error = %e, "Todo pass failed for user");
                    report.failures += 1;
                }
            }
        }
    }

    /// Returns whether a batch went out.
    async fn notify_user_todos(&self, user_id: UserId, now: NaiveDateTime) -> PortResult<bool> {
        let settings = self.repos.settings.get_settings(user_id).await?;
        if settings.is_quiet_hours(now) {
            debug!(%user_id, "Quiet hours; skipping todos");
            return Ok(false);
        }

        let sent_today = self
            .repos
            .settings
            .daily_notification_count(user_id, now.date())
            .await?;
        if settings.daily_cap_reached(sent_today) {
            debug!(%user_id, sent_today, "Daily notification cap reached");
            return Ok(false);
        }

        let todos = self.repos.todos.fetch_notifiable_todos(user_id).await?;
        let batch: Vec<_> = todos
            .into_iter()
            .filter_map(|todo| {
                let (notify, zone) = backoff::should_notify(
                    todo.due_time,
                    todo.last_notified_at,
                    todo.priority,
                    &settings.intervals,
                    now,
                );
                match (notify, zone) {
                    (true, Some(zone)) => Some((todo, zone)),
                    _ => None,
                }
            })
            .collect();
        if batch.is_empty() {
            return Ok(false);
        }

        let handle = self
            .dispatcher
            .send_todo_batch(user_id, settings.last_todo_message, &batch, now)
            .await?;

        // The message is out; bookkeeping failures are logged but do not undo it.
        let ids: Vec<i64> = batch.iter().map(|(todo, _)| todo.id).collect();
        if let Err(e) = self.repos.todos.batch_set_todo_last_notified(&ids, now).await {
            error!(%user_id, error = %e, "Failed to update last_notified_at for todos");
        }
        if let Err(e) = self.repos.settings.set_last_todo_message(user_id, Some(handle)).await {
            error!(%user_id, error = %e, "Failed to store last todo message");
        }
        if let Err(e) = self
            .repos
            .settings
            .increment_daily_notification_count(user_id, now.date())
            .await
        {
            error!(%user_id, error = %e, "Failed to increment daily notification count");
        }

        info!(%user_id, items = ids.len(), %handle, "Sent todo reminder");
        Ok(true)
    }
}
