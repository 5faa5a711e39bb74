//! Daily summary pass.

use chrono::{Duration, NaiveDateTime};
use tracing::{error, info, warn};

use super::{CycleReport, Scheduler};
use crate::domain::UserId;
use crate::format::DailySummary;
use crate::ports::PortResult;

impl Scheduler {
    pub(super) async fn check_daily_summaries(&self, now: NaiveDateTime, report: &mut CycleReport) {
        let users = match self.repos.settings.users_with_daily_summary().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Failed to list users with daily summary");
                report.failures += 1;
                return;
            }
        };

        for user_id in users {
            match self.send_summary_if_needed(user_id, now).await {
                Ok(true) => report.summaries_sent += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(%user_id, error = %e, "Daily summary failed for user");
                    report.failures += 1;
                }
            }
        }
    }

    async fn send_summary_if_needed(&self, user_id: UserId, now: NaiveDateTime) -> PortResult<bool> {
        let settings = self.repos.settings.get_settings(user_id).await?;
        if !settings.should_send_daily_summary(now) {
            return Ok(false);
        }

        let day_start = now.date().and_time(chrono::NaiveTime::MIN);
        let day_end = day_start + Duration::days(1);

        // A partial summary beats none.
        let events = self
            .repos
            .events
            .events_between(user_id, day_start, day_end)
            .await
            .unwrap_or_else(|e| {
                warn!(%user_id, error = %e, "Failed to load today's events for summary");
                Vec::new()
            });
        let todos = self
            .repos
            .todos
            .list_open_todos(user_id)
            .await
            .unwrap_or_else(|e| {
                warn!(%user_id, error = %e, "Failed to load todos for summary");
                Vec::new()
            });

        let summary = DailySummary {
            now,
            events: &events,
            todos: &todos,
        };
        self.dispatcher.send_daily_summary(user_id, &summary).await?;

        if let Err(e) = self.repos.settings.set_last_summary_date(user_id, now.date()).await {
            error!(%user_id, error = %e, "Failed to record daily summary date");
        }
        info!(%user_id, events = events.len(), todos = todos.len(), "Sent daily summary");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{NewEvent, NewTodo, UserId, UserSettings};
    use crate::format::TextFormatter;
    use crate::ports::{EventRepository, Repositories, TodoRepository};
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use crate::test_support::{at, InMemoryStore, ManualClock, RecordingTransport};
    use std::sync::Arc;

    const USER: UserId = UserId(11);

    #[tokio::test]
    async fn sends_once_per_day_after_configured_time() {
        let store = Arc::new(InMemoryStore::new());
        let mut settings = UserSettings::new_default(USER);
        settings.todo_reminders_enabled = false;
        store.put_settings(settings);

        store
            .create_event(NewEvent {
                user_id: USER,
                title: "dentist".into(),
                description: None,
                dtstart: at(2024, 6, 3, 15, 0),
                duration_minutes: 45,
                recurrence_rule: None,
                next_occurrence: Some(at(2024, 6, 3, 15, 0)),
                notify_before_minutes: 15,
            })
            .await
            .unwrap();
        store
            .create_event(NewEvent {
                user_id: USER,
                title: "next week".into(),
                description: None,
                dtstart: at(2024, 6, 10, 15, 0),
                duration_minutes: 0,
                recurrence_rule: None,
                next_occurrence: Some(at(2024, 6, 10, 15, 0)),
                notify_before_minutes: 15,
            })
            .await
            .unwrap();
        store
            .create_todo(NewTodo {
                user_id: USER,
                title: "renew passport".into(),
                description: None,
                priority: 5,
                due_time: Some(at(2024, 6, 2, 12, 0)),
            })
            .await
            .unwrap();

        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(at(2024, 6, 3, 7, 59)));
        let scheduler = Scheduler::new(
            Repositories::from_store(store.clone()),
            transport.clone(),
            Arc::new(TextFormatter),
            clock.clone(),
            SchedulerConfig::default(),
        );

        assert_eq!(scheduler.run_cycle().await.summaries_sent, 0);

        clock.set(at(2024, 6, 3, 8, 0));
        assert_eq!(scheduler.run_cycle().await.summaries_sent, 1);
        let text = transport.sent()[0].message.text.clone();
        assert!(text.contains("Good morning"));
        assert!(text.contains("• 15:00 dentist (45 min)"));
        assert!(!text.contains("next week"));
        assert!(text.contains("• renew passport ⭐ (overdue)"));
        assert_eq!(
            store.settings(USER).last_summary_date,
            Some(at(2024, 6, 3, 0, 0).date())
        );

        clock.set(at(2024, 6, 3, 20, 0));
        assert_eq!(scheduler.run_cycle().await.summaries_sent, 0);

        clock.set(at(2024, 6, 4, 8, 30));
        assert_eq!(scheduler.run_cycle().await.summaries_sent, 1);
    }
}
