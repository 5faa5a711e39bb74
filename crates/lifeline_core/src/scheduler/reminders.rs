//! Reminder pass.

use chrono::{Duration, NaiveDateTime};
use tracing::{error, info};

use super::{CycleReport, Scheduler};

impl Scheduler {
    pub(super) async fn check_reminders(&self, now: NaiveDateTime, report: &mut CycleReport) {
        let cooldown =
            Duration::from_std(self.config.reminder_cooldown).unwrap_or_else(|_| Duration::minutes(1));

        let due = match self
            .repos
            .reminders
            .fetch_due_reminders(now, now - cooldown)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to fetch due reminders");
                report.failures += 1;
                return;
            }
        };

        for reminder in due {
            let handle = match self.dispatcher.send_reminder(&reminder).await {
                Ok(handle) => handle,
                Err(e) => {
                    error!(reminder_id = reminder.id, user_id = %reminder.user_id, error = %e, "Failed to send reminder");
                    report.failures += 1;
                    continue;
                }
            };

            if let Err(e) = self.advancer.reminder_notified(&reminder, handle, now).await {
                error!(reminder_id = reminder.id, error = %e, "Failed to record reminder delivery");
                report.failures += 1;
                continue;
            }

            info!(reminder_id = reminder.id, user_id = %reminder.user_id, "Sent reminder");
            report.reminders_sent += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::advance::AckOutcome;
    use crate::domain::{NewReminder, ReminderState, UserId};
    use crate::format::TextFormatter;
    use crate::ports::{ReminderRepository, Repositories};
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use crate::test_support::{at, InMemoryStore, ManualClock, RecordingTransport};
    use chrono::Duration;
    use std::sync::Arc;

    struct Harness {
        store: Arc<InMemoryStore>,
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
        scheduler: Scheduler,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(at(2024, 1, 1, 9, 0)));
        let scheduler = Scheduler::new(
            Repositories::from_store(store.clone()),
            transport.clone(),
            Arc::new(TextFormatter),
            clock.clone(),
            SchedulerConfig::default(),
        );
        Harness { store, transport, clock, scheduler }
    }

    #[tokio::test]
    async fn one_shot_reminder_nags_until_acknowledged() {
        let h = harness();
        let reminder = h
            .store
            .create_reminder(NewReminder {
                user_id: UserId(1),
                message: "pay rent".into(),
                description: None,
                recurrence_rule: None,
                dtstart: None,
                remind_at: Some(at(2024, 1, 1, 8, 0)),
            })
            .await
            .unwrap();

        let report = h.scheduler.run_cycle().await;
        assert_eq!(report.reminders_sent, 1);
        let stored = h.store.reminder(reminder.id);
        assert_eq!(stored.notified_at, Some(at(2024, 1, 1, 9, 0)));
        assert!(stored.enabled);
        let first_handle = stored.last_message.unwrap();
        assert_eq!(h.transport.sent()[0].recipient, UserId(1));
        assert_eq!(h.transport.sent()[0].handle, first_handle);

        // Within the cooldown nothing is re-sent.
        h.clock.advance(Duration::seconds(30));
        assert_eq!(h.scheduler.run_cycle().await.reminders_sent, 0);

        // After it, the old message is retracted and a new one sent.
        h.clock.advance(Duration::seconds(30));
        assert_eq!(h.scheduler.run_cycle().await.reminders_sent, 1);
        assert_eq!(h.transport.retracted(), vec![(UserId(1), first_handle)]);
        assert_eq!(h.transport.sent().len(), 2);

        let outcome = h
            .scheduler
            .advancer
            .acknowledge_reminder(&h.store.reminder(reminder.id), at(2024, 1, 1, 9, 5))
            .await
            .unwrap();
        assert_eq!(outcome, AckOutcome::Disabled);
        assert!(!h.store.reminder(reminder.id).enabled);

        h.clock.advance(Duration::hours(1));
        assert_eq!(h.scheduler.run_cycle().await.reminders_sent, 0);
    }

    #[tokio::test]
    async fn recurring_reminder_reschedules_on_acknowledgement() {
        let h = harness();
        let reminder = h
            .store
            .create_reminder(NewReminder {
                user_id: UserId(1),
                message: "vitamins".into(),
                description: None,
                recurrence_rule: Some("FREQ=DAILY".into()),
                dtstart: Some(at(2024, 1, 1, 9, 0)),
                remind_at: Some(at(2024, 1, 1, 9, 0)),
            })
            .await
            .unwrap();

        h.clock.set(at(2024, 1, 2, 9, 0));
        h.store
            .reschedule_reminder(reminder.id, at(2024, 1, 2, 9, 0))
            .await
            .unwrap();
        h.scheduler.run_cycle().await;

        let outcome = h
            .scheduler
            .advancer
            .acknowledge_reminder(&h.store.reminder(reminder.id), at(2024, 1, 2, 9, 5))
            .await
            .unwrap();
        assert_eq!(outcome, AckOutcome::Rescheduled(at(2024, 1, 3, 9, 0)));

        let stored = h.store.reminder(reminder.id);
        assert_eq!(stored.remind_at, Some(at(2024, 1, 3, 9, 0)));
        assert_eq!(stored.notified_at, None);
        assert_eq!(stored.acknowledged_at, None);
        assert_eq!(stored.last_message, None);
        assert!(stored.enabled);
    }

    #[tokio::test]
    async fn failed_acknowledgement_keeps_the_chain_alive() {
        let h = harness();
        let reminder = h
            .store
            .create_reminder(NewReminder {
                user_id: UserId(1),
                message: "vitamins".into(),
                description: None,
                recurrence_rule: Some("FREQ=DAILY".into()),
                dtstart: Some(at(2024, 1, 1, 9, 0)),
                remind_at: Some(at(2024, 1, 1, 9, 0)),
            })
            .await
            .unwrap();
        assert_eq!(h.scheduler.run_cycle().await.reminders_sent, 1);

        h.store.fail_on("reschedule_reminder");
        let result = h
            .scheduler
            .advancer
            .acknowledge_reminder(&h.store.reminder(reminder.id), at(2024, 1, 1, 9, 5))
            .await;
        assert!(result.is_err());

        // Nothing was written, so the reminder keeps nagging and can be acknowledged again.
        let stored = h.store.reminder(reminder.id);
        assert_eq!(stored.state(), ReminderState::Notified);
        assert_eq!(stored.acknowledged_at, None);
        assert_eq!(stored.remind_at, Some(at(2024, 1, 1, 9, 0)));

        h.clock.set(at(2024, 1, 1, 9, 10));
        assert_eq!(h.scheduler.run_cycle().await.reminders_sent, 1);

        h.store.recover("reschedule_reminder");
        let outcome = h
            .scheduler
            .advancer
            .acknowledge_reminder(&h.store.reminder(reminder.id), at(2024, 1, 1, 9, 12))
            .await
            .unwrap();
        assert_eq!(outcome, AckOutcome::Rescheduled(at(2024, 1, 2, 9, 0)));

        for day in 2..=4 {
            h.clock.set(at(2024, 1, day, 9, 0));
            assert_eq!(h.scheduler.run_cycle().await.reminders_sent, 1, "day {day}");
            let current = h.store.reminder(reminder.id);
            h.scheduler
                .advancer
                .acknowledge_reminder(&current, at(2024, 1, day, 9, 1))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn failed_completion_leaves_one_shot_enabled() {
        let h = harness();
        let reminder = h
            .store
            .create_reminder(NewReminder {
                user_id: UserId(1),
                message: "call back".into(),
                description: None,
                recurrence_rule: None,
                dtstart: None,
                remind_at: Some(at(2024, 1, 1, 8, 0)),
            })
            .await
            .unwrap();
        h.scheduler.run_cycle().await;

        h.store.fail_on("complete_reminder");
        assert!(h
            .scheduler
            .advancer
            .acknowledge_reminder(&h.store.reminder(reminder.id), at(2024, 1, 1, 9, 1))
            .await
            .is_err());
        let stored = h.store.reminder(reminder.id);
        assert!(stored.enabled);
        assert_eq!(stored.state(), ReminderState::Notified);
    }

    #[tokio::test]
    async fn failed_retraction_does_not_block_delivery() {
        let h = harness();
        let reminder = h
            .store
            .create_reminder(NewReminder {
                user_id: UserId(1),
                message: "stretch".into(),
                description: None,
                recurrence_rule: None,
                dtstart: None,
                remind_at: Some(at(2024, 1, 1, 8, 0)),
            })
            .await
            .unwrap();
        h.scheduler.run_cycle().await;

        h.transport.fail_retracts(true);
        h.clock.advance(Duration::minutes(2));
        assert_eq!(h.scheduler.run_cycle().await.reminders_sent, 1);
        assert_ne!(h.store.reminder(reminder.id).last_message, None);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let h = harness();
        for message in ["a", "b"] {
            h.store
                .create_reminder(NewReminder {
                    user_id: UserId(1),
                    message: message.into(),
                    description: None,
                    recurrence_rule: None,
                    dtstart: None,
                    remind_at: Some(at(2024, 1, 1, 8, 0)),
                })
                .await
                .unwrap();
        }
        h.store.fail_on("mark_reminder_notified");

        let report = h.scheduler.run_cycle().await;
        assert_eq!(report.reminders_sent, 0);
        assert_eq!(report.failures, 2);
        assert_eq!(h.transport.sent().len(), 2);
    }
}
