//! Event pass: announce occurrences entering their lead window, then roll
//! elapsed occurrences forward.

use chrono::NaiveDateTime;
use tracing::{error, info};

use super::{CycleReport, Scheduler};

impl Scheduler {
    pub(super) async fn check_events(&self, now: NaiveDateTime, report: &mut CycleReport) {
        match self.repos.events.fetch_events_pending_notification(now).await {
            Ok(pending) => {
                for event in pending {
                    if let Err(e) = self.dispatcher.send_event(&event, now).await {
                        error!(event_id = event.id, user_id = %event.user_id, error = %e, "Failed to send event notification");
                        report.failures += 1;
                        continue;
                    }
                    if let Err(e) = self.advancer.event_notified(&event, now).await {
                        error!(event_id = event.id, error = %e, "Failed to mark event notified");
                        report.failures += 1;
                        continue;
                    }
                    info!(event_id = event.id, user_id = %event.user_id, "Sent event notification");
                    report.events_notified += 1;
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch pending event notifications");
                report.failures += 1;
            }
        }

        // Rollover runs whether or not the notification went out.
        let elapsed = match self.repos.events.fetch_elapsed_events(now).await {
            Ok(elapsed) => elapsed,
            Err(e) => {
                error!(error = %e, "Failed to fetch elapsed events");
                report.failures += 1;
                return;
            }
        };
        for event in elapsed {
            match self.advancer.roll_event_forward(&event, now).await {
                Ok(_) => report.events_advanced += 1,
                Err(e) => {
                    error!(event_id = event.id, error = %e, "Failed to advance event");
                    report.failures += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{NewEvent, UserId};
    use crate::format::TextFormatter;
    use crate::ports::{EventRepository, Repositories};
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use crate::test_support::{at, InMemoryStore, ManualClock, RecordingTransport};
    use chrono::{Duration, NaiveDateTime};
    use std::sync::Arc;

    fn new_event(rule: Option<&str>, start: NaiveDateTime) -> NewEvent {
        NewEvent {
            user_id: UserId(9),
            title: "team sync".into(),
            description: None,
            dtstart: start,
            duration_minutes: 30,
            recurrence_rule: rule.map(String::from),
            next_occurrence: Some(start),
            notify_before_minutes: 15,
        }
    }

    fn setup(now: NaiveDateTime) -> (Arc<InMemoryStore>, Arc<RecordingTransport>, Arc<ManualClock>, Scheduler) {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(now));
        let scheduler = Scheduler::new(
            Repositories::from_store(store.clone()),
            transport.clone(),
            Arc::new(TextFormatter),
            clock.clone(),
            SchedulerConfig::default(),
        );
        (store, transport, clock, scheduler)
    }

    #[tokio::test]
    async fn announces_once_inside_lead_window() {
        let (store, transport, clock, scheduler) = setup(at(2024, 1, 1, 9, 40));
        let event = store
            .create_event(new_event(Some("FREQ=WEEKLY"), at(2024, 1, 1, 10, 0)))
            .await
            .unwrap();

        assert_eq!(scheduler.run_cycle().await.events_notified, 0);

        clock.set(at(2024, 1, 1, 9, 45));
        assert_eq!(scheduler.run_cycle().await.events_notified, 1);
        assert!(transport.sent()[0].message.text.contains("team sync"));

        clock.set(at(2024, 1, 1, 9, 50));
        assert_eq!(scheduler.run_cycle().await.events_notified, 0);
        assert_eq!(store.event(event.id).notified_at, Some(at(2024, 1, 1, 9, 45)));
    }

    #[tokio::test]
    async fn missed_weekly_occurrence_rolls_forward_silently() {
        let (store, transport, _clock, scheduler) = setup(at(2024, 1, 1, 10, 10));
        let event = store
            .create_event(new_event(Some("FREQ=WEEKLY"), at(2024, 1, 1, 10, 0)))
            .await
            .unwrap();

        let report = scheduler.run_cycle().await;
        assert_eq!(report.events_notified, 0);
        assert_eq!(report.events_advanced, 1);
        assert!(transport.sent().is_empty());

        let stored = store.event(event.id);
        assert_eq!(stored.next_occurrence, Some(at(2024, 1, 8, 10, 0)));
        assert_eq!(stored.notified_at, None);
    }

    #[tokio::test]
    async fn notified_recurring_event_is_reset_for_next_week() {
        let (store, _transport, clock, scheduler) = setup(at(2024, 1, 1, 9, 50));
        let event = store
            .create_event(new_event(Some("FREQ=WEEKLY"), at(2024, 1, 1, 10, 0)))
            .await
            .unwrap();
        scheduler.run_cycle().await;
        assert!(store.event(event.id).notified_at.is_some());

        clock.advance(Duration::minutes(10));
        scheduler.run_cycle().await;
        let stored = store.event(event.id);
        assert_eq!(stored.next_occurrence, Some(at(2024, 1, 8, 10, 0)));
        assert_eq!(stored.notified_at, None);
    }

    #[tokio::test]
    async fn one_shot_event_is_cleared_after_it_starts() {
        let (store, _transport, _clock, scheduler) = setup(at(2024, 1, 1, 10, 0));
        let event = store
            .create_event(new_event(None, at(2024, 1, 1, 10, 0)))
            .await
            .unwrap();
        scheduler.run_cycle().await;
        assert_eq!(store.event(event.id).next_occurrence, None);
    }

    #[tokio::test]
    async fn notify_failure_still_allows_rollover() {
        let (store, _transport, _clock, scheduler) = setup(at(2024, 1, 1, 10, 10));
        store.fail_on("fetch_events_pending_notification");
        let event = store
            .create_event(new_event(Some("FREQ=DAILY"), at(2024, 1, 1, 10, 0)))
            .await
            .unwrap();

        let report = scheduler.run_cycle().await;
        assert_eq!(report.failures, 1);
        assert_eq!(report.events_advanced, 1);
        assert_eq!(store.event(event.id).next_occurrence, Some(at(2024, 1, 2, 10, 0)));
    }
}
