//! An `AppState` wired to the in-memory port doubles.

use chrono::NaiveDateTime;
use lifeline_core::test_support::{InMemoryStore, ManualClock, RecordingTransport};
use lifeline_core::{OccurrenceAdvancer, Repositories, Scheduler, SchedulerConfig, TextFormatter};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::web::{session::SessionStore, state::AppState};

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<InMemoryStore>,
    pub chat: Arc<RecordingTransport>,
    pub clock: Arc<ManualClock>,
    pub scheduler: Scheduler,
}

impl TestApp {
    pub fn new(now: NaiveDateTime) -> Self {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/lifeline_test".to_string()),
            "TELEGRAM_TOKEN" => Some("1:test".to_string()),
            _ => None,
        })
        .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let chat = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(now));
        let repos = Repositories::from_store(store.clone());
        let scheduler = Scheduler::new(
            repos.clone(),
            chat.clone(),
            Arc::new(TextFormatter),
            clock.clone(),
            SchedulerConfig::default(),
        );

        let state = Arc::new(AppState {
            advancer: OccurrenceAdvancer::new(repos.reminders.clone(), repos.events.clone()),
            repos,
            chat: chat.clone(),
            intents: None,
            sessions: Arc::new(SessionStore::new(Duration::from_secs(600))),
            scheduler: scheduler.handle(),
            clock: clock.clone(),
            config: Arc::new(config),
        });

        Self {
            state,
            store,
            chat,
            clock,
            scheduler,
        }
    }
}
