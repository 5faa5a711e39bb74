//! crates/lifeline_core/src/scheduler/mod.rs
//!
//! The notification scheduler: a single long-running task that wakes on a fixed
//! interval or an external trigger and runs one pass per entity kind.

mod events;
mod reminders;
mod summary;
mod todos;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::advance::OccurrenceAdvancer;
use crate::dispatch::NotificationDispatcher;
use crate::format::NotificationFormatter;
use crate::ports::{Clock, NotificationTransport, Repositories};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between regular passes.
    pub check_interval: Duration,
    /// Delay before the first pass after startup.
    pub startup_grace: Duration,
    /// Minimum gap between repeated deliveries of an unacknowledged reminder.
    pub reminder_cooldown: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            startup_grace: Duration::from_secs(2),
            reminder_cooldown: Duration::from_secs(60),
        }
    }
}

/// Tallies of what one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub reminders_sent: usize,
    pub events_notified: usize,
    pub events_advanced: usize,
    pub todo_batches: usize,
    pub summaries_sent: usize,
    pub failures: usize,
}

/// Cheap, cloneable handle used by command handlers to request an immediate pass.
#[derive(Clone)]
pub struct SchedulerHandle {
    trigger: Arc<Notify>,
}

impl SchedulerHandle {
    /// Never blocks. A burst of triggers collapses into at most one extra pass.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }
}

pub struct Scheduler {
    repos: Repositories,
    dispatcher: NotificationDispatcher,
    advancer: OccurrenceAdvancer,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    trigger: Arc<Notify>,
    cycles: AtomicU64,
}

impl Scheduler {
    pub fn new(
        repos: Repositories,
        transport: Arc<dyn NotificationTransport>,
        formatter: Arc<dyn NotificationFormatter>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let advancer = OccurrenceAdvancer::new(repos.reminders.clone(), repos.events.clone());
        Self {
            dispatcher: NotificationDispatcher::new(transport, formatter),
            advancer,
            repos,
            clock,
            config,
            trigger: Arc::new(Notify::new()),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            trigger: self.trigger.clone(),
        }
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Runs until `cancel` fires. Cancellation is observed while waiting; a pass
    /// that has started always completes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            "Scheduler starting"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Scheduler cancelled during startup grace period");
                return;
            }
            _ = tokio::time::sleep(self.config.startup_grace) => {}
        }

        let mut ticker = interval_at(
            Instant::now() + self.config.check_interval,
            self.config.check_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.run_cycle().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => debug!("Scheduler tick"),
                _ = self.trigger.notified() => debug!("Scheduler triggered"),
            }
            self.run_cycle().await;
        }

        info!("Scheduler stopped");
    }

    /// One full pass: reminders, events, todos, then daily summaries.
    pub async fn run_cycle(&self) -> CycleReport {
        let now = self.clock.now();
        let mut report = CycleReport::default();

        self.check_reminders(now, &mut report).await;
        self.check_events(now, &mut report).await;
        self.check_todos(now, &mut report).await;
        self.check_daily_summaries(now, &mut report).await;

        self.cycles.fetch_add(1, Ordering::Relaxed);
        if report != CycleReport::default() {
            info!(?report, "Scheduler pass finished");
        } else {
            debug!("Scheduler pass finished with nothing to do");
        }
        report
    }
}
