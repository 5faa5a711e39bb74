pub mod advance;
pub mod backoff;
pub mod dispatch;
pub mod domain;
pub mod due;
pub mod format;
pub mod ports;
pub mod rrule;
pub mod scheduler;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use advance::{AckOutcome, OccurrenceAdvancer};
pub use backoff::UrgencyZone;
pub use dispatch::NotificationDispatcher;
pub use domain::{
    Balance, EntryKind, Event, Intent, LedgerEntry, Memo, MessageHandle, NewEvent,
    NewLedgerEntry, NewMemo, NewReminder, NewTodo, Reminder, ReminderIntervals, ReminderState,
    Todo, UserId, UserSettings,
};
pub use format::{NotificationFormatter, TextFormatter};
pub use ports::{
    ChatChannel, Clock, EventRepository, IntentParser, LedgerRepository, MemoRepository,
    MessageAction, NotificationTransport, OutboundMessage, PortError, PortResult,
    ReminderRepository, Repositories, SettingsRepository, SystemClock, TodoRepository,
};
pub use scheduler::{CycleReport, Scheduler, SchedulerConfig, SchedulerHandle};
