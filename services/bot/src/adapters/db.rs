//! services/bot/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! six repository ports from the `core` crate. It handles all interactions with
//! the PostgreSQL database using `sqlx`.
//!
//! Every scheduler-facing write is a single statement so command handlers running
//! concurrently with the scheduler never observe a half-applied transition.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lifeline_core::domain::{
    Balance, EntryKind, Event, LedgerEntry, Memo, MessageHandle, NewEvent, NewLedgerEntry,
    NewMemo, NewReminder, NewTodo, Reminder, ReminderIntervals, Todo, UserId, UserSettings,
};
use lifeline_core::ports::{
    EventRepository, LedgerRepository, MemoRepository, PortError, PortResult,
    ReminderRepository, SettingsRepository, TodoRepository,
};
use sqlx::postgres::PgQueryResult;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every repository port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn db_err(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

/// Turns an update that touched no rows into `NotFound`.
fn expect_row(result: PgQueryResult, what: impl FnOnce() -> String) -> PortResult<()> {
    if result.rows_affected() == 0 {
        Err(PortError::NotFound(what()))
    } else {
        Ok(())
    }
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReminderRecord {
    id: i64,
    user_id: i64,
    enabled: bool,
    message: String,
    description: Option<String>,
    recurrence_rule: Option<String>,
    dtstart: Option<NaiveDateTime>,
    remind_at: Option<NaiveDateTime>,
    notified_at: Option<NaiveDateTime>,
    acknowledged_at: Option<NaiveDateTime>,
    last_message_id: Option<i64>,
    created_at: NaiveDateTime,
}
impl ReminderRecord {
    fn to_domain(self) -> Reminder {
        Reminder {
            id: self.id,
            user_id: UserId(self.user_id),
            enabled: self.enabled,
            message: self.message,
            description: self.description,
            recurrence_rule: self.recurrence_rule,
            dtstart: self.dtstart,
            remind_at: self.remind_at,
            notified_at: self.notified_at,
            acknowledged_at: self.acknowledged_at,
            last_message: self.last_message_id.map(MessageHandle),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct EventRecord {
    id: i64,
    user_id: i64,
    title: String,
    description: Option<String>,
    dtstart: NaiveDateTime,
    duration_minutes: i32,
    recurrence_rule: Option<String>,
    next_occurrence: Option<NaiveDateTime>,
    notify_before_minutes: i32,
    notified_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}
impl EventRecord {
    fn to_domain(self) -> Event {
        Event {
            id: self.id,
            user_id: UserId(self.user_id),
            title: self.title,
            description: self.description,
            dtstart: self.dtstart,
            duration_minutes: non_negative(self.duration_minutes),
            recurrence_rule: self.recurrence_rule,
            next_occurrence: self.next_occurrence,
            notify_before_minutes: non_negative(self.notify_before_minutes),
            notified_at: self.notified_at,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TodoRecord {
    id: i64,
    user_id: i64,
    title: String,
    description: Option<String>,
    priority: i16,
    due_time: Option<NaiveDateTime>,
    completed_at: Option<NaiveDateTime>,
    last_notified_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}
impl TodoRecord {
    fn to_domain(self) -> Todo {
        Todo {
            id: self.id,
            user_id: UserId(self.user_id),
            title: self.title,
            description: self.description,
            priority: self.priority.clamp(1, 5) as u8,
            due_time: self.due_time,
            completed_at: self.completed_at,
            last_notified_at: self.last_notified_at,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SettingsRecord {
    user_id: i64,
    max_daily_notifications: i32,
    quiet_start: NaiveTime,
    quiet_end: NaiveTime,
    reminder_intervals: Json<ReminderIntervals>,
    todo_reminders_enabled: bool,
    daily_summary_enabled: bool,
    daily_summary_time: NaiveTime,
    last_summary_date: Option<NaiveDate>,
    last_todo_message_id: Option<i64>,
}
impl SettingsRecord {
    fn to_domain(self) -> UserSettings {
        UserSettings {
            user_id: UserId(self.user_id),
            max_daily_notifications: non_negative(self.max_daily_notifications),
            quiet_start: self.quiet_start,
            quiet_end: self.quiet_end,
            intervals: self.reminder_intervals.0,
            todo_reminders_enabled: self.todo_reminders_enabled,
            daily_summary_enabled: self.daily_summary_enabled,
            daily_summary_time: self.daily_summary_time,
            last_summary_date: self.last_summary_date,
            last_todo_message: self.last_todo_message_id.map(MessageHandle),
        }
    }
}

#[derive(FromRow)]
struct MemoRecord {
    id: i64,
    user_id: i64,
    content: String,
    created_at: NaiveDateTime,
}
impl MemoRecord {
    fn to_domain(self) -> Memo {
        Memo {
            id: self.id,
            user_id: UserId(self.user_id),
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LedgerRecord {
    id: i64,
    user_id: i64,
    kind: String,
    amount_cents: i64,
    description: Option<String>,
    occurred_at: NaiveDateTime,
    created_at: NaiveDateTime,
}
impl LedgerRecord {
    fn to_domain(self) -> PortResult<LedgerEntry> {
        let kind = EntryKind::parse(&self.kind)
            .ok_or_else(|| PortError::Unexpected(format!("unknown ledger kind '{}'", self.kind)))?;
        Ok(LedgerEntry {
            id: self.id,
            user_id: UserId(self.user_id),
            kind,
            amount_cents: self.amount_cents,
            description: self.description,
            occurred_at: self.occurred_at,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `ReminderRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReminderRepository for PgStore {
    async fn fetch_due_reminders(
        &self,
        now: NaiveDateTime,
        cooldown_cutoff: NaiveDateTime,
    ) -> PortResult<Vec<Reminder>> {
        let records = sqlx::query_as::<_, ReminderRecord>(
            "SELECT * FROM reminders
             WHERE enabled
               AND remind_at IS NOT NULL
               AND remind_at <= $1
               AND acknowledged_at IS NULL
               AND (notified_at IS NULL OR notified_at <= $2)
             ORDER BY remind_at, id",
        )
        .bind(now)
        .bind(cooldown_cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(ReminderRecord::to_domain).collect())
    }

    async fn get_reminder(&self, id: i64) -> PortResult<Reminder> {
        sqlx::query_as::<_, ReminderRecord>("SELECT * FROM reminders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(ReminderRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Reminder with id {}", id)))
    }

    async fn create_reminder(&self, reminder: NewReminder) -> PortResult<Reminder> {
        let record = sqlx::query_as::<_, ReminderRecord>(
            "INSERT INTO reminders (user_id, message, description, recurrence_rule, dtstart, remind_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(reminder.user_id.0)
        .bind(&reminder.message)
        .bind(&reminder.description)
        .bind(&reminder.recurrence_rule)
        .bind(reminder.dtstart)
        .bind(reminder.remind_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn list_reminders(&self, user_id: UserId) -> PortResult<Vec<Reminder>> {
        let records = sqlx::query_as::<_, ReminderRecord>(
            "SELECT * FROM reminders
             WHERE user_id = $1
             ORDER BY enabled DESC, remind_at ASC NULLS LAST, id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(ReminderRecord::to_domain).collect())
    }

    async fn mark_reminder_notified(
        &self,
        id: i64,
        at: NaiveDateTime,
        handle: MessageHandle,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE reminders SET notified_at = $2, last_message_id = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .bind(handle.0)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        expect_row(result, || format!("Reminder with id {}", id))
    }

    async fn complete_reminder(&self, id: i64, at: NaiveDateTime) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE reminders SET acknowledged_at = $2, enabled = FALSE WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        expect_row(result, || format!("Reminder with id {}", id))
    }

    async fn reschedule_reminder(&self, id: i64, remind_at: NaiveDateTime) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE reminders
             SET remind_at = $2, notified_at = NULL, acknowledged_at = NULL, last_message_id = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(remind_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        expect_row(result, || format!("Reminder with id {}", id))
    }

    async fn set_reminder_enabled(&self, id: i64, enabled: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE reminders SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        expect_row(result, || format!("Reminder with id {}", id))
    }

    async fn delete_reminder(&self, id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        expect_row(result, || format!("Reminder with id {}", id))
    }
}

//=========================================================================================
// `EventRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl EventRepository for PgStore {
    async fn fetch_events_pending_notification(&self, now: NaiveDateTime) -> PortResult<Vec<Event>> {
        let records = sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events
             WHERE next_occurrence IS NOT NULL
               AND notified_at IS NULL
               AND next_occurrence - make_interval(mins => notify_before_minutes) <= $1
               AND next_occurrence > $1
             ORDER BY next_occurrence, id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(EventRecord::to_domain).collect())
    }

    async fn fetch_elapsed_events(&self, now: NaiveDateTime) -> PortResult<Vec<Event>> {
        let records = sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events
             WHERE next_occurrence IS NOT NULL AND next_occurrence <= $1
             ORDER BY next_occurrence, id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(EventRecord::to_domain).collect())
    }

    async fn set_event_notified(&self, id: i64, at: NaiveDateTime) -> PortResult<()> {
        let result = sqlx::query("UPDATE events SET notified_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        expect_row(result, || format!("Event with id {}", id))
    }

    async fn set_event_next_occurrence(&self, id: i64, next: Option<NaiveDateTime>) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE events SET next_occurrence = $2, notified_at = NULL WHERE id = $1",
        )
        .bind(id)
        .bind(next)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        expect_row(result, || format!("Event with id {}", id))
    }

    async fn create_event(&self, event: NewEvent) -> PortResult<Event> {
        let record = sqlx::query_as::<_, EventRecord>(
            "INSERT INTO events
                (user_id, title, description, dtstart, duration_minutes, recurrence_rule,
                 next_occurrence, notify_before_minutes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(event.user_id.0)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.dtstart)
        .bind(to_i32(event.duration_minutes))
        .bind(&event.recurrence_rule)
        .bind(event.next_occurrence)
        .bind(to_i32(event.notify_before_minutes))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn list_upcoming_events(&self, user_id: UserId) -> PortResult<Vec<Event>> {
        let records = sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events
             WHERE user_id = $1 AND next_occurrence IS NOT NULL
             ORDER BY next_occurrence, id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(EventRecord::to_domain).collect())
    }

    async fn events_between(
        &self,
        user_id: UserId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Vec<Event>> {
        let records = sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events
             WHERE user_id = $1
               AND COALESCE(next_occurrence, dtstart) >= $2
               AND COALESCE(next_occurrence, dtstart) < $3
             ORDER BY COALESCE(next_occurrence, dtstart), id",
        )
        .bind(user_id.0)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(EventRecord::to_domain).collect())
    }
}

//=========================================================================================
// `TodoRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl TodoRepository for PgStore {
    async fn fetch_notifiable_todos(&self, user_id: UserId) -> PortResult<Vec<Todo>> {
        let records = sqlx::query_as::<_, TodoRecord>(
            "SELECT * FROM todos
             WHERE user_id = $1 AND completed_at IS NULL AND due_time IS NOT NULL
             ORDER BY due_time, priority DESC, id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(TodoRecord::to_domain).collect())
    }

    async fn batch_set_todo_last_notified(&self, ids: &[i64], at: NaiveDateTime) -> PortResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE todos SET last_notified_at = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_open_todos(&self, user_id: UserId) -> PortResult<Vec<Todo>> {
        let records = sqlx::query_as::<_, TodoRecord>(
            "SELECT * FROM todos
             WHERE user_id = $1 AND completed_at IS NULL
             ORDER BY priority DESC, due_time ASC NULLS LAST, id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(TodoRecord::to_domain).collect())
    }

    async fn create_todo(&self, todo: NewTodo) -> PortResult<Todo> {
        let record = sqlx::query_as::<_, TodoRecord>(
            "INSERT INTO todos (user_id, title, description, priority, due_time)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(todo.user_id.0)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(i16::from(todo.priority.clamp(1, 5)))
        .bind(todo.due_time)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn complete_todo(&self, user_id: UserId, id: i64, at: NaiveDateTime) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE todos SET completed_at = $3
             WHERE id = $1 AND user_id = $2 AND completed_at IS NULL",
        )
        .bind(id)
        .bind(user_id.0)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        expect_row(result, || format!("Open todo with id {}", id))
    }
}

//=========================================================================================
// `SettingsRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl SettingsRepository for PgStore {
    async fn get_or_create_settings(&self, user_id: UserId) -> PortResult<UserSettings> {
        sqlx::query("INSERT INTO user_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        self.get_settings(user_id).await
    }

    async fn get_settings(&self, user_id: UserId) -> PortResult<UserSettings> {
        sqlx::query_as::<_, SettingsRecord>("SELECT * FROM user_settings WHERE user_id = $1")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(SettingsRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Settings for user {}", user_id)))
    }

    async fn update_settings(&self, settings: &UserSettings) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_settings SET
                max_daily_notifications = $2,
                quiet_start = $3,
                quiet_end = $4,
                reminder_intervals = $5,
                todo_reminders_enabled = $6,
                daily_summary_enabled = $7,
                daily_summary_time = $8
             WHERE user_id = $1",
        )
        .bind(settings.user_id.0)
        .bind(to_i32(settings.max_daily_notifications))
        .bind(settings.quiet_start)
        .bind(settings.quiet_end)
        .bind(Json(settings.intervals))
        .bind(settings.todo_reminders_enabled)
        .bind(settings.daily_summary_enabled)
        .bind(settings.daily_summary_time)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        expect_row(result, || format!("Settings for user {}", settings.user_id))
    }

    async fn users_with_todo_reminders(&self) -> PortResult<Vec<UserId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM user_settings WHERE todo_reminders_enabled ORDER BY user_id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    async fn users_with_daily_summary(&self) -> PortResult<Vec<UserId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT user_id FROM user_settings WHERE daily_summary_enabled ORDER BY user_id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(ids.into_iter().map(UserId).collect())
    }

    async fn daily_notification_count(&self, user_id: UserId, day: NaiveDate) -> PortResult<u32> {
        let count: Option<i32> = sqlx::query_scalar(
            "SELECT count FROM daily_notification_count WHERE user_id = $1 AND day = $2",
        )
        .bind(user_id.0)
        .bind(day)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count.map(non_negative).unwrap_or(0))
    }

    async fn increment_daily_notification_count(&self, user_id: UserId, day: NaiveDate) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO daily_notification_count (user_id, day, count) VALUES ($1, $2, 1)
             ON CONFLICT (user_id, day)
             DO UPDATE SET count = daily_notification_count.count + 1",
        )
        .bind(user_id.0)
        .bind(day)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn set_last_todo_message(&self, user_id: UserId, handle: Option<MessageHandle>) -> PortResult<()> {
        let result = sqlx::query("UPDATE user_settings SET last_todo_message_id = $2 WHERE user_id = $1")
            .bind(user_id.0)
            .bind(handle.map(|h| h.0))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        expect_row(result, || format!("Settings for user {}", user_id))
    }

    async fn set_last_summary_date(&self, user_id: UserId, day: NaiveDate) -> PortResult<()> {
        let result = sqlx::query("UPDATE user_settings SET last_summary_date = $2 WHERE user_id = $1")
            .bind(user_id.0)
            .bind(day)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        expect_row(result, || format!("Settings for user {}", user_id))
    }
}

//=========================================================================================
// `MemoRepository` and `LedgerRepository` Trait Implementations
//=========================================================================================

#[async_trait]
impl MemoRepository for PgStore {
    async fn create_memo(&self, memo: NewMemo) -> PortResult<Memo> {
        let record = sqlx::query_as::<_, MemoRecord>(
            "INSERT INTO memos (user_id, content) VALUES ($1, $2) RETURNING *",
        )
        .bind(memo.user_id.0)
        .bind(&memo.content)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn list_recent_memos(&self, user_id: UserId, limit: u32) -> PortResult<Vec<Memo>> {
        let records = sqlx::query_as::<_, MemoRecord>(
            "SELECT * FROM memos WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(MemoRecord::to_domain).collect())
    }
}

#[async_trait]
impl LedgerRepository for PgStore {
    async fn record_entry(&self, entry: NewLedgerEntry) -> PortResult<LedgerEntry> {
        let record = sqlx::query_as::<_, LedgerRecord>(
            "INSERT INTO ledger_entries (user_id, kind, amount_cents, description, occurred_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(entry.user_id.0)
        .bind(entry.kind.as_str())
        .bind(entry.amount_cents)
        .bind(&entry.description)
        .bind(entry.occurred_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        record.to_domain()
    }

    async fn totals_between(
        &self,
        user_id: UserId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Balance> {
        let (income_cents, expense_cents): (i64, i64) = sqlx::query_as(
            "SELECT
                COALESCE(SUM(amount_cents) FILTER (WHERE kind = 'income'), 0)::BIGINT,
                COALESCE(SUM(amount_cents) FILTER (WHERE kind = 'expense'), 0)::BIGINT
             FROM ledger_entries
             WHERE user_id = $1 AND occurred_at >= $2 AND occurred_at < $3",
        )
        .bind(user_id.0)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(Balance {
            income_cents,
            expense_cents,
        })
    }
}
