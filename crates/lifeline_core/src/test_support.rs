//! In-memory doubles for the ports, used to drive full scheduler cycles and the
//! chat handlers in tests.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use crate::domain::{
    Balance, EntryKind, Event, LedgerEntry, Memo, MessageHandle, NewEvent, NewLedgerEntry,
    NewMemo, NewReminder, NewTodo, Reminder, Todo, UserId, UserSettings,
};
use crate::due;
use crate::ports::{
    ChatChannel, Clock, EventRepository, LedgerRepository, MemoRepository, NotificationTransport,
    OutboundMessage, PortError, PortResult, ReminderRepository, SettingsRepository,
    TodoRepository,
};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

//=========================================================================================
// Store
//=========================================================================================

#[derive(Default)]
struct Tables {
    next_id: i64,
    reminders: BTreeMap<i64, Reminder>,
    events: BTreeMap<i64, Event>,
    todos: BTreeMap<i64, Todo>,
    settings: BTreeMap<UserId, UserSettings>,
    counts: HashMap<(UserId, NaiveDate), u32>,
    memos: BTreeMap<i64, Memo>,
    ledger: BTreeMap<i64, LedgerEntry>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<&'static str>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named repository method fail with `PortError::Unexpected`.
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    /// Undoes [`InMemoryStore::fail_on`].
    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    fn check(&self, op: &'static str) -> PortResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(PortError::Unexpected(format!("{op} failed")));
        }
        Ok(())
    }

    pub fn reminder(&self, id: i64) -> Reminder {
        self.tables.lock().unwrap().reminders[&id].clone()
    }

    pub fn event(&self, id: i64) -> Event {
        self.tables.lock().unwrap().events[&id].clone()
    }

    pub fn todo(&self, id: i64) -> Todo {
        self.tables.lock().unwrap().todos[&id].clone()
    }

    pub fn settings(&self, user_id: UserId) -> UserSettings {
        self.tables.lock().unwrap().settings[&user_id].clone()
    }

    pub fn put_settings(&self, settings: UserSettings) {
        self.tables
            .lock()
            .unwrap()
            .settings
            .insert(settings.user_id, settings);
    }

    pub fn count(&self, user_id: UserId, day: NaiveDate) -> u32 {
        self.tables
            .lock()
            .unwrap()
            .counts
            .get(&(user_id, day))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ReminderRepository for InMemoryStore {
    async fn fetch_due_reminders(
        &self,
        now: NaiveDateTime,
        cooldown_cutoff: NaiveDateTime,
    ) -> PortResult<Vec<Reminder>> {
        self.check("fetch_due_reminders")?;
        let cooldown = now - cooldown_cutoff;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .reminders
            .values()
            .filter(|r| due::reminder_is_due(r, now, cooldown))
            .cloned()
            .collect())
    }

    async fn get_reminder(&self, id: i64) -> PortResult<Reminder> {
        self.tables
            .lock()
            .unwrap()
            .reminders
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("reminder {id}")))
    }

    async fn create_reminder(&self, new: NewReminder) -> PortResult<Reminder> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.id();
        let reminder = Reminder {
            id,
            user_id: new.user_id,
            enabled: true,
            message: new.message,
            description: new.description,
            recurrence_rule: new.recurrence_rule,
            dtstart: new.dtstart,
            remind_at: new.remind_at,
            notified_at: None,
            acknowledged_at: None,
            last_message: None,
            created_at: NaiveDateTime::default(),
        };
        tables.reminders.insert(id, reminder.clone());
        Ok(reminder)
    }

    async fn list_reminders(&self, user_id: UserId) -> PortResult<Vec<Reminder>> {
        let mut reminders: Vec<Reminder> = self
            .tables
            .lock()
            .unwrap()
            .reminders
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reminders.sort_by(|a, b| {
            b.enabled
                .cmp(&a.enabled)
                .then(a.remind_at.is_none().cmp(&b.remind_at.is_none()))
                .then(a.remind_at.cmp(&b.remind_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(reminders)
    }

    async fn mark_reminder_notified(
        &self,
        id: i64,
        at: NaiveDateTime,
        handle: MessageHandle,
    ) -> PortResult<()> {
        self.check("mark_reminder_notified")?;
        self.with_reminder(id, |r| {
            r.notified_at = Some(at);
            r.last_message = Some(handle);
        })
    }

    async fn complete_reminder(&self, id: i64, at: NaiveDateTime) -> PortResult<()> {
        self.check("complete_reminder")?;
        self.with_reminder(id, |r| {
            r.acknowledged_at = Some(at);
            r.enabled = false;
        })
    }

    async fn reschedule_reminder(&self, id: i64, remind_at: NaiveDateTime) -> PortResult<()> {
        self.check("reschedule_reminder")?;
        self.with_reminder(id, |r| {
            r.remind_at = Some(remind_at);
            r.notified_at = None;
            r.acknowledged_at = None;
            r.last_message = None;
        })
    }

    async fn set_reminder_enabled(&self, id: i64, enabled: bool) -> PortResult<()> {
        self.check("set_reminder_enabled")?;
        self.with_reminder(id, |r| r.enabled = enabled)
    }

    async fn delete_reminder(&self, id: i64) -> PortResult<()> {
        self.tables
            .lock()
            .unwrap()
            .reminders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("reminder {id}")))
    }
}

impl InMemoryStore {
    fn with_reminder(&self, id: i64, f: impl FnOnce(&mut Reminder)) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let reminder = tables
            .reminders
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(format!("reminder {id}")))?;
        f(reminder);
        Ok(())
    }

    fn with_event(&self, id: i64, f: impl FnOnce(&mut Event)) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(format!("event {id}")))?;
        f(event);
        Ok(())
    }

    fn with_settings(&self, user_id: UserId, f: impl FnOnce(&mut UserSettings)) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let settings = tables
            .settings
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("settings for {user_id}")))?;
        f(settings);
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn fetch_events_pending_notification(&self, now: NaiveDateTime) -> PortResult<Vec<Event>> {
        self.check("fetch_events_pending_notification")?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| due::event_in_notify_window(e, now))
            .cloned()
            .collect())
    }

    async fn fetch_elapsed_events(&self, now: NaiveDateTime) -> PortResult<Vec<Event>> {
        self.check("fetch_elapsed_events")?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| due::event_elapsed(e, now))
            .cloned()
            .collect())
    }

    async fn set_event_notified(&self, id: i64, at: NaiveDateTime) -> PortResult<()> {
        self.with_event(id, |e| e.notified_at = Some(at))
    }

    async fn set_event_next_occurrence(&self, id: i64, next: Option<NaiveDateTime>) -> PortResult<()> {
        self.with_event(id, |e| {
            e.next_occurrence = next;
            e.notified_at = None;
        })
    }

    async fn create_event(&self, new: NewEvent) -> PortResult<Event> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.id();
        let event = Event {
            id,
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            dtstart: new.dtstart,
            duration_minutes: new.duration_minutes,
            recurrence_rule: new.recurrence_rule,
            next_occurrence: new.next_occurrence,
            notify_before_minutes: new.notify_before_minutes,
            notified_at: None,
            created_at: NaiveDateTime::default(),
        };
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    async fn list_upcoming_events(&self, user_id: UserId) -> PortResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .tables
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| e.user_id == user_id && e.next_occurrence.is_some())
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.next_occurrence, e.id));
        Ok(events)
    }

    async fn events_between(
        &self,
        user_id: UserId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .tables
            .lock()
            .unwrap()
            .events
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| {
                let start = e.next_occurrence.unwrap_or(e.dtstart);
                start >= from && start < to
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.next_occurrence.unwrap_or(e.dtstart));
        Ok(events)
    }
}

#[async_trait]
impl TodoRepository for InMemoryStore {
    async fn fetch_notifiable_todos(&self, user_id: UserId) -> PortResult<Vec<Todo>> {
        self.check("fetch_notifiable_todos")?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .todos
            .values()
            .filter(|t| t.user_id == user_id && !t.is_completed() && t.due_time.is_some())
            .cloned()
            .collect())
    }

    async fn batch_set_todo_last_notified(&self, ids: &[i64], at: NaiveDateTime) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        for id in ids {
            if let Some(todo) = tables.todos.get_mut(id) {
                todo.last_notified_at = Some(at);
            }
        }
        Ok(())
    }

    async fn list_open_todos(&self, user_id: UserId) -> PortResult<Vec<Todo>> {
        let mut todos: Vec<Todo> = self
            .tables
            .lock()
            .unwrap()
            .todos
            .values()
            .filter(|t| t.user_id == user_id && !t.is_completed())
            .cloned()
            .collect();
        todos.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.due_time.is_none().cmp(&b.due_time.is_none()))
                .then(a.due_time.cmp(&b.due_time))
        });
        Ok(todos)
    }

    async fn create_todo(&self, new: NewTodo) -> PortResult<Todo> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.id();
        let todo = Todo {
            id,
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            priority: new.priority,
            due_time: new.due_time,
            completed_at: None,
            last_notified_at: None,
            created_at: NaiveDateTime::default(),
        };
        tables.todos.insert(id, todo.clone());
        Ok(todo)
    }

    async fn complete_todo(&self, user_id: UserId, id: i64, at: NaiveDateTime) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        match tables.todos.get_mut(&id) {
            Some(todo) if todo.user_id == user_id && !todo.is_completed() => {
                todo.completed_at = Some(at);
                Ok(())
            }
            _ => Err(PortError::NotFound(format!("todo {id}"))),
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemoryStore {
    async fn get_or_create_settings(&self, user_id: UserId) -> PortResult<UserSettings> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .settings
            .entry(user_id)
            .or_insert_with(|| UserSettings::new_default(user_id))
            .clone())
    }

    async fn get_settings(&self, user_id: UserId) -> PortResult<UserSettings> {
        self.check("get_settings")?;
        self.tables
            .lock()
            .unwrap()
            .settings
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("settings for {user_id}")))
    }

    async fn update_settings(&self, settings: &UserSettings) -> PortResult<()> {
        self.put_settings(settings.clone());
        Ok(())
    }

    async fn users_with_todo_reminders(&self) -> PortResult<Vec<UserId>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .settings
            .values()
            .filter(|s| s.todo_reminders_enabled)
            .map(|s| s.user_id)
            .collect())
    }

    async fn users_with_daily_summary(&self) -> PortResult<Vec<UserId>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .settings
            .values()
            .filter(|s| s.daily_summary_enabled)
            .map(|s| s.user_id)
            .collect())
    }

    async fn daily_notification_count(&self, user_id: UserId, day: NaiveDate) -> PortResult<u32> {
        Ok(self.count(user_id, day))
    }

    async fn increment_daily_notification_count(&self, user_id: UserId, day: NaiveDate) -> PortResult<()> {
        *self
            .tables
            .lock()
            .unwrap()
            .counts
            .entry((user_id, day))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn set_last_todo_message(&self, user_id: UserId, handle: Option<MessageHandle>) -> PortResult<()> {
        self.with_settings(user_id, |s| s.last_todo_message = handle)
    }

    async fn set_last_summary_date(&self, user_id: UserId, day: NaiveDate) -> PortResult<()> {
        self.with_settings(user_id, |s| s.last_summary_date = Some(day))
    }
}

#[async_trait]
impl MemoRepository for InMemoryStore {
    async fn create_memo(&self, new: NewMemo) -> PortResult<Memo> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.id();
        let memo = Memo {
            id,
            user_id: new.user_id,
            content: new.content,
            created_at: NaiveDateTime::default(),
        };
        tables.memos.insert(id, memo.clone());
        Ok(memo)
    }

    async fn list_recent_memos(&self, user_id: UserId, limit: u32) -> PortResult<Vec<Memo>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .memos
            .values()
            .rev()
            .filter(|m| m.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn record_entry(&self, new: NewLedgerEntry) -> PortResult<LedgerEntry> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.id();
        let entry = LedgerEntry {
            id,
            user_id: new.user_id,
            kind: new.kind,
            amount_cents: new.amount_cents,
            description: new.description,
            occurred_at: new.occurred_at,
            created_at: NaiveDateTime::default(),
        };
        tables.ledger.insert(id, entry.clone());
        Ok(entry)
    }

    async fn totals_between(
        &self,
        user_id: UserId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> PortResult<Balance> {
        let tables = self.tables.lock().unwrap();
        let mut balance = Balance::default();
        for entry in tables.ledger.values() {
            if entry.user_id != user_id || entry.occurred_at < from || entry.occurred_at >= to {
                continue;
            }
            match entry.kind {
                EntryKind::Income => balance.income_cents += entry.amount_cents,
                EntryKind::Expense => balance.expense_cents += entry.amount_cents,
            }
        }
        Ok(balance)
    }
}

//=========================================================================================
// Transport and Clock
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Sent {
    pub recipient: UserId,
    pub handle: MessageHandle,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub recipient: UserId,
    pub handle: MessageHandle,
    pub text: String,
}

#[derive(Default)]
pub struct RecordingTransport {
    next_handle: AtomicI64,
    sent: Mutex<Vec<Sent>>,
    retracted: Mutex<Vec<(UserId, MessageHandle)>>,
    edits: Mutex<Vec<Edit>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
    fail_sends: AtomicBool,
    fail_retracts: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn retracted(&self) -> Vec<(UserId, MessageHandle)> {
        self.retracted.lock().unwrap().clone()
    }

    /// Texts sent to `recipient`, in order.
    pub fn texts_to(&self, recipient: UserId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.recipient == recipient)
            .map(|s| s.message.text.clone())
            .collect()
    }

    pub fn edits(&self) -> Vec<Edit> {
        self.edits.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_retracts(&self, fail: bool) {
        self.fail_retracts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send_message(&self, recipient: UserId, message: &OutboundMessage) -> PortResult<MessageHandle> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PortError::Delivery("transport down".into()));
        }
        let handle = MessageHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 100);
        self.sent.lock().unwrap().push(Sent {
            recipient,
            handle,
            message: message.clone(),
        });
        Ok(handle)
    }

    async fn retract_message(&self, recipient: UserId, handle: MessageHandle) -> PortResult<()> {
        if self.fail_retracts.load(Ordering::SeqCst) {
            return Err(PortError::Delivery("message not found".into()));
        }
        self.retracted.lock().unwrap().push((recipient, handle));
        Ok(())
    }
}

#[async_trait]
impl ChatChannel for RecordingTransport {
    async fn edit_text(&self, recipient: UserId, handle: MessageHandle, text: &str) -> PortResult<()> {
        self.edits.lock().unwrap().push(Edit {
            recipient,
            handle,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn answer_action(&self, action_id: &str, toast: Option<&str>) -> PortResult<()> {
        self.answers
            .lock()
            .unwrap()
            .push((action_id.to_string(), toast.map(String::from)));
        Ok(())
    }
}

pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}
