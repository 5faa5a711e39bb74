//! services/bot/src/web/commands.rs
//!
//! Slash commands and intent commits. Everything here returns the reply text;
//! sending it is left to the webhook handler.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use lifeline_core::{
    advance::initial_next_occurrence,
    domain::{
        Balance, EntryKind, Event, Intent, Memo, NewEvent, NewLedgerEntry, NewMemo, NewReminder,
        NewTodo, Reminder, Todo, UserId, UserSettings,
    },
    format::due_label,
    ports::{PortError, PortResult},
    rrule::{self, RecurrenceRule},
};
use tracing::{info, warn};

use crate::web::state::AppState;

/// Lead time for events the user did not give one for.
pub const DEFAULT_EVENT_LEAD_MINUTES: u32 = 15;
/// Priority for todos the user did not rank.
pub const DEFAULT_TODO_PRIORITY: u8 = 3;
/// How many memos `/memos` shows.
pub const MEMO_LIST_LIMIT: u32 = 10;

pub const HELP_TEXT: &str = "📖 **Commands**

Just write what you need, e.g. \"remind me to call mom tomorrow at 6pm\" or \"dentist next Tuesday 10:00\", and confirm with the button.

/remind [YYYY-MM-DD] HH:MM text - add a reminder
/reminders - list your reminders
/event [YYYY-MM-DD] HH:MM title - add an event
/events - list upcoming events
/todo title - add a todo
/todos - list open todos
/done ID - complete a todo
/stop ID - stop a reminder
/delete ID - delete a reminder
/memo text - save a note
/memos - show recent notes
/expense AMOUNT [note] - record an expense
/income AMOUNT [note] - record income
/balance - this month's totals
/cancel - drop a pending confirmation
/settings - show your notification settings
/quiet HH:MM HH:MM - set quiet hours (/quiet off to disable)
/limit N - todo reminders per day (0 = unlimited)
/todoalerts on|off - todo reminders
/summary on|off|HH:MM - daily summary
/check - check for due notifications now";

//=========================================================================================
// Command Parsing
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryToggle {
    On,
    Off,
    At(NaiveTime),
}

/// A wall-clock time with an optional date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct When {
    pub date: Option<NaiveDate>,
    pub time: NaiveTime,
}

impl When {
    /// A bare time means its next occurrence: later today, otherwise tomorrow.
    pub fn resolve(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self.date {
            Some(date) => date.and_time(self.time),
            None => {
                let today = now.date().and_time(self.time);
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Settings,
    Cancel,
    /// `None` turns quiet hours off.
    Quiet(Option<(NaiveTime, NaiveTime)>),
    Limit(u32),
    TodoAlerts(bool),
    Summary(SummaryToggle),
    Remind { at: When, message: String },
    Reminders,
    Event { at: When, title: String },
    Events,
    Todo(String),
    Todos,
    Done(i64),
    /// Disables a reminder.
    Stop(i64),
    DeleteReminder(i64),
    Memo(String),
    Memos,
    Record {
        kind: EntryKind,
        amount_cents: i64,
        description: Option<String>,
    },
    Balance,
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command /{0}. Try /help.")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parses a slash command. Returns `None` for text that is not a command.
    pub fn parse(text: &str) -> Option<Result<Self, CommandError>> {
        let rest = text.trim().strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let head = words.next().unwrap_or_default();
        // Group chats address commands as `/name@BotName`.
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = words.collect();

        let parsed = match name.as_str() {
            "start" => Ok(Self::Start),
            "help" => Ok(Self::Help),
            "settings" => Ok(Self::Settings),
            "cancel" => Ok(Self::Cancel),
            "check" => Ok(Self::Check),
            "reminders" => Ok(Self::Reminders),
            "events" => Ok(Self::Events),
            "memos" => Ok(Self::Memos),
            "balance" => Ok(Self::Balance),
            "quiet" => parse_quiet(&args),
            "limit" => match args.as_slice() {
                [n] => n.parse().map(Self::Limit).map_err(|_| usage(LIMIT_USAGE)),
                _ => Err(usage(LIMIT_USAGE)),
            },
            "todoalerts" => match args.as_slice() {
                [flag] => parse_flag(flag).map(Self::TodoAlerts).ok_or(usage(TODO_ALERTS_USAGE)),
                _ => Err(usage(TODO_ALERTS_USAGE)),
            },
            "summary" => match args.as_slice() {
                [arg] => parse_flag(arg)
                    .map(|on| if on { SummaryToggle::On } else { SummaryToggle::Off })
                    .or_else(|| parse_time(arg).map(SummaryToggle::At))
                    .map(Self::Summary)
                    .ok_or(usage(SUMMARY_USAGE)),
                _ => Err(usage(SUMMARY_USAGE)),
            },
            "remind" => parse_scheduled(&args, REMIND_USAGE)
                .map(|(at, message)| Self::Remind { at, message }),
            "event" => parse_scheduled(&args, EVENT_USAGE).map(|(at, title)| Self::Event { at, title }),
            "todo" => rest_text(&args).map(Self::Todo).ok_or(usage(TODO_USAGE)),
            "todos" => match args.as_slice() {
                [] => Ok(Self::Todos),
                _ => Err(usage(TODOS_USAGE)),
            },
            "memo" => rest_text(&args).map(Self::Memo).ok_or(usage(MEMO_USAGE)),
            "expense" => parse_entry(&args, EntryKind::Expense, EXPENSE_USAGE),
            "income" => parse_entry(&args, EntryKind::Income, INCOME_USAGE),
            "done" => parse_id(&args, DONE_USAGE).map(Self::Done),
            "stop" => parse_id(&args, STOP_USAGE).map(Self::Stop),
            "delete" => parse_id(&args, DELETE_USAGE).map(Self::DeleteReminder),
            other => Err(CommandError::Unknown(other.to_string())),
        };
        Some(parsed)
    }

    /// A short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Settings => "settings",
            Self::Cancel => "cancel",
            Self::Quiet(_) => "quiet",
            Self::Limit(_) => "limit",
            Self::TodoAlerts(_) => "todoalerts",
            Self::Summary(_) => "summary",
            Self::Remind { .. } => "remind",
            Self::Reminders => "reminders",
            Self::Event { .. } => "event",
            Self::Events => "events",
            Self::Todo(_) => "todo",
            Self::Todos => "todos",
            Self::Done(_) => "done",
            Self::Stop(_) => "stop",
            Self::DeleteReminder(_) => "delete",
            Self::Memo(_) => "memo",
            Self::Memos => "memos",
            Self::Record { kind, .. } => kind.as_str(),
            Self::Balance => "balance",
            Self::Check => "check",
        }
    }
}

const QUIET_USAGE: &str = "/quiet HH:MM HH:MM or /quiet off";
const LIMIT_USAGE: &str = "/limit N";
const TODO_ALERTS_USAGE: &str = "/todoalerts on|off";
const SUMMARY_USAGE: &str = "/summary on|off|HH:MM";
const REMIND_USAGE: &str = "/remind [YYYY-MM-DD] HH:MM text";
const EVENT_USAGE: &str = "/event [YYYY-MM-DD] HH:MM title";
const TODO_USAGE: &str = "/todo title";
const TODOS_USAGE: &str = "/todos (use /todoalerts on|off for reminders)";
const MEMO_USAGE: &str = "/memo text";
const EXPENSE_USAGE: &str = "/expense AMOUNT [note]";
const INCOME_USAGE: &str = "/income AMOUNT [note]";
const DONE_USAGE: &str = "/done ID";
const STOP_USAGE: &str = "/stop ID";
const DELETE_USAGE: &str = "/delete ID";

fn usage(text: &'static str) -> CommandError {
    CommandError::Usage(text)
}

fn parse_quiet(args: &[&str]) -> Result<Command, CommandError> {
    match args {
        [flag] if parse_flag(flag) == Some(false) => Ok(Command::Quiet(None)),
        [start, end] => match (parse_time(start), parse_time(end)) {
            (Some(start), Some(end)) => Ok(Command::Quiet(Some((start, end)))),
            _ => Err(usage(QUIET_USAGE)),
        },
        _ => Err(usage(QUIET_USAGE)),
    }
}

/// `[YYYY-MM-DD] HH:MM text...`
fn parse_scheduled(args: &[&str], usage_text: &'static str) -> Result<(When, String), CommandError> {
    let (at, rest) = match args {
        [date, time, rest @ ..] if parse_date(date).is_some() => (
            When {
                date: parse_date(date),
                time: parse_time(time).ok_or(usage(usage_text))?,
            },
            rest,
        ),
        [time, rest @ ..] => (
            When {
                date: None,
                time: parse_time(time).ok_or(usage(usage_text))?,
            },
            rest,
        ),
        [] => return Err(usage(usage_text)),
    };
    let text = rest_text(rest).ok_or(usage(usage_text))?;
    Ok((at, text))
}

fn parse_entry(args: &[&str], kind: EntryKind, usage_text: &'static str) -> Result<Command, CommandError> {
    match args {
        [amount, rest @ ..] => Ok(Command::Record {
            kind,
            amount_cents: parse_amount(amount).ok_or(usage(usage_text))?,
            description: rest_text(rest),
        }),
        [] => Err(usage(usage_text)),
    }
}

fn parse_id(args: &[&str], usage_text: &'static str) -> Result<i64, CommandError> {
    match args {
        [id] => id
            .trim_start_matches('#')
            .parse()
            .map_err(|_| usage(usage_text)),
        _ => Err(usage(usage_text)),
    }
}

fn rest_text(args: &[&str]) -> Option<String> {
    (!args.is_empty()).then(|| args.join(" "))
}

fn parse_flag(word: &str) -> Option<bool> {
    match word.to_lowercase().as_str() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// `H:MM` or `HH:MM`, 24-hour.
fn parse_time(word: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(word, "%H:%M").ok()
}

fn parse_date(word: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(word, "%Y-%m-%d").ok()
}

/// A positive amount with at most two decimals, `12`, `12.5` or `12,50`, in cents.
pub fn parse_amount(word: &str) -> Option<i64> {
    let normalized = word.replace(',', ".");
    let (whole, frac) = normalized
        .split_once('.')
        .unwrap_or((normalized.as_str(), ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !digits(whole) || frac.len() > 2 || !digits(frac) {
        return None;
    }
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    let cents = whole.parse::<i64>().ok()?.checked_mul(100)?.checked_add(frac_cents)?;
    (cents > 0).then_some(cents)
}

pub fn money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

//=========================================================================================
// Command Execution
//=========================================================================================

/// Runs a parsed command for `user` and returns the reply.
pub async fn execute(state: &AppState, user: UserId, command: Command) -> PortResult<String> {
    let settings_repo = &state.repos.settings;

    let reply = match command {
        Command::Start => {
            let settings = settings_repo.get_or_create_settings(user).await?;
            info!(user_id = user.0, "User started the bot");
            format!("👋 **Welcome to LifeLine!**\n\n{}\n\n{}", settings_text(&settings), HELP_TEXT)
        }
        Command::Help => HELP_TEXT.to_string(),
        Command::Settings => settings_text(&settings_repo.get_or_create_settings(user).await?),
        Command::Cancel => {
            if state.sessions.clear(user) {
                "❌ Cancelled".to_string()
            } else {
                "Nothing to cancel.".to_string()
            }
        }
        Command::Quiet(window) => {
            let mut settings = settings_repo.get_or_create_settings(user).await?;
            let (start, end) = window.unwrap_or((NaiveTime::MIN, NaiveTime::MIN));
            settings.quiet_start = start;
            settings.quiet_end = end;
            settings_repo.update_settings(&settings).await?;
            match window {
                Some(_) => format!("🌙 Quiet hours set to {}", quiet_label(&settings)),
                None => "🔔 Quiet hours disabled".to_string(),
            }
        }
        Command::Limit(limit) => {
            let mut settings = settings_repo.get_or_create_settings(user).await?;
            settings.max_daily_notifications = limit;
            settings_repo.update_settings(&settings).await?;
            format!("✅ Daily limit set to {}", limit_label(&settings))
        }
        Command::TodoAlerts(enabled) => {
            let mut settings = settings_repo.get_or_create_settings(user).await?;
            settings.todo_reminders_enabled = enabled;
            settings_repo.update_settings(&settings).await?;
            format!("✅ Todo reminders {}", on_off(enabled))
        }
        Command::Summary(toggle) => {
            let mut settings = settings_repo.get_or_create_settings(user).await?;
            match toggle {
                SummaryToggle::On => settings.daily_summary_enabled = true,
                SummaryToggle::Off => settings.daily_summary_enabled = false,
                SummaryToggle::At(time) => {
                    settings.daily_summary_enabled = true;
                    settings.daily_summary_time = time;
                }
            }
            settings_repo.update_settings(&settings).await?;
            format!("✅ Daily summary {}", summary_label(&settings))
        }
        Command::Remind { at, message } => {
            let now = state.clock.now();
            let remind_at = at.resolve(now);
            if remind_at <= now {
                return Ok("❌ That time has already passed".to_string());
            }
            settings_repo.get_or_create_settings(user).await?;
            let intent = Intent::CreateReminder {
                message,
                remind_at,
                recurrence_rule: None,
            };
            return commit_intent(state, user, intent, now).await;
        }
        Command::Reminders => reminders_text(&state.repos.reminders.list_reminders(user).await?),
        Command::Event { at, title } => {
            let now = state.clock.now();
            let dtstart = at.resolve(now);
            if dtstart <= now {
                return Ok("❌ That time has already passed".to_string());
            }
            settings_repo.get_or_create_settings(user).await?;
            let intent = Intent::CreateEvent {
                title,
                description: None,
                dtstart,
                duration_minutes: 0,
                notify_before_minutes: None,
                recurrence_rule: None,
            };
            return commit_intent(state, user, intent, now).await;
        }
        Command::Events => events_text(&state.repos.events.list_upcoming_events(user).await?),
        Command::Todo(title) => {
            settings_repo.get_or_create_settings(user).await?;
            let intent = Intent::CreateTodo {
                title,
                description: None,
                due_time: None,
                priority: None,
            };
            return commit_intent(state, user, intent, state.clock.now()).await;
        }
        Command::Todos => todos_text(&state.repos.todos.list_open_todos(user).await?, state.clock.now()),
        Command::Done(id) => {
            let now = state.clock.now();
            match state.repos.todos.complete_todo(user, id, now).await {
                Ok(()) => {
                    info!(user_id = user.0, todo_id = id, "Todo completed");
                    format!("🎉 Todo `#{}` completed", id)
                }
                Err(PortError::NotFound(_)) => format!("❌ No open todo `#{}`", id),
                Err(e) => return Err(e),
            }
        }
        Command::Stop(id) => match owned_reminder(state, user, id).await? {
            Some(reminder) if !reminder.enabled => format!("⏹ Reminder `#{}` is already stopped", id),
            Some(_) => {
                state.repos.reminders.set_reminder_enabled(id, false).await?;
                info!(user_id = user.0, reminder_id = id, "Reminder disabled by user");
                format!("⏹ Reminder `#{}` stopped", id)
            }
            None => format!("❌ No reminder `#{}`", id),
        },
        Command::DeleteReminder(id) => match owned_reminder(state, user, id).await? {
            Some(reminder) => {
                if let Some(handle) = reminder.last_message {
                    // The pending notification would otherwise keep a dead button.
                    if let Err(e) = state.chat.retract_message(user, handle).await {
                        warn!(user_id = user.0, reminder_id = id, error = %e, "Failed to retract reminder message");
                    }
                }
                state.repos.reminders.delete_reminder(id).await?;
                info!(user_id = user.0, reminder_id = id, "Reminder deleted");
                format!("🗑 Reminder `#{}` deleted", id)
            }
            None => format!("❌ No reminder `#{}`", id),
        },
        Command::Memo(content) => {
            let memo = state
                .repos
                .memos
                .create_memo(NewMemo {
                    user_id: user,
                    content,
                })
                .await?;
            info!(user_id = user.0, memo_id = memo.id, "Memo saved");
            format!("📝 Memo `#{}` saved", memo.id)
        }
        Command::Memos => memos_text(&state.repos.memos.list_recent_memos(user, MEMO_LIST_LIMIT).await?),
        Command::Record {
            kind,
            amount_cents,
            description,
        } => {
            let entry = state
                .repos
                .ledger
                .record_entry(NewLedgerEntry {
                    user_id: user,
                    kind,
                    amount_cents,
                    description,
                    occurred_at: state.clock.now(),
                })
                .await?;
            info!(user_id = user.0, entry_id = entry.id, kind = kind.as_str(), "Ledger entry recorded");
            let label = match kind {
                EntryKind::Income => "💰 Income",
                EntryKind::Expense => "💸 Expense",
            };
            match entry.description.as_deref() {
                Some(note) => format!("{} of {} recorded ({})", label, money(entry.amount_cents), note),
                None => format!("{} of {} recorded", label, money(entry.amount_cents)),
            }
        }
        Command::Balance => {
            let now = state.clock.now();
            let (from, to) = month_bounds(now.date());
            let balance = state.repos.ledger.totals_between(user, from, to).await?;
            balance_text(&balance, now.date())
        }
        Command::Check => {
            state.scheduler.trigger();
            "🔍 Checking for due notifications...".to_string()
        }
    };
    Ok(reply)
}

/// The reminder, if it exists and belongs to `user`.
async fn owned_reminder(state: &AppState, user: UserId, id: i64) -> PortResult<Option<Reminder>> {
    match state.repos.reminders.get_reminder(id).await {
        Ok(reminder) if reminder.user_id == user => Ok(Some(reminder)),
        Ok(_) | Err(PortError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// `[first of the month, first of the next month)` as timestamps.
fn month_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let first = day - Duration::days(i64::from(day.day0()));
    let next = first.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX);
    (first.and_time(NaiveTime::MIN), next.and_time(NaiveTime::MIN))
}

//=========================================================================================
// Listings
//=========================================================================================

pub fn reminders_text(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return format!("⏰ No reminders yet. Try {}", REMIND_USAGE);
    }
    let mut text = String::from("⏰ **Reminders**\n");
    for reminder in reminders {
        text.push_str(&format!("\n`#{}` {}", reminder.id, reminder.message));
        if !reminder.enabled {
            text.push_str(" (stopped)");
        } else if let Some(at) = reminder.remind_at {
            text.push_str(&format!("\n    🕐 {}", when(at)));
        }
        text.push_str(&repeat_line(reminder.recurrence_rule.as_deref()).replace('\n', "\n    "));
    }
    text
}

pub fn events_text(events: &[Event]) -> String {
    if events.is_empty() {
        return "📅 No upcoming events.".to_string();
    }
    let mut text = String::from("📅 **Upcoming events**\n");
    for event in events {
        let start = event.next_occurrence.unwrap_or(event.dtstart);
        text.push_str(&format!("\n`#{}` **{}**\n    🕐 {}", event.id, event.title, when(start)));
        if let Some(end) = event.end_time() {
            text.push_str(&format!("-{}", end.format("%H:%M")));
        }
        text.push_str(&repeat_line(event.recurrence_rule.as_deref()).replace('\n', "\n    "));
    }
    text
}

pub fn todos_text(todos: &[Todo], now: NaiveDateTime) -> String {
    if todos.is_empty() {
        return "📋 No open todos. 🎉".to_string();
    }
    let mut text = format!("📋 **Open todos** ({})\n", todos.len());
    for todo in todos {
        text.push_str(&format!("\n`#{}` ⭐{} {}", todo.id, todo.priority, todo.title));
        let due = due_label(todo, now);
        if !due.is_empty() {
            text.push_str(&format!(" ({})", due));
        }
    }
    text
}

pub fn memos_text(memos: &[Memo]) -> String {
    if memos.is_empty() {
        return format!("📝 No memos yet. Try {}", MEMO_USAGE);
    }
    let mut text = String::from("📝 **Recent memos**\n");
    for memo in memos {
        text.push_str(&format!("\n`#{}` {}", memo.id, memo.content));
    }
    text
}

pub fn balance_text(balance: &Balance, day: NaiveDate) -> String {
    format!(
        "💼 **Balance for {}**\n\n💰 Income: {}\n💸 Expenses: {}\n🧮 Net: {}",
        day.format("%B %Y"),
        money(balance.income_cents),
        money(balance.expense_cents),
        money(balance.net_cents()),
    )
}

pub fn settings_text(settings: &UserSettings) -> String {
    let i = &settings.intervals;
    format!(
        "⚙️ **Settings**\n\n🌙 Quiet hours: {}\n🔢 Daily limit: {}\n📋 Todo reminders: {}\n☀️ Daily summary: {}\n⏱ Intervals (min): overdue {}, urgent {}, soon {}, normal {}",
        quiet_label(settings),
        limit_label(settings),
        on_off(settings.todo_reminders_enabled),
        summary_label(settings),
        i.overdue,
        i.urgent,
        i.soon,
        i.normal,
    )
}

fn quiet_label(settings: &UserSettings) -> String {
    if settings.quiet_start == settings.quiet_end {
        "off".to_string()
    } else {
        format!(
            "{}-{}",
            settings.quiet_start.format("%H:%M"),
            settings.quiet_end.format("%H:%M")
        )
    }
}

fn limit_label(settings: &UserSettings) -> String {
    match settings.max_daily_notifications {
        0 => "unlimited".to_string(),
        n => format!("{} todo reminders", n),
    }
}

fn summary_label(settings: &UserSettings) -> String {
    if settings.daily_summary_enabled {
        format!("on at {}", settings.daily_summary_time.format("%H:%M"))
    } else {
        "off".to_string()
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

//=========================================================================================
// Intents
//=========================================================================================

fn when(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn repeat_line(rule: Option<&str>) -> String {
    rule.filter(|r| rrule::is_recurring(r))
        .map(|r| format!("\n🔄 {}", rrule::describe_str(r)))
        .unwrap_or_default()
}

/// The confirmation prompt shown before an intent is committed.
pub fn preview_intent(intent: &Intent) -> String {
    match intent {
        Intent::CreateReminder {
            message,
            remind_at,
            recurrence_rule,
        } => format!(
            "⏰ **New reminder**\n\n{}\n🕐 {}{}",
            message,
            when(*remind_at),
            repeat_line(recurrence_rule.as_deref())
        ),
        Intent::CreateEvent {
            title,
            description,
            dtstart,
            duration_minutes,
            notify_before_minutes,
            recurrence_rule,
        } => {
            let mut text = format!("📅 **New event**\n\n**{}**\n🕐 {}", title, when(*dtstart));
            if *duration_minutes > 0 {
                text.push_str(&format!("\n⏱ {} min", duration_minutes));
            }
            text.push_str(&format!(
                "\n🔔 {} min before",
                notify_before_minutes.unwrap_or(DEFAULT_EVENT_LEAD_MINUTES)
            ));
            text.push_str(&repeat_line(recurrence_rule.as_deref()));
            if let Some(description) = description.as_deref().filter(|d| !d.trim().is_empty()) {
                text.push_str("\n\n");
                text.push_str(description);
            }
            text
        }
        Intent::CreateTodo {
            title,
            description,
            due_time,
            priority,
        } => {
            let mut text = format!(
                "📋 **New todo**\n\n**{}**\n⭐ priority {}",
                title,
                todo_priority(*priority)
            );
            if let Some(due) = due_time {
                text.push_str(&format!("\n📆 due {}", when(*due)));
            }
            if let Some(description) = description.as_deref().filter(|d| !d.trim().is_empty()) {
                text.push_str("\n\n");
                text.push_str(description);
            }
            text
        }
        Intent::Reply { text } => text.clone(),
    }
}

fn todo_priority(priority: Option<u8>) -> u8 {
    priority.unwrap_or(DEFAULT_TODO_PRIORITY).clamp(1, 5)
}

/// A recurrence string worth storing, or a user-facing reason it is not.
fn validated_rule(rule: Option<&str>) -> Result<Option<String>, String> {
    match rule.map(str::trim).filter(|r| rrule::is_recurring(r)) {
        None => Ok(None),
        Some(r) => RecurrenceRule::parse(r)
            .map(|_| Some(r.to_string()))
            .map_err(|e| format!("❌ I couldn't use that repeat rule ({})", e)),
    }
}

/// Creates the entity an intent describes and wakes the scheduler.
pub async fn commit_intent(
    state: &AppState,
    user: UserId,
    intent: Intent,
    now: NaiveDateTime,
) -> PortResult<String> {
    let reply = match intent {
        Intent::CreateReminder {
            message,
            remind_at,
            recurrence_rule,
        } => {
            let rule = match validated_rule(recurrence_rule.as_deref()) {
                Ok(rule) => rule,
                Err(reason) => return Ok(reason),
            };
            let Some(first) = initial_next_occurrence(rule.as_deref(), remind_at, now) else {
                return Ok("❌ That schedule has no upcoming occurrences".to_string());
            };
            let reminder = state
                .repos
                .reminders
                .create_reminder(NewReminder {
                    user_id: user,
                    message,
                    description: None,
                    dtstart: Some(remind_at),
                    recurrence_rule: rule,
                    remind_at: Some(first),
                })
                .await?;
            info!(user_id = user.0, reminder_id = reminder.id, remind_at = %first, "Reminder created");
            format!(
                "✅ Reminder `#{}` set for {}{}",
                reminder.id,
                when(first),
                repeat_line(reminder.recurrence_rule.as_deref())
            )
        }
        Intent::CreateEvent {
            title,
            description,
            dtstart,
            duration_minutes,
            notify_before_minutes,
            recurrence_rule,
        } => {
            let rule = match validated_rule(recurrence_rule.as_deref()) {
                Ok(rule) => rule,
                Err(reason) => return Ok(reason),
            };
            let next_occurrence = initial_next_occurrence(rule.as_deref(), dtstart, now);
            let event = state
                .repos
                .events
                .create_event(NewEvent {
                    user_id: user,
                    title,
                    description,
                    dtstart,
                    duration_minutes,
                    recurrence_rule: rule,
                    next_occurrence,
                    notify_before_minutes: notify_before_minutes.unwrap_or(DEFAULT_EVENT_LEAD_MINUTES),
                })
                .await?;
            info!(user_id = user.0, event_id = event.id, "Event created");
            match next_occurrence {
                Some(next) => format!(
                    "✅ Event `#{}` **{}** on {}{}",
                    event.id,
                    event.title,
                    when(next),
                    repeat_line(event.recurrence_rule.as_deref())
                ),
                None => format!("✅ Event `#{}` saved, but it has no upcoming occurrences", event.id),
            }
        }
        Intent::CreateTodo {
            title,
            description,
            due_time,
            priority,
        } => {
            let todo = state
                .repos
                .todos
                .create_todo(NewTodo {
                    user_id: user,
                    title,
                    description,
                    priority: todo_priority(priority),
                    due_time,
                })
                .await?;
            info!(user_id = user.0, todo_id = todo.id, "Todo created");
            format!("✅ Todo `#{}` **{}** added", todo.id, todo.title)
        }
        Intent::Reply { text } => return Ok(text),
    };

    state.scheduler.trigger();
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testing::TestApp;
    use lifeline_core::domain::MessageHandle;
    use lifeline_core::test_support::at;

    const ME: UserId = UserId(7);
    const SOMEONE_ELSE: UserId = UserId(8);

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn parse(text: &str) -> Result<Command, CommandError> {
        Command::parse(text).expect("is a command")
    }

    fn new_reminder(user: UserId, remind_at: NaiveDateTime, rule: Option<&str>) -> NewReminder {
        NewReminder {
            user_id: user,
            message: "water plants".into(),
            description: None,
            recurrence_rule: rule.map(String::from),
            dtstart: Some(remind_at),
            remind_at: Some(remind_at),
        }
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(Command::parse("remind me tomorrow").is_none());
        assert!(Command::parse("  ").is_none());
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("/start"), Ok(Command::Start));
        assert_eq!(parse("/HELP"), Ok(Command::Help));
        assert_eq!(parse("/settings@LifeLineBot"), Ok(Command::Settings));
        assert_eq!(parse(" /check "), Ok(Command::Check));
        assert_eq!(parse("/cancel"), Ok(Command::Cancel));
        assert_eq!(parse("/reminders"), Ok(Command::Reminders));
        assert_eq!(parse("/events"), Ok(Command::Events));
        assert_eq!(parse("/todos"), Ok(Command::Todos));
        assert_eq!(parse("/memos"), Ok(Command::Memos));
        assert_eq!(parse("/balance"), Ok(Command::Balance));
    }

    #[test]
    fn quiet_hours() {
        assert_eq!(parse("/quiet 23:00 7:30"), Ok(Command::Quiet(Some((hm(23, 0), hm(7, 30))))));
        assert_eq!(parse("/quiet off"), Ok(Command::Quiet(None)));
        assert_eq!(parse("/quiet 25:00 7:00"), Err(CommandError::Usage(QUIET_USAGE)));
        assert_eq!(parse("/quiet 23:00"), Err(CommandError::Usage(QUIET_USAGE)));
    }

    #[test]
    fn toggles_and_numbers() {
        assert_eq!(parse("/limit 0"), Ok(Command::Limit(0)));
        assert_eq!(parse("/limit -1"), Err(CommandError::Usage(LIMIT_USAGE)));
        assert_eq!(parse("/todoalerts OFF"), Ok(Command::TodoAlerts(false)));
        assert_eq!(parse("/todos off"), Err(CommandError::Usage(TODOS_USAGE)));
        assert_eq!(parse("/summary on"), Ok(Command::Summary(SummaryToggle::On)));
        assert_eq!(parse("/summary 07:15"), Ok(Command::Summary(SummaryToggle::At(hm(7, 15)))));
        assert_eq!(parse("/summary later"), Err(CommandError::Usage(SUMMARY_USAGE)));
        assert_eq!(parse("/done #12"), Ok(Command::Done(12)));
        assert_eq!(parse("/done"), Err(CommandError::Usage(DONE_USAGE)));
        assert_eq!(parse("/stop 4"), Ok(Command::Stop(4)));
        assert_eq!(parse("/delete #4"), Ok(Command::DeleteReminder(4)));
        assert_eq!(parse("/delete 4 5"), Err(CommandError::Usage(DELETE_USAGE)));
    }

    #[test]
    fn scheduled_commands_take_optional_date() {
        assert_eq!(
            parse("/remind 18:30 call mom"),
            Ok(Command::Remind {
                at: When { date: None, time: hm(18, 30) },
                message: "call mom".into(),
            })
        );
        assert_eq!(
            parse("/event 2024-06-01 10:00 dentist visit"),
            Ok(Command::Event {
                at: When {
                    date: NaiveDate::from_ymd_opt(2024, 6, 1),
                    time: hm(10, 0),
                },
                title: "dentist visit".into(),
            })
        );
        assert_eq!(parse("/remind 18:30"), Err(CommandError::Usage(REMIND_USAGE)));
        assert_eq!(parse("/remind call mom"), Err(CommandError::Usage(REMIND_USAGE)));
        assert_eq!(parse("/event 2024-06-01 dentist"), Err(CommandError::Usage(EVENT_USAGE)));
        assert_eq!(parse("/todo"), Err(CommandError::Usage(TODO_USAGE)));
        assert_eq!(parse("/memo"), Err(CommandError::Usage(MEMO_USAGE)));
    }

    #[test]
    fn bare_time_resolves_to_next_occurrence() {
        let now = at(2024, 5, 2, 10, 0);
        let later = When { date: None, time: hm(18, 0) };
        let earlier = When { date: None, time: hm(9, 0) };
        assert_eq!(later.resolve(now), at(2024, 5, 2, 18, 0));
        assert_eq!(earlier.resolve(now), at(2024, 5, 3, 9, 0));
        let exactly_now = When { date: None, time: hm(10, 0) };
        assert_eq!(exactly_now.resolve(now), at(2024, 5, 3, 10, 0));
    }

    #[test]
    fn ledger_entries_parse_amounts() {
        assert_eq!(
            parse("/expense 12,50 coffee beans"),
            Ok(Command::Record {
                kind: EntryKind::Expense,
                amount_cents: 1250,
                description: Some("coffee beans".into()),
            })
        );
        assert_eq!(
            parse("/income 1000"),
            Ok(Command::Record {
                kind: EntryKind::Income,
                amount_cents: 100_000,
                description: None,
            })
        );
        assert_eq!(parse("/expense"), Err(CommandError::Usage(EXPENSE_USAGE)));
        assert_eq!(parse("/income -5"), Err(CommandError::Usage(INCOME_USAGE)));
    }

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("7"), Some(700));
        assert_eq!(parse_amount("7.5"), Some(750));
        assert_eq!(parse_amount("7.05"), Some(705));
        assert_eq!(parse_amount("7."), Some(700));
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("0.00"), None);
        assert_eq!(parse_amount("1.234"), None);
        assert_eq!(parse_amount(".5"), None);
        assert_eq!(parse_amount("1e3"), None);
        assert_eq!(parse_amount("99999999999999999999"), None);
        assert_eq!(money(-1205), "-12.05");
        assert_eq!(money(0), "0.00");
    }

    #[test]
    fn month_bounds_cover_the_calendar_month() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 17).unwrap();
        assert_eq!(month_bounds(day), (at(2024, 12, 1, 0, 0), at(2025, 1, 1, 0, 0)));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(parse("/snooze 5"), Err(CommandError::Unknown("snooze".into())));
        assert_eq!(
            CommandError::Unknown("snooze".into()).to_string(),
            "Unknown command /snooze. Try /help."
        );
    }

    #[test]
    fn settings_text_shows_defaults() {
        let text = settings_text(&UserSettings::new_default(UserId(1)));
        assert!(text.contains("Quiet hours: 22:00-08:00"));
        assert!(text.contains("Daily limit: 10 todo reminders"));
        assert!(text.contains("Daily summary: on at 08:00"));
        assert!(text.contains("overdue 30, urgent 30, soon 120, normal 480"));
    }

    #[test]
    fn preview_of_recurring_reminder() {
        let intent = Intent::CreateReminder {
            message: "stand up".into(),
            remind_at: at(2024, 5, 2, 9, 30),
            recurrence_rule: Some("FREQ=DAILY".into()),
        };
        let text = preview_intent(&intent);
        assert!(text.starts_with("⏰ **New reminder**"));
        assert!(text.contains("🕐 2024-05-02 09:30"));
        assert!(text.contains("🔄 every day"));
    }

    #[test]
    fn preview_of_todo_uses_default_priority() {
        let intent = Intent::CreateTodo {
            title: "file taxes".into(),
            description: None,
            due_time: None,
            priority: None,
        };
        assert_eq!(preview_intent(&intent), "📋 **New todo**\n\n**file taxes**\n⭐ priority 3");
    }

    #[test]
    fn rule_validation() {
        assert_eq!(validated_rule(None), Ok(None));
        assert_eq!(validated_rule(Some("  ")), Ok(None));
        assert_eq!(validated_rule(Some("FREQ=WEEKLY;BYDAY=MO")), Ok(Some("FREQ=WEEKLY;BYDAY=MO".into())));
        assert!(validated_rule(Some("FREQ=SOMETIMES")).is_err());
    }

    #[tokio::test]
    async fn remind_command_creates_and_lists_a_reminder() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let command = parse("/remind 9:00 stretch").unwrap();

        let reply = execute(&app.state, ME, command).await.unwrap();
        assert_eq!(reply, "✅ Reminder `#1` set for 2024-05-03 09:00");
        let reminder = app.store.reminder(1);
        assert_eq!(reminder.remind_at, Some(at(2024, 5, 3, 9, 0)));
        assert_eq!(reminder.recurrence_rule, None);

        let listing = execute(&app.state, ME, Command::Reminders).await.unwrap();
        assert!(listing.contains("`#1` stretch\n    🕐 2024-05-03 09:00"), "{listing}");
        let theirs = execute(&app.state, SOMEONE_ELSE, Command::Reminders).await.unwrap();
        assert!(theirs.starts_with("⏰ No reminders yet"));
    }

    #[tokio::test]
    async fn scheduling_in_the_past_is_refused() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let reply = execute(&app.state, ME, parse("/remind 2024-05-01 9:00 late").unwrap())
            .await
            .unwrap();
        assert_eq!(reply, "❌ That time has already passed");
        let reply = execute(&app.state, ME, parse("/event 2024-05-02 10:00 now").unwrap())
            .await
            .unwrap();
        assert_eq!(reply, "❌ That time has already passed");
        assert!(app.state.repos.reminders.list_reminders(ME).await.unwrap().is_empty());
        assert!(app.state.repos.events.list_upcoming_events(ME).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_command_creates_an_upcoming_event() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let reply = execute(&app.state, ME, parse("/event 2024-05-04 18:00 concert").unwrap())
            .await
            .unwrap();
        assert_eq!(reply, "✅ Event `#1` **concert** on 2024-05-04 18:00");
        let event = app.store.event(1);
        assert_eq!(event.next_occurrence, Some(at(2024, 5, 4, 18, 0)));
        assert_eq!(event.notify_before_minutes, DEFAULT_EVENT_LEAD_MINUTES);

        let listing = execute(&app.state, ME, Command::Events).await.unwrap();
        assert!(listing.contains("`#1` **concert**\n    🕐 2024-05-04 18:00"), "{listing}");
    }

    #[tokio::test]
    async fn stop_and_delete_refuse_other_users_reminders() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let reminders = &app.state.repos.reminders;
        let mine = reminders
            .create_reminder(new_reminder(ME, at(2024, 5, 2, 12, 0), None))
            .await
            .unwrap();

        let reply = execute(&app.state, SOMEONE_ELSE, Command::Stop(mine.id)).await.unwrap();
        assert_eq!(reply, format!("❌ No reminder `#{}`", mine.id));
        let reply = execute(&app.state, SOMEONE_ELSE, Command::DeleteReminder(mine.id))
            .await
            .unwrap();
        assert_eq!(reply, format!("❌ No reminder `#{}`", mine.id));
        assert!(app.store.reminder(mine.id).enabled);

        let reply = execute(&app.state, ME, Command::Stop(mine.id)).await.unwrap();
        assert_eq!(reply, format!("⏹ Reminder `#{}` stopped", mine.id));
        assert!(!app.store.reminder(mine.id).enabled);
        let reply = execute(&app.state, ME, Command::Stop(mine.id)).await.unwrap();
        assert_eq!(reply, format!("⏹ Reminder `#{}` is already stopped", mine.id));

        let listing = execute(&app.state, ME, Command::Reminders).await.unwrap();
        assert!(listing.contains("water plants (stopped)"), "{listing}");
    }

    #[tokio::test]
    async fn delete_retracts_the_pending_notification() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let reminders = &app.state.repos.reminders;
        let reminder = reminders
            .create_reminder(new_reminder(ME, at(2024, 5, 2, 9, 0), None))
            .await
            .unwrap();
        reminders
            .mark_reminder_notified(reminder.id, at(2024, 5, 2, 9, 0), MessageHandle(55))
            .await
            .unwrap();

        let reply = execute(&app.state, ME, Command::DeleteReminder(reminder.id)).await.unwrap();
        assert_eq!(reply, format!("🗑 Reminder `#{}` deleted", reminder.id));
        assert_eq!(app.chat.retracted(), vec![(ME, MessageHandle(55))]);
        assert!(matches!(
            reminders.get_reminder(reminder.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_goes_ahead_when_retraction_fails() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let reminders = &app.state.repos.reminders;
        let reminder = reminders
            .create_reminder(new_reminder(ME, at(2024, 5, 2, 9, 0), None))
            .await
            .unwrap();
        reminders
            .mark_reminder_notified(reminder.id, at(2024, 5, 2, 9, 0), MessageHandle(55))
            .await
            .unwrap();
        app.chat.fail_retracts(true);

        execute(&app.state, ME, Command::DeleteReminder(reminder.id)).await.unwrap();
        assert!(app.chat.retracted().is_empty());
        assert!(reminders.get_reminder(reminder.id).await.is_err());
    }

    #[tokio::test]
    async fn todo_lifecycle_through_commands() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let reply = execute(&app.state, ME, parse("/todo file taxes").unwrap()).await.unwrap();
        assert_eq!(reply, "✅ Todo `#1` **file taxes** added");
        assert_eq!(app.store.todo(1).priority, DEFAULT_TODO_PRIORITY);

        let listing = execute(&app.state, ME, Command::Todos).await.unwrap();
        assert_eq!(listing, "📋 **Open todos** (1)\n\n`#1` ⭐3 file taxes");

        assert_eq!(
            execute(&app.state, SOMEONE_ELSE, Command::Done(1)).await.unwrap(),
            "❌ No open todo `#1`"
        );
        assert_eq!(execute(&app.state, ME, Command::Done(1)).await.unwrap(), "🎉 Todo `#1` completed");
        assert_eq!(
            execute(&app.state, ME, Command::Todos).await.unwrap(),
            "📋 No open todos. 🎉"
        );
    }

    #[tokio::test]
    async fn todo_alerts_and_summary_update_settings() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        execute(&app.state, ME, Command::TodoAlerts(false)).await.unwrap();
        execute(&app.state, ME, Command::Summary(SummaryToggle::At(hm(7, 45))))
            .await
            .unwrap();
        let settings = app.store.settings(ME);
        assert!(!settings.todo_reminders_enabled);
        assert!(settings.daily_summary_enabled);
        assert_eq!(settings.daily_summary_time, hm(7, 45));
    }

    #[tokio::test]
    async fn memos_list_newest_first() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        assert!(execute(&app.state, ME, Command::Memos).await.unwrap().starts_with("📝 No memos yet"));

        assert_eq!(
            execute(&app.state, ME, parse("/memo buy stamps").unwrap()).await.unwrap(),
            "📝 Memo `#1` saved"
        );
        execute(&app.state, ME, parse("/memo call the bank").unwrap()).await.unwrap();
        execute(&app.state, SOMEONE_ELSE, parse("/memo not mine").unwrap()).await.unwrap();

        let listing = execute(&app.state, ME, Command::Memos).await.unwrap();
        assert_eq!(listing, "📝 **Recent memos**\n\n`#2` call the bank\n`#1` buy stamps");
    }

    #[tokio::test]
    async fn balance_covers_the_current_month() {
        let app = TestApp::new(at(2024, 5, 20, 10, 0));
        let reply = execute(&app.state, ME, parse("/expense 12,50 coffee").unwrap()).await.unwrap();
        assert_eq!(reply, "💸 Expense of 12.50 recorded (coffee)");
        execute(&app.state, ME, parse("/income 1000").unwrap()).await.unwrap();
        // Last month and another user's entries stay out of the totals.
        app.state
            .repos
            .ledger
            .record_entry(NewLedgerEntry {
                user_id: ME,
                kind: EntryKind::Expense,
                amount_cents: 99_00,
                description: None,
                occurred_at: at(2024, 4, 30, 23, 59),
            })
            .await
            .unwrap();
        execute(&app.state, SOMEONE_ELSE, parse("/expense 5").unwrap()).await.unwrap();

        let reply = execute(&app.state, ME, Command::Balance).await.unwrap();
        assert_eq!(
            reply,
            "💼 **Balance for May 2024**\n\n💰 Income: 1000.00\n💸 Expenses: 12.50\n🧮 Net: 987.50"
        );
    }

    #[tokio::test]
    async fn cancel_drops_a_pending_confirmation() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let token = app.state.sessions.create(
            ME,
            Intent::CreateTodo {
                title: "x".into(),
                description: None,
                due_time: None,
                priority: None,
            },
        );
        assert_eq!(execute(&app.state, ME, Command::Cancel).await.unwrap(), "❌ Cancelled");
        assert_eq!(execute(&app.state, ME, Command::Cancel).await.unwrap(), "Nothing to cancel.");
        assert!(app.state.sessions.take(ME, token).is_none());
    }

    #[tokio::test]
    async fn invalid_rule_is_reported_without_saving() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let intent = Intent::CreateReminder {
            message: "stand up".into(),
            remind_at: at(2024, 5, 3, 9, 0),
            recurrence_rule: Some("FREQ=SOMETIMES".into()),
        };
        let reply = commit_intent(&app.state, ME, intent, app.state.clock.now()).await.unwrap();
        assert!(reply.starts_with("❌ I couldn't use that repeat rule"), "{reply}");
        assert!(app.state.repos.reminders.list_reminders(ME).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn past_recurring_reminder_starts_at_its_next_fire() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let intent = Intent::CreateReminder {
            message: "stand up".into(),
            remind_at: at(2024, 5, 1, 9, 0),
            recurrence_rule: Some("FREQ=DAILY".into()),
        };
        let reply = commit_intent(&app.state, ME, intent, app.state.clock.now()).await.unwrap();
        assert!(reply.starts_with("✅ Reminder `#1` set for 2024-05-03 09:00\n🔄 every day"), "{reply}");
        let reminder = app.store.reminder(1);
        assert_eq!(reminder.dtstart, Some(at(2024, 5, 1, 9, 0)));
        assert_eq!(reminder.remind_at, Some(at(2024, 5, 3, 9, 0)));
    }

    #[tokio::test]
    async fn past_recurring_event_starts_at_its_next_occurrence() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        let intent = Intent::CreateEvent {
            title: "choir".into(),
            description: None,
            dtstart: at(2024, 4, 25, 18, 0),
            duration_minutes: 90,
            notify_before_minutes: Some(30),
            recurrence_rule: Some("FREQ=WEEKLY".into()),
        };
        commit_intent(&app.state, ME, intent, app.state.clock.now()).await.unwrap();
        let event = app.store.event(1);
        assert_eq!(event.dtstart, at(2024, 4, 25, 18, 0));
        assert_eq!(event.next_occurrence, Some(at(2024, 5, 2, 18, 0)));
        assert_eq!(event.notify_before_minutes, 30);

        let listing = execute(&app.state, ME, Command::Events).await.unwrap();
        assert!(listing.contains("🕐 2024-05-02 18:00-19:30"), "{listing}");
        assert!(listing.contains("🔄 every week"), "{listing}");
    }

    #[tokio::test]
    async fn committed_reminder_is_delivered_by_the_next_cycle() {
        let app = TestApp::new(at(2024, 5, 2, 10, 0));
        execute(&app.state, ME, parse("/remind 10:30 stretch").unwrap()).await.unwrap();

        app.clock.set(at(2024, 5, 2, 10, 30));
        app.scheduler.run_cycle().await;
        let reminders: Vec<_> = app
            .chat
            .sent()
            .into_iter()
            .filter(|s| s.message.text.starts_with("⏰ **Reminder**"))
            .collect();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].recipient, ME);
        assert!(reminders[0].message.text.contains("stretch"));
        assert_eq!(app.store.reminder(1).last_message, Some(reminders[0].handle));
    }
}
