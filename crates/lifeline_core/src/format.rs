//! crates/lifeline_core/src/format.rs
//!
//! Renders notifications into transport-neutral text. `**bold**` and `` `code` ``
//! markers are left for the transport to translate.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::backoff::UrgencyZone;
use crate::domain::{Event, Reminder, Todo};
use crate::ports::OutboundMessage;
use crate::rrule;

/// Callback payload prefix of the acknowledgement button on reminders.
pub const REMIND_ACK_PREFIX: &str = "remind_ack:";

/// Most todos listed in a daily summary before collapsing the rest.
pub const SUMMARY_TODO_LIMIT: usize = 10;

/// Everything a daily summary shows.
#[derive(Debug, Clone)]
pub struct DailySummary<'a> {
    pub now: NaiveDateTime,
    pub events: &'a [Event],
    pub todos: &'a [Todo],
}

pub trait NotificationFormatter: Send + Sync {
    fn reminder(&self, reminder: &Reminder) -> OutboundMessage;
    fn event(&self, event: &Event, now: NaiveDateTime) -> OutboundMessage;
    fn todo_batch(&self, todos: &[(Todo, UrgencyZone)], now: NaiveDateTime) -> OutboundMessage;
    fn daily_summary(&self, summary: &DailySummary<'_>) -> OutboundMessage;
}

/// The default English formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl NotificationFormatter for TextFormatter {
    fn reminder(&self, reminder: &Reminder) -> OutboundMessage {
        let mut text = format!("⏰ **Reminder**\n\n{}", reminder.message);
        if let Some(description) = non_empty(reminder.description.as_deref()) {
            text.push_str("\n\n");
            text.push_str(description);
        }
        if reminder.is_recurring() {
            if let Some(rule) = reminder.recurrence_rule.as_deref() {
                text.push_str("\n\n🔄 ");
                text.push_str(&rrule::describe_str(rule));
            }
        }
        OutboundMessage::text(text)
            .with_action("✅ Got it", format!("{}{}", REMIND_ACK_PREFIX, reminder.id))
    }

    fn event(&self, event: &Event, now: NaiveDateTime) -> OutboundMessage {
        let start = event.next_occurrence.unwrap_or(event.dtstart);
        let mut text = format!(
            "📅 **Upcoming event**\n\n**{}**\n⏰ {}",
            event.title,
            start.format("%H:%M")
        );
        if let Some(end) = event.end_time() {
            text.push_str(&format!("-{}", end.format("%H:%M")));
        }
        let until = start - now;
        if until > Duration::zero() {
            text.push_str(&format!(" (in {})", format_duration(until)));
        }
        if event.is_recurring() {
            if let Some(rule) = event.recurrence_rule.as_deref() {
                text.push_str("\n🔄 ");
                text.push_str(&rrule::describe_str(rule));
            }
        }
        if let Some(description) = non_empty(event.description.as_deref()) {
            text.push_str("\n\n");
            text.push_str(description);
        }
        OutboundMessage::text(text)
    }

    fn todo_batch(&self, todos: &[(Todo, UrgencyZone)], now: NaiveDateTime) -> OutboundMessage {
        if let [(todo, _)] = todos {
            let mut text = format!("📋 **Todo reminder**\n\n**{}**\n⏰ {}", todo.title, due_label(todo, now));
            text.push_str(&format!(" | ⭐{}", todo.priority));
            if let Some(description) = non_empty(todo.description.as_deref()) {
                text.push_str("\n\n");
                text.push_str(description);
            }
            text.push_str(&format!("\n\nSend `/done {}` when finished.", todo.id));
            return OutboundMessage::text(text);
        }

        let mut text = format!("📋 **Todo reminder** ({} items)\n\n", todos.len());
        for (i, (todo, _)) in todos.iter().enumerate() {
            text.push_str(&format!(
                "{}. **{}** - {} ⭐{} `#{}`\n",
                i + 1,
                todo.title,
                due_label(todo, now),
                todo.priority,
                todo.id
            ));
        }
        text.push_str("\nSend `/done <id>` when finished.");
        OutboundMessage::text(text)
    }

    fn daily_summary(&self, summary: &DailySummary<'_>) -> OutboundMessage {
        let now = summary.now;
        let mut text = format!(
            "☀️ **{}**\n\n📅 {}\n",
            greeting(now.hour()),
            now.format("%Y/%m/%d (%a)")
        );

        text.push_str("\n**Today**\n");
        if summary.events.is_empty() {
            text.push_str("• Nothing scheduled today\n");
        }
        for event in summary.events {
            let start = event.next_occurrence.unwrap_or(event.dtstart);
            text.push_str(&format!("• {} {}", start.format("%H:%M"), event.title));
            if event.duration_minutes > 0 {
                text.push_str(&format!(" ({} min)", event.duration_minutes));
            }
            text.push('\n');
        }

        text.push_str("\n**Todos**\n");
        if summary.todos.is_empty() {
            text.push_str("• No open todos\n");
        }
        for todo in summary.todos.iter().take(SUMMARY_TODO_LIMIT) {
            let star = if todo.priority >= 4 { " ⭐" } else { "" };
            let tag = match todo.due_time {
                Some(due) if due < now => " (overdue)",
                Some(due) if due < now + Duration::hours(24) => " (due today)",
                Some(due) if due < now + Duration::hours(48) => " (due tomorrow)",
                _ => "",
            };
            text.push_str(&format!("• {}{}{}\n", todo.title, star, tag));
        }
        if summary.todos.len() > SUMMARY_TODO_LIMIT {
            text.push_str(&format!(
                "• ...and {} more\n",
                summary.todos.len() - SUMMARY_TODO_LIMIT
            ));
        }

        text.push_str("\nHave a great day! 💪");
        OutboundMessage::text(text)
    }
}

/// Morning 05-12, afternoon 12-18, evening otherwise.
pub fn greeting(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

/// Relative deadline, e.g. `overdue by 2 h`, `3 h 15 min left`, `tomorrow 09:00`.
pub fn due_label(todo: &Todo, now: NaiveDateTime) -> String {
    let Some(due) = todo.due_time else {
        return String::new();
    };
    let diff = due - now;

    if diff < Duration::zero() {
        let overdue = -diff;
        return if overdue < Duration::hours(1) {
            format!("overdue by {} min", overdue.num_minutes())
        } else if overdue < Duration::hours(24) {
            format!("overdue by {} h", overdue.num_hours())
        } else {
            format!("overdue by {} days", overdue.num_days())
        };
    }
    if diff < Duration::hours(1) {
        return format!("{} min left", diff.num_minutes());
    }
    if diff < Duration::hours(24) {
        let hours = diff.num_hours();
        let minutes = diff.num_minutes() % 60;
        return if minutes > 0 {
            format!("{} h {} min left", hours, minutes)
        } else {
            format!("{} h left", hours)
        };
    }
    if diff < Duration::hours(48) {
        return format!("tomorrow {}", due.format("%H:%M"));
    }
    due.format("%m/%d %H:%M").to_string()
}

pub fn format_duration(d: Duration) -> String {
    if d < Duration::minutes(1) {
        return "less than a minute".to_string();
    }
    let hours = d.num_hours();
    let minutes = d.num_minutes() % 60;
    match (hours, minutes) {
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} h", h),
        (h, m) => format!("{} h {} min", h, m),
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn todo(id: i64, title: &str, priority: u8, due: Option<NaiveDateTime>) -> Todo {
        Todo {
            id,
            user_id: UserId(1),
            title: title.into(),
            description: None,
            priority,
            due_time: due,
            completed_at: None,
            last_notified_at: None,
            created_at: at(1, 0, 0),
        }
    }

    #[test]
    fn reminder_has_ack_button_and_rule() {
        let reminder = Reminder {
            id: 42,
            user_id: UserId(1),
            enabled: true,
            message: "take meds".into(),
            description: None,
            recurrence_rule: Some("FREQ=DAILY".into()),
            dtstart: Some(at(1, 9, 0)),
            remind_at: Some(at(2, 9, 0)),
            notified_at: None,
            acknowledged_at: None,
            last_message: None,
            created_at: at(1, 8, 0),
        };
        let msg = TextFormatter.reminder(&reminder);
        assert!(msg.text.contains("take meds"));
        assert!(msg.text.contains("every day"));
        assert_eq!(msg.actions.len(), 1);
        assert_eq!(msg.actions[0].callback_data, "remind_ack:42");
    }

    #[test]
    fn event_shows_time_range_and_lead() {
        let event = Event {
            id: 3,
            user_id: UserId(1),
            title: "standup".into(),
            description: None,
            dtstart: at(1, 10, 0),
            duration_minutes: 30,
            recurrence_rule: Some("FREQ=WEEKLY".into()),
            next_occurrence: Some(at(8, 10, 0)),
            notify_before_minutes: 15,
            notified_at: None,
            created_at: at(1, 8, 0),
        };
        let msg = TextFormatter.event(&event, at(8, 9, 45));
        assert!(msg.text.contains("⏰ 10:00-10:30 (in 15 min)"), "{}", msg.text);
        assert!(msg.text.contains("🔄 every week"));
        assert!(msg.actions.is_empty());

        let open_ended = Event { duration_minutes: 0, ..event };
        let msg = TextFormatter.event(&open_ended, at(8, 9, 45));
        assert!(msg.text.contains("⏰ 10:00 (in 15 min)"), "{}", msg.text);
    }

    #[test]
    fn due_labels() {
        let now = at(10, 12, 0);
        assert_eq!(due_label(&todo(1, "a", 3, Some(at(10, 11, 30))), now), "overdue by 30 min");
        assert_eq!(due_label(&todo(1, "a", 3, Some(at(8, 12, 0))), now), "overdue by 2 days");
        assert_eq!(due_label(&todo(1, "a", 3, Some(at(10, 15, 15))), now), "3 h 15 min left");
        assert_eq!(due_label(&todo(1, "a", 3, Some(at(11, 13, 0))), now), "tomorrow 13:00");
        assert_eq!(due_label(&todo(1, "a", 3, None), now), "");
    }

    #[test]
    fn batch_lists_every_todo() {
        let now = at(10, 12, 0);
        let todos = vec![
            (todo(1, "report", 5, Some(at(10, 13, 0))), UrgencyZone::Urgent),
            (todo(2, "groceries", 2, Some(at(10, 11, 0))), UrgencyZone::Overdue),
        ];
        let msg = TextFormatter.todo_batch(&todos, now);
        assert!(msg.text.starts_with("📋 **Todo reminder** (2 items)"));
        assert!(msg.text.contains("1. **report** - 1 h left ⭐5 `#1`"));
        assert!(msg.text.contains("2. **groceries** - overdue by 1 h ⭐2 `#2`"));
    }

    #[test]
    fn summary_truncates_todos() {
        let now = at(10, 8, 0);
        let todos: Vec<Todo> = (0..12)
            .map(|i| todo(i, &format!("task {i}"), 3, Some(at(10, 9, 0))))
            .collect();
        let msg = TextFormatter.daily_summary(&DailySummary {
            now,
            events: &[],
            todos: &todos,
        });
        assert!(msg.text.starts_with("☀️ **Good morning**"));
        assert!(msg.text.contains("• Nothing scheduled today"));
        assert!(msg.text.contains("• task 9 (due today)"));
        assert!(!msg.text.contains("task 10"));
        assert!(msg.text.contains("• ...and 2 more"));
    }

    #[test]
    fn greetings_by_hour() {
        assert_eq!(greeting(4), "Good evening");
        assert_eq!(greeting(5), "Good morning");
        assert_eq!(greeting(12), "Good afternoon");
        assert_eq!(greeting(18), "Good evening");
    }
}
