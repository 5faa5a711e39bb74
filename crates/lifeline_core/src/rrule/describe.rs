//! Short English phrasing of a rule for chat messages.

use super::{Frequency, RecurrenceRule};
use chrono::Weekday;

/// Renders e.g. `every 2 weeks on Mon, Fri at 9:00, 5 times`.
pub fn describe(rule: &RecurrenceRule) -> String {
    let unit = match rule.freq {
        Frequency::Hourly => "hour",
        Frequency::Daily => "day",
        Frequency::Weekly => "week",
        Frequency::Monthly => "month",
        Frequency::Yearly => "year",
    };
    let mut text = if rule.interval > 1 {
        format!("every {} {}s", rule.interval, unit)
    } else {
        format!("every {}", unit)
    };

    if !rule.by_day.is_empty() {
        let days: Vec<&str> = rule.by_day.iter().map(|d| day_name(*d)).collect();
        text.push_str(" on ");
        text.push_str(&days.join(", "));
    }

    if !rule.by_hour.is_empty() {
        let minute = match rule.by_minute.as_slice() {
            [single] => *single,
            _ => 0,
        };
        let mut hours = rule.by_hour.clone();
        hours.sort_unstable();
        if hours.len() > 3 {
            let first = hours[0];
            let last = hours[hours.len() - 1];
            text.push_str(&format!(" {}:{:02}-{}:{:02}", first, minute, last, minute));
        } else {
            let times: Vec<String> = hours.iter().map(|h| format!("{}:{:02}", h, minute)).collect();
            text.push_str(" at ");
            text.push_str(&times.join(", "));
        }
    }

    if let Some(count) = rule.count {
        text.push_str(&format!(", {} times", count));
    }
    if let Some(until) = rule.until {
        text.push_str(&format!(", until {}", until.to_local().format("%Y-%m-%d")));
    }
    text
}

/// Like [`describe`] for a stored rule string; unparsable rules are echoed back.
pub fn describe_str(rule: &str) -> String {
    if !super::is_recurring(rule) {
        return "once".to_string();
    }
    match rule.parse::<RecurrenceRule>() {
        Ok(parsed) => describe(&parsed),
        Err(_) => rule.to_string(),
    }
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases() {
        let cases = [
            ("FREQ=DAILY", "every day"),
            ("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR", "every 2 weeks on Mon, Fri"),
            ("FREQ=DAILY;BYHOUR=9;BYMINUTE=30", "every day at 9:30"),
            ("FREQ=HOURLY;BYHOUR=9,10,11,12,13", "every hour 9:00-13:00"),
            ("FREQ=MONTHLY;COUNT=5", "every month, 5 times"),
            ("FREQ=DAILY;UNTIL=20240301", "every day, until 2024-03-01"),
        ];
        for (rule, expected) in cases {
            assert_eq!(describe_str(rule), expected, "rule {rule}");
        }
    }

    #[test]
    fn non_recurring_and_broken_rules() {
        assert_eq!(describe_str(""), "once");
        assert_eq!(describe_str("FREQ=SOMETIMES"), "FREQ=SOMETIMES");
    }
}
