//! crates/lifeline_core/src/rrule/mod.rs
//!
//! RFC 5545-style recurrence rules: the parsed representation, the string codec,
//! and re-exports of the evaluation engine.
//!
//! Supported parts: `FREQ`, `INTERVAL`, `BYHOUR`, `BYMINUTE`, `BYDAY` (plain
//! weekdays, no ordinals), `BYMONTHDAY`, `BYMONTH`, `COUNT`, `UNTIL`, and
//! `WKST=MO`. Anything else is rejected so a bad rule never silently fires.

pub mod describe;
pub mod engine;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc, Weekday};
use std::fmt;
use std::str::FromStr;

pub use describe::{describe, describe_str};
pub use engine::{
    next_occurrence, next_occurrence_at, next_occurrence_strict, next_occurrences, Occurrences,
};

/// Errors produced while parsing a recurrence string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("recurrence rule has no FREQ part")]
    MissingFrequency,
    #[error("unknown frequency '{0}'")]
    UnknownFrequency(String),
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("unsupported rule part '{0}'")]
    Unsupported(String),
    #[error("malformed rule part '{0}'")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOURLY" => Ok(Frequency::Hourly),
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(RuleError::UnknownFrequency(other.to_string())),
        }
    }
}

/// The end bound of a rule. `Z`-suffixed values are UTC instants; bare values are
/// local wall-clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    Utc(DateTime<Utc>),
    Local(NaiveDateTime),
}

impl Until {
    /// The bound as a local wall-clock time, comparable with occurrences.
    pub fn to_local(&self) -> NaiveDateTime {
        match self {
            Until::Utc(instant) => instant.with_timezone(&Local).naive_local(),
            Until::Local(wall) => *wall,
        }
    }
}

/// A parsed recurrence rule. Pure data; evaluation lives in [`engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub by_hour: Vec<u32>,
    pub by_minute: Vec<u32>,
    pub by_day: Vec<Weekday>,
    /// Days of month; negative values count back from the month's last day.
    pub by_month_day: Vec<i32>,
    pub by_month: Vec<u32>,
    pub count: Option<u32>,
    pub until: Option<Until>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            count: None,
            until: None,
        }
    }

    pub fn parse(s: &str) -> Result<Self, RuleError> {
        s.parse()
    }
}

/// A rule string only counts as recurring when it names a frequency.
pub fn is_recurring(rule: &str) -> bool {
    !rule.trim().is_empty() && rule.to_ascii_uppercase().contains("FREQ=")
}

impl FromStr for RecurrenceRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = body.strip_prefix("RRULE:").unwrap_or(body);

        let mut freq = None;
        let mut rule = RecurrenceRule::new(Frequency::Daily);

        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| RuleError::Malformed(part.to_string()))?;
            let key = key.trim().to_ascii_uppercase();
            let value = value.trim().to_ascii_uppercase();

            match key.as_str() {
                "FREQ" => freq = Some(value.parse::<Frequency>()?),
                "INTERVAL" => {
                    let n: u32 = parse_number(&key, &value)?;
                    if n == 0 {
                        return Err(invalid(&key, &value));
                    }
                    rule.interval = n;
                }
                "BYHOUR" => rule.by_hour = parse_list(&key, &value, 0..=23)?,
                "BYMINUTE" => rule.by_minute = parse_list(&key, &value, 0..=59)?,
                "BYMONTH" => rule.by_month = parse_list(&key, &value, 1..=12)?,
                "BYMONTHDAY" => {
                    rule.by_month_day = value
                        .split(',')
                        .map(|v| {
                            let day: i32 = parse_number(&key, v)?;
                            if day == 0 || !(-31..=31).contains(&day) {
                                return Err(invalid(&key, v));
                            }
                            Ok(day)
                        })
                        .collect::<Result<_, _>>()?;
                }
                "BYDAY" => {
                    rule.by_day = value
                        .split(',')
                        .map(|v| parse_weekday(v.trim()).ok_or_else(|| invalid(&key, v)))
                        .collect::<Result<_, _>>()?;
                }
                "COUNT" => rule.count = Some(parse_number(&key, &value)?),
                "UNTIL" => rule.until = Some(parse_until(&value)?),
                "WKST" if value == "MO" => {}
                _ => return Err(RuleError::Unsupported(part.to_string())),
            }
        }

        rule.freq = freq.ok_or(RuleError::MissingFrequency)?;
        Ok(rule)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq.as_str())?;
        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.by_hour.is_empty() {
            write!(f, ";BYHOUR={}", join(&self.by_hour))?;
        }
        if !self.by_minute.is_empty() {
            write!(f, ";BYMINUTE={}", join(&self.by_minute))?;
        }
        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter().map(|d| weekday_code(*d)).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        if !self.by_month_day.is_empty() {
            write!(f, ";BYMONTHDAY={}", join(&self.by_month_day))?;
        }
        if !self.by_month.is_empty() {
            write!(f, ";BYMONTH={}", join(&self.by_month))?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        match self.until {
            Some(Until::Utc(instant)) => write!(f, ";UNTIL={}", instant.format("%Y%m%dT%H%M%SZ"))?,
            Some(Until::Local(wall)) => write!(f, ";UNTIL={}", wall.format("%Y%m%dT%H%M%S"))?,
            None => {}
        }
        Ok(())
    }
}

/// The two-letter RFC 5545 code for a weekday.
pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_until(value: &str) -> Result<Until, RuleError> {
    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .map(|naive| Until::Utc(naive.and_utc()))
            .map_err(|_| invalid("UNTIL", value));
    }
    if value.contains('T') {
        return NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
            .map(Until::Local)
            .map_err(|_| invalid("UNTIL", value));
    }
    // A bare date bounds the rule through the end of that day.
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(Until::Local)
        .ok_or_else(|| invalid("UNTIL", value))
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, RuleError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_list(
    key: &str,
    value: &str,
    range: std::ops::RangeInclusive<u32>,
) -> Result<Vec<u32>, RuleError> {
    value
        .split(',')
        .map(|v| {
            let n: u32 = parse_number(key, v)?;
            if range.contains(&n) {
                Ok(n)
            } else {
                Err(invalid(key, v))
            }
        })
        .collect()
}

fn invalid(key: &str, value: &str) -> RuleError {
    RuleError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
