//! Occurrence expansion for [`RecurrenceRule`].
//!
//! Everything here works on naive wall-clock times in the deployment's local zone.
//! Expansion walks the rule period by period (hour, day, week, month or year,
//! stepped by `INTERVAL`), generates the sorted candidate times of each period and
//! filters them against the anchor, `COUNT` and `UNTIL`.

use super::{Frequency, RecurrenceRule};
use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Weekday,
};
use std::collections::VecDeque;
use tracing::warn;

/// Upper bound on the strict search loop.
const STRICT_SEARCH_CAP: usize = 1000;
/// Consecutive periods without a candidate before a rule is treated as exhausted.
const MAX_EMPTY_PERIODS: u32 = 50_000;

/// The first occurrence at or after `after`, or `None` once the rule is exhausted.
pub fn next_occurrence(
    rule: &RecurrenceRule,
    anchor: NaiveDateTime,
    after: NaiveDateTime,
) -> Option<NaiveDateTime> {
    Occurrences::starting_near(rule, anchor, after).find(|candidate| *candidate >= after)
}

/// The first occurrence strictly later than `after`.
///
/// Steps one second past each non-advancing result and gives up after a bounded
/// number of attempts.
pub fn next_occurrence_strict(
    rule: &RecurrenceRule,
    anchor: NaiveDateTime,
    after: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let mut cursor = after;
    for _ in 0..STRICT_SEARCH_CAP {
        let next = next_occurrence(rule, anchor, cursor)?;
        if next > after {
            return Some(next);
        }
        cursor = next.checked_add_signed(Duration::seconds(1))?;
    }
    warn!(%rule, %anchor, %after, "Strict occurrence search hit its iteration cap");
    None
}

/// Up to `limit` consecutive occurrences at or after `after`.
pub fn next_occurrences(
    rule: &RecurrenceRule,
    anchor: NaiveDateTime,
    after: NaiveDateTime,
    limit: usize,
) -> Vec<NaiveDateTime> {
    Occurrences::starting_near(rule, anchor, after)
        .filter(|candidate| *candidate >= after)
        .take(limit)
        .collect()
}

/// Zone-aware entry point. The anchor's wall-clock reading is taken as local time
/// whatever offset it carries, so a rule written for "09:00" fires at 09:00 here.
pub fn next_occurrence_at<Tz: TimeZone>(
    rule: &RecurrenceRule,
    anchor: &DateTime<Tz>,
    after: &DateTime<Local>,
) -> Option<DateTime<Local>> {
    let mut cursor = after.naive_local();
    // Wall-clock times that fall into a DST gap have no local instant; skip them.
    for _ in 0..STRICT_SEARCH_CAP {
        let next = next_occurrence(rule, anchor.naive_local(), cursor)?;
        if let Some(instant) = Local.from_local_datetime(&next).earliest() {
            return Some(instant);
        }
        cursor = next.checked_add_signed(Duration::seconds(1))?;
    }
    None
}

/// Ordered iterator over every occurrence of a rule from its anchor.
pub struct Occurrences {
    freq: Frequency,
    interval: i64,
    anchor: NaiveDateTime,
    until: Option<NaiveDateTime>,
    count: Option<u32>,
    hours: Vec<u32>,
    minutes: Vec<u32>,
    days: Vec<Weekday>,
    month_days: Vec<i32>,
    months: Vec<u32>,
    period: i64,
    emitted: u32,
    empty_run: u32,
    buffer: VecDeque<NaiveDateTime>,
    done: bool,
}

impl Occurrences {
    pub fn new(rule: &RecurrenceRule, anchor: NaiveDateTime) -> Self {
        let anchor = anchor.with_nanosecond(0).unwrap_or(anchor);

        let mut days = rule.by_day.clone();
        let mut month_days = rule.by_month_day.clone();
        let mut months = rule.by_month.clone();
        if days.is_empty() && month_days.is_empty() {
            match rule.freq {
                Frequency::Yearly => {
                    if months.is_empty() {
                        months.push(anchor.month());
                    }
                    month_days.push(anchor.day() as i32);
                }
                Frequency::Monthly => month_days.push(anchor.day() as i32),
                Frequency::Weekly => days.push(anchor.weekday()),
                Frequency::Daily | Frequency::Hourly => {}
            }
        }

        let mut hours = if !rule.by_hour.is_empty() {
            rule.by_hour.clone()
        } else if rule.freq == Frequency::Hourly {
            (0..24).collect()
        } else {
            vec![anchor.hour()]
        };
        hours.sort_unstable();
        hours.dedup();

        let mut minutes = if rule.by_minute.is_empty() {
            vec![anchor.minute()]
        } else {
            rule.by_minute.clone()
        };
        minutes.sort_unstable();
        minutes.dedup();

        Self {
            freq: rule.freq,
            interval: i64::from(rule.interval.max(1)),
            anchor,
            until: rule.until.map(|u| u.to_local()),
            count: rule.count,
            hours,
            minutes,
            days,
            month_days,
            months,
            period: 0,
            emitted: 0,
            empty_run: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Like [`Occurrences::new`], but when no `COUNT` has to be tracked it jumps
    /// straight to the period containing `after`.
    pub fn starting_near(rule: &RecurrenceRule, anchor: NaiveDateTime, after: NaiveDateTime) -> Self {
        let mut occurrences = Self::new(rule, anchor);
        if occurrences.count.is_none() && after > occurrences.anchor {
            let units = occurrences.units_between(after);
            let period = units.div_euclid(occurrences.interval);
            if period > 0 {
                occurrences.period = period;
            }
        }
        occurrences
    }

    /// Whole frequency units from the anchor's period to the one holding `t`.
    fn units_between(&self, t: NaiveDateTime) -> i64 {
        let anchor = self.anchor;
        match self.freq {
            Frequency::Hourly => {
                (truncate_to_hour(t) - truncate_to_hour(anchor)).num_hours()
            }
            Frequency::Daily => (t.date() - anchor.date()).num_days(),
            Frequency::Weekly => (week_start(t.date()) - week_start(anchor.date())).num_days() / 7,
            Frequency::Monthly => month_index(t.date()) - month_index(anchor.date()),
            Frequency::Yearly => i64::from(t.year() - anchor.year()),
        }
    }

    fn date_matches(&self, date: NaiveDate) -> bool {
        if !self.months.is_empty() && !self.months.contains(&date.month()) {
            return false;
        }
        if !self.days.is_empty() && !self.days.contains(&date.weekday()) {
            return false;
        }
        if !self.month_days.is_empty() {
            let last = days_in_month(date.year(), date.month()) as i32;
            let day = date.day() as i32;
            let hit = self
                .month_days
                .iter()
                .any(|&md| if md > 0 { md == day } else { last + md + 1 == day });
            if !hit {
                return false;
            }
        }
        true
    }

    fn push_times(&self, date: NaiveDate, out: &mut Vec<NaiveDateTime>) {
        if !self.date_matches(date) {
            return;
        }
        for &hour in &self.hours {
            for &minute in &self.minutes {
                if let Some(t) = date.and_hms_opt(hour, minute, self.anchor.second()) {
                    out.push(t);
                }
            }
        }
    }

    /// Start of the current period and its candidate times. `None` on calendar overflow.
    fn expand_period(&self) -> Option<(NaiveDateTime, Vec<NaiveDateTime>)> {
        let step = self.period.checked_mul(self.interval)?;
        let anchor = self.anchor;
        let mut out = Vec::new();

        let start = match self.freq {
            Frequency::Hourly => {
                let start = truncate_to_hour(anchor).checked_add_signed(Duration::try_hours(step)?)?;
                if self.date_matches(start.date()) && self.hours.contains(&start.hour()) {
                    for &minute in &self.minutes {
                        if let Some(t) = start.date().and_hms_opt(start.hour(), minute, anchor.second()) {
                            out.push(t);
                        }
                    }
                }
                start
            }
            Frequency::Daily => {
                let date = anchor.date().checked_add_signed(Duration::try_days(step)?)?;
                self.push_times(date, &mut out);
                date.and_hms_opt(0, 0, 0)?
            }
            Frequency::Weekly => {
                let monday = week_start(anchor.date())
                    .checked_add_signed(Duration::try_days(step.checked_mul(7)?)?)?;
                for offset in 0..7 {
                    let date = monday.checked_add_signed(Duration::days(offset))?;
                    self.push_times(date, &mut out);
                }
                monday.and_hms_opt(0, 0, 0)?
            }
            Frequency::Monthly => {
                let index = month_index(anchor.date()).checked_add(step)?;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                let month = index.rem_euclid(12) as u32 + 1;
                for day in 1..=days_in_month(year, month) {
                    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                        self.push_times(date, &mut out);
                    }
                }
                NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?
            }
            Frequency::Yearly => {
                let year = anchor.year().checked_add(i32::try_from(step).ok()?)?;
                for month in 1..=12u32 {
                    if !self.months.is_empty() && !self.months.contains(&month) {
                        continue;
                    }
                    for day in 1..=days_in_month(year, month) {
                        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                            self.push_times(date, &mut out);
                        }
                    }
                }
                NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?
            }
        };

        out.sort_unstable();
        Some((start, out))
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(candidate) = self.buffer.pop_front() {
                if candidate < self.anchor {
                    continue;
                }
                if self.until.is_some_and(|until| candidate > until)
                    || self.count.is_some_and(|count| self.emitted >= count)
                {
                    self.done = true;
                    return None;
                }
                self.emitted += 1;
                return Some(candidate);
            }

            if self.empty_run >= MAX_EMPTY_PERIODS {
                self.done = true;
                return None;
            }

            let Some((start, candidates)) = self.expand_period() else {
                self.done = true;
                return None;
            };
            if self.until.is_some_and(|until| start > until) {
                self.done = true;
                return None;
            }

            self.period += 1;
            if candidates.is_empty() {
                self.empty_run += 1;
            } else {
                self.empty_run = 0;
                self.buffer.extend(candidates);
            }
        }
    }
}

fn truncate_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_hms_opt(t.hour(), 0, 0).unwrap_or(t)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}
