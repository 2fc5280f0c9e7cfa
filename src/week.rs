use std::{cmp::Ordering, fmt::Display};

use chrono::{Datelike as _, NaiveDate, TimeDelta};
use serde::Deserialize;

/// A week token as it appears in the analytics table, e.g. `W32` or
/// `2025-W32`.
///
/// Labels that follow the `[YYYY-]W<n>` pattern are ordered by year and then
/// by week number, so `W9` sorts before `W10`. Anything else sorts after
/// them, by its raw text. Tables are expected to use one of the two patterns
/// consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub struct WeekLabel {
    raw: String,
    parsed: Option<IsoWeek>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct IsoWeek {
    /// `None` when the label carries only the week number.
    year: Option<i32>,
    week: u32,
}

impl WeekLabel {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = parse_iso_week(raw.trim());
        Self { raw, parsed }
    }

    /// The label the report uses for the ISO week containing `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        Self::new(format!("W{}", date.iso_week().week()))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The ISO week number, if the label has one.
    pub fn week_number(&self) -> Option<u32> {
        self.parsed.map(|iso| iso.week)
    }

    /// Whether this label names the ISO week containing `date`. A label
    /// without a year matches on the week number alone.
    pub fn is_week_of(&self, date: NaiveDate) -> bool {
        let iso = date.iso_week();
        match self.parsed {
            Some(IsoWeek { year: Some(year), week }) => year == iso.year() && week == iso.week(),
            Some(IsoWeek { year: None, week }) => week == iso.week(),
            None => self.raw == Self::for_date(date).raw,
        }
    }
}

fn parse_iso_week(s: &str) -> Option<IsoWeek> {
    let (year, rest) = match s.split_once('-') {
        Some((year, rest)) => (Some(year.parse::<i32>().ok()?), rest),
        None => (None, s),
    };
    let digits = rest.strip_prefix('W').or_else(|| rest.strip_prefix('w'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let week = digits.parse().ok()?;
    Some(IsoWeek { year, week })
}

impl Ord for WeekLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            // labels without a year sort before year-qualified ones
            (Some(a), Some(b)) => a.cmp(b).then_with(|| self.raw.cmp(&other.raw)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl PartialOrd for WeekLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for WeekLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<String> for WeekLabel {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for WeekLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The day whose ISO week the report is expected to cover: one week before
/// `today`.
pub fn reporting_day(today: NaiveDate) -> NaiveDate {
    today - TimeDelta::days(7)
}

/// The week label the most recent data should carry when the report runs on
/// `today`.
pub fn expected_report_week(today: NaiveDate) -> WeekLabel {
    WeekLabel::for_date(reporting_day(today))
}
