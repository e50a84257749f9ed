//! Maps a frequency and a date window to the dates a rule fires on.
//!
//! Everything here is a pure function of its inputs: no store access, no clock.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{last_day_of_month, DateWindow, Frequency, RecurringRule};

/// What to do when the anchored day does not exist in a month
/// (day 31 in April, Feb 29 outside leap years).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortMonthPolicy {
    /// Fire on the last day of the month instead.
    #[default]
    Clamp,
    /// Do not fire that month.
    Skip,
}

/// Ascending occurrence dates of `frequency` inside `window`, both bounds inclusive.
pub fn occurrences(
    frequency: &Frequency,
    window: DateWindow,
    policy: ShortMonthPolicy,
) -> Vec<NaiveDate> {
    match *frequency {
        Frequency::Monthly { day_of_month } => monthly(day_of_month, window, policy),
        Frequency::Weekly { day_of_week } => {
            let offset = (day_of_week.num_days_from_monday() + 7
                - window.start.weekday().num_days_from_monday())
                % 7;
            let mut dates = Vec::new();
            let mut current = window.start + Duration::days(offset as i64);
            while current <= window.end {
                dates.push(current);
                current += Duration::days(7);
            }
            dates
        }
        Frequency::Yearly {
            month_of_year,
            day_of_month,
        } => (window.start.year()..=window.end.year())
            .filter_map(|year| resolve_day(year, month_of_year, day_of_month, policy))
            .filter(|date| window.contains(*date))
            .collect(),
    }
}

/// Occurrences of a stored rule. Inactive rules never fire.
pub fn rule_occurrences(
    rule: &RecurringRule,
    window: DateWindow,
    policy: ShortMonthPolicy,
) -> Vec<NaiveDate> {
    if !rule.is_active {
        return Vec::new();
    }
    occurrences(&rule.frequency, window, policy)
}

/// Exact number of times `frequency` fires inside `window`.
pub fn count_in_window(frequency: &Frequency, window: DateWindow, policy: ShortMonthPolicy) -> u32 {
    occurrences(frequency, window, policy).len() as u32
}

fn monthly(day_of_month: u32, window: DateWindow, policy: ShortMonthPolicy) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let (mut year, mut month) = (window.start.year(), window.start.month());
    let (end_year, end_month) = (window.end.year(), window.end.month());
    while (year, month) <= (end_year, end_month) {
        if let Some(date) = resolve_day(year, month, day_of_month, policy) {
            if window.contains(date) {
                dates.push(date);
            }
        }
        if month == 12 {
            month = 1;
            year += 1;
        } else {
            month += 1;
        }
    }
    dates
}

fn resolve_day(year: i32, month: u32, day: u32, policy: ShortMonthPolicy) -> Option<NaiveDate> {
    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
        return Some(date);
    }
    match policy {
        ShortMonthPolicy::Clamp => {
            let clamped = last_day_of_month(year, month)?;
            tracing::debug!(year, month, day, %clamped, "anchor clamped to month end");
            Some(clamped)
        }
        ShortMonthPolicy::Skip => {
            tracing::debug!(year, month, day, "anchor missing from month, skipped");
            None
        }
    }
}
