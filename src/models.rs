use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Months, NaiveDate, Weekday};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Date windows
// ---------------------------------------------------------------------------

/// Inclusive `[start, end]` calendar range a sync or query operates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// The calendar month `year-month`.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::InvalidDate(format!("{year:04}-{month:02}")))?;
        let end = last_day_of_month(year, month)
            .ok_or_else(|| Error::InvalidDate(format!("{year:04}-{month:02}")))?;
        Ok(Self { start, end })
    }

    /// The calendar month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        // Every valid date has a valid month.
        let start = date.with_day(1).unwrap_or(date);
        let end = last_day_of_month(date.year(), date.month()).unwrap_or(date);
        Self { start, end }
    }

    /// Parse a `YYYY-MM` month into its window.
    pub fn parse_month(raw: &str) -> Result<Self> {
        let (year, month) = raw
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::InvalidDate(format!("expected YYYY-MM, got '{raw}'")))?;
        let year: i32 = year
            .parse()
            .map_err(|_| Error::InvalidDate(format!("expected YYYY-MM, got '{raw}'")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::InvalidDate(format!("expected YYYY-MM, got '{raw}'")))?;
        Self::month(year, month)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The calendar month after the one containing `end`.
    pub fn next_month(&self) -> Self {
        let next = self
            .end
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(1)))
            .unwrap_or(self.end);
        Self::containing(next)
    }

    /// Number of distinct calendar months the window touches.
    pub fn months_touched(&self) -> u32 {
        let start_idx = self.start.year() * 12 + self.start.month0() as i32;
        let end_idx = self.end.year() * 12 + self.end.month0() as i32;
        (end_idx - start_idx + 1) as u32
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

/// When a rule fires. Each variant carries exactly the anchor it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Monthly { day_of_month: u32 },
    Weekly { day_of_week: Weekday },
    Yearly { month_of_year: u32, day_of_month: u32 },
}

impl Frequency {
    pub fn monthly(day_of_month: u32) -> std::result::Result<Self, String> {
        if !(1..=31).contains(&day_of_month) {
            return Err(format!("day_of_month {day_of_month} outside 1..=31"));
        }
        Ok(Self::Monthly { day_of_month })
    }

    pub fn weekly(day_of_week: Weekday) -> Self {
        Self::Weekly { day_of_week }
    }

    pub fn yearly(month_of_year: u32, day_of_month: u32) -> std::result::Result<Self, String> {
        if !(1..=12).contains(&month_of_year) {
            return Err(format!("month_of_year {month_of_year} outside 1..=12"));
        }
        // 2000 is a leap year, so Feb 29 is accepted here.
        let max_day = last_day_of_month(2000, month_of_year)
            .map(|d| d.day())
            .unwrap_or(31);
        if day_of_month < 1 || day_of_month > max_day {
            return Err(format!(
                "day_of_month {day_of_month} does not exist in month {month_of_year}"
            ));
        }
        Ok(Self::Yearly {
            month_of_year,
            day_of_month,
        })
    }

    /// Parse the `M-D` form used on the command line, e.g. `3-1`.
    pub fn parse_yearly(raw: &str) -> std::result::Result<Self, String> {
        let (m, d) = raw
            .split_once('-')
            .ok_or_else(|| format!("expected M-D, got '{raw}'"))?;
        let m: u32 = m.trim().parse().map_err(|_| format!("bad month in '{raw}'"))?;
        let d: u32 = d.trim().parse().map_err(|_| format!("bad day in '{raw}'"))?;
        Self::yearly(m, d)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Monthly { .. } => "monthly",
            Self::Weekly { .. } => "weekly",
            Self::Yearly { .. } => "yearly",
        }
    }

    /// Rebuild a frequency from its stored columns, validating the anchor.
    pub fn from_columns(
        kind: &str,
        day_of_month: Option<i64>,
        day_of_week: Option<i64>,
        month_of_year: Option<i64>,
    ) -> std::result::Result<Self, String> {
        match kind {
            "monthly" => {
                let day = day_of_month.ok_or("monthly rule without day_of_month")?;
                Self::monthly(to_u32(day)?)
            }
            "weekly" => {
                let dow = day_of_week.ok_or("weekly rule without day_of_week")?;
                weekday_from_index(dow).map(Self::weekly)
            }
            "yearly" => {
                let month = month_of_year.ok_or("yearly rule without month_of_year")?;
                let day = day_of_month.ok_or("yearly rule without day_of_month")?;
                Self::yearly(to_u32(month)?, to_u32(day)?)
            }
            other => Err(format!("unknown frequency '{other}'")),
        }
    }

    /// `(kind, day_of_month, day_of_week, month_of_year)` as stored.
    pub fn to_columns(&self) -> (&'static str, Option<i64>, Option<i64>, Option<i64>) {
        match *self {
            Self::Monthly { day_of_month } => ("monthly", Some(day_of_month as i64), None, None),
            Self::Weekly { day_of_week } => (
                "weekly",
                None,
                Some(day_of_week.num_days_from_monday() as i64),
                None,
            ),
            Self::Yearly {
                month_of_year,
                day_of_month,
            } => (
                "yearly",
                Some(day_of_month as i64),
                None,
                Some(month_of_year as i64),
            ),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly { day_of_month } => write!(f, "Monthly on day {day_of_month}"),
            Self::Weekly { day_of_week } => write!(f, "Weekly on {day_of_week}"),
            Self::Yearly {
                month_of_year,
                day_of_month,
            } => write!(f, "Yearly on {month_of_year:02}-{day_of_month:02}"),
        }
    }
}

fn to_u32(value: i64) -> std::result::Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("anchor value {value} out of range"))
}

fn weekday_from_index(index: i64) -> std::result::Result<Weekday, String> {
    match index {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(format!("day_of_week {other} outside 0..=6")),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecurringRule {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub category_id: i64,
    pub amount: Decimal,
    pub description: String,
    pub frequency: Frequency,
    pub is_active: bool,
    pub tags: BTreeSet<String>,
}

/// A recurring paycheck. Deductions come precomputed per month.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeRule {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub description: String,
    pub gross_amount: Decimal,
    pub frequency: Frequency,
    pub monthly_deductions: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub monthly_budget: Decimal,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventState {
    Projected,
    Actual,
}

impl EventState {
    /// `Actual` iff the date is strictly before `as_of`.
    pub fn classify(date: NaiveDate, as_of: NaiveDate) -> Self {
        if date < as_of {
            Self::Actual
        } else {
            Self::Projected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projected => "projected",
            Self::Actual => "actual",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "projected" => Some(Self::Projected),
            "actual" => Some(Self::Actual),
            _ => None,
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dated financial record. `rule_id = None` marks a user-entered event.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedEvent {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub category_id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub total_amount: Decimal,
    pub description: String,
    pub state: EventState,
    pub rule_id: Option<i64>,
    pub tags: BTreeSet<String>,
}

impl MaterializedEvent {
    /// Build the event a rule produces on `date`, classified against `as_of`.
    pub fn from_rule(rule: &RecurringRule, date: NaiveDate, as_of: NaiveDate) -> Self {
        Self {
            id: None,
            owner_id: rule.owner_id,
            category_id: rule.category_id,
            date,
            amount: rule.amount,
            total_amount: rule.amount,
            description: rule.description.clone(),
            state: EventState::classify(date, as_of),
            rule_id: rule.id,
            tags: rule.tags.clone(),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.rule_id.is_none()
    }
}
