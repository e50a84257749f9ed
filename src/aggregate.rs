//! Read-side views over materialized events for dashboards and planning.
//!
//! Nothing here writes events except the defensive sweep in [`summarize`].

use std::collections::BTreeMap;

use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::control::RunControl;
use crate::error::Result;
use crate::events::{query_events, EventFilter};
use crate::models::{DateWindow, EventState, MaterializedEvent};
use crate::occurrence::{count_in_window, ShortMonthPolicy};
use crate::rules::{list_categories, list_income_rules};
use crate::sweeper::sweep;

// ---------------------------------------------------------------------------
// Partitions and totals
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Partition {
    pub actual: Vec<MaterializedEvent>,
    pub projected: Vec<MaterializedEvent>,
}

pub fn partition_by_state(events: Vec<MaterializedEvent>) -> Partition {
    let (actual, projected): (Vec<_>, Vec<_>) = events
        .into_iter()
        .partition(|e| e.state == EventState::Actual);
    Partition { actual, projected }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitTotal {
    pub actual: Decimal,
    pub projected: Decimal,
}

impl SplitTotal {
    fn add(&mut self, event: &MaterializedEvent) {
        match event.state {
            EventState::Actual => self.actual += event.total_amount,
            EventState::Projected => self.projected += event.total_amount,
        }
    }

    pub fn combined(&self) -> Decimal {
        self.actual + self.projected
    }
}

pub fn totals_by_category(events: &[MaterializedEvent]) -> BTreeMap<i64, SplitTotal> {
    let mut totals: BTreeMap<i64, SplitTotal> = BTreeMap::new();
    for event in events {
        totals.entry(event.category_id).or_default().add(event);
    }
    totals
}

/// Totals per tag. An event with several tags counts toward each of them.
pub fn totals_by_tag(events: &[MaterializedEvent]) -> BTreeMap<String, SplitTotal> {
    let mut totals: BTreeMap<String, SplitTotal> = BTreeMap::new();
    for event in events {
        for tag in &event.tags {
            totals.entry(tag.clone()).or_default().add(event);
        }
    }
    totals
}

// ---------------------------------------------------------------------------
// Income
// ---------------------------------------------------------------------------

pub struct IncomeLine {
    pub description: String,
    pub paychecks: u32,
    pub gross: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
}

pub struct IncomeSummary {
    pub lines: Vec<IncomeLine>,
    pub gross: Decimal,
    pub net: Decimal,
}

/// Gross and net income in `window` from the exact number of paychecks each
/// active income rule produces there.
pub fn income_summary(
    conn: &Connection,
    owner_id: i64,
    window: DateWindow,
    policy: ShortMonthPolicy,
) -> Result<IncomeSummary> {
    let months = Decimal::from(window.months_touched());
    let lines: Vec<IncomeLine> = list_income_rules(conn, owner_id, false)?
        .into_iter()
        .map(|rule| {
            let paychecks = count_in_window(&rule.frequency, window, policy);
            let gross = rule.gross_amount * Decimal::from(paychecks);
            let deductions = rule.monthly_deductions * months;
            IncomeLine {
                description: rule.description,
                paychecks,
                gross,
                deductions,
                net: gross - deductions,
            }
        })
        .collect();

    let gross = lines.iter().map(|l| l.gross).sum();
    let net = lines.iter().map(|l| l.net).sum();
    Ok(IncomeSummary { lines, gross, net })
}

// ---------------------------------------------------------------------------
// Spend vs budget
// ---------------------------------------------------------------------------

pub struct BudgetLine {
    pub category_id: i64,
    pub name: String,
    pub budget: Decimal,
    pub spent: SplitTotal,
    pub remaining: Decimal,
}

pub struct BudgetReport {
    pub lines: Vec<BudgetLine>,
    pub total_budget: Decimal,
    pub total_spent: SplitTotal,
}

pub fn spend_vs_budget(
    conn: &Connection,
    owner_id: i64,
    window: DateWindow,
    events: &[MaterializedEvent],
) -> Result<BudgetReport> {
    let months = Decimal::from(window.months_touched());
    let mut spent = totals_by_category(events);

    let mut lines = Vec::new();
    for category in list_categories(conn, owner_id)? {
        let total = spent.remove(&category.id).unwrap_or_default();
        let budget = category.monthly_budget * months;
        lines.push(BudgetLine {
            category_id: category.id,
            name: category.name,
            budget,
            remaining: budget - total.combined(),
            spent: total,
        });
    }

    let total_budget = lines.iter().map(|l| l.budget).sum();
    let total_spent = SplitTotal {
        actual: lines.iter().map(|l| l.spent.actual).sum(),
        projected: lines.iter().map(|l| l.spent.projected).sum(),
    };
    Ok(BudgetReport {
        lines,
        total_budget,
        total_spent,
    })
}

// ---------------------------------------------------------------------------
// Cash flow
// ---------------------------------------------------------------------------

pub struct Cashflow {
    pub income_net: Decimal,
    pub spent: SplitTotal,
    /// Net income left after actual and projected spend.
    pub remaining: Decimal,
}

pub fn cashflow(income: &IncomeSummary, budget: &BudgetReport) -> Cashflow {
    Cashflow {
        income_net: income.net,
        spent: budget.total_spent.clone(),
        remaining: income.net - budget.total_spent.combined(),
    }
}

// ---------------------------------------------------------------------------
// Window summary
// ---------------------------------------------------------------------------

pub struct WindowSummary {
    pub window: DateWindow,
    pub budget: BudgetReport,
    pub income: IncomeSummary,
    pub cashflow: Cashflow,
    pub by_tag: BTreeMap<String, SplitTotal>,
}

/// Sweep, then build every view for `window` from one read of its events.
pub fn summarize(
    conn: &Connection,
    owner_id: i64,
    window: DateWindow,
    ctl: &RunControl,
    policy: ShortMonthPolicy,
) -> Result<WindowSummary> {
    sweep(conn, owner_id, ctl)?;
    let events = query_events(conn, owner_id, window, &EventFilter::default())?;
    let budget = spend_vs_budget(conn, owner_id, window, &events)?;
    let income = income_summary(conn, owner_id, window, policy)?;
    let cashflow = cashflow(&income, &budget);
    Ok(WindowSummary {
        window,
        budget,
        income,
        cashflow,
        by_tag: totals_by_tag(&events),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{add_category, dec, test_db};
    use crate::events::insert_event;
    use crate::models::{Frequency, IncomeRule};
    use crate::rules::add_income_rule;
    use chrono::{NaiveDate, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn event(category_id: i64, day: u32, amount: &str, state: EventState, tags: &[&str]) -> MaterializedEvent {
        MaterializedEvent {
            id: None,
            owner_id: 1,
            category_id,
            date: d(2024, 3, day),
            amount: dec(amount),
            total_amount: dec(amount),
            description: format!("item {day}"),
            state,
            rule_id: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn paycheck(conn: &Connection, gross: &str, frequency: Frequency, deductions: &str) {
        add_income_rule(
            conn,
            &IncomeRule {
                id: None,
                owner_id: 1,
                description: "Salary".to_string(),
                gross_amount: dec(gross),
                frequency,
                monthly_deductions: dec(deductions),
                is_active: true,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_partition_by_state() {
        let events = vec![
            event(1, 1, "10", EventState::Actual, &[]),
            event(1, 20, "5", EventState::Projected, &[]),
            event(1, 2, "3", EventState::Actual, &[]),
        ];
        let p = partition_by_state(events);
        assert_eq!(p.actual.len(), 2);
        assert_eq!(p.projected.len(), 1);
    }

    #[test]
    fn test_totals_by_category_and_tag() {
        let events = vec![
            event(1, 1, "10", EventState::Actual, &["home", "fixed"]),
            event(1, 20, "5", EventState::Projected, &["home"]),
            event(2, 2, "3", EventState::Actual, &[]),
        ];
        let by_cat = totals_by_category(&events);
        assert_eq!(by_cat[&1], SplitTotal { actual: dec("10"), projected: dec("5") });
        assert_eq!(by_cat[&2].combined(), dec("3"));

        let by_tag = totals_by_tag(&events);
        assert_eq!(by_tag["home"].combined(), dec("15"));
        assert_eq!(by_tag["fixed"].actual, dec("10"));
        assert!(!by_tag.contains_key(""));
    }

    #[test]
    fn test_income_uses_exact_paycheck_count() {
        let (_dir, conn) = test_db();
        // March 2024 has five Fridays.
        paycheck(&conn, "1000", Frequency::weekly(Weekday::Fri), "1200");
        let march = DateWindow::month(2024, 3).unwrap();
        let income = income_summary(&conn, 1, march, ShortMonthPolicy::Clamp).unwrap();
        assert_eq!(income.lines[0].paychecks, 5);
        assert_eq!(income.gross, dec("5000"));
        assert_eq!(income.net, dec("3800"));

        let april = DateWindow::month(2024, 4).unwrap();
        let income = income_summary(&conn, 1, april, ShortMonthPolicy::Clamp).unwrap();
        assert_eq!(income.lines[0].paychecks, 4);
    }

    #[test]
    fn test_budget_scales_with_months() {
        let (_dir, conn) = test_db();
        let groceries = add_category(&conn, 1, "Groceries", "400");
        let quarter = DateWindow::new(d(2024, 1, 1), d(2024, 3, 31)).unwrap();
        let events = vec![event(groceries, 5, "150", EventState::Actual, &[])];
        let report = spend_vs_budget(&conn, 1, quarter, &events).unwrap();
        assert_eq!(report.lines[0].budget, dec("1200"));
        assert_eq!(report.lines[0].remaining, dec("1050"));
    }

    #[test]
    fn test_summarize_sweeps_and_combines() {
        let (_dir, conn) = test_db();
        let bills = add_category(&conn, 1, "Bills", "500");
        insert_event(&conn, &event(bills, 5, "100", EventState::Projected, &[])).unwrap();
        insert_event(&conn, &event(bills, 25, "50", EventState::Projected, &["fixed"])).unwrap();
        paycheck(&conn, "2000", Frequency::monthly(1).unwrap(), "500");

        let march = DateWindow::month(2024, 3).unwrap();
        let summary = summarize(&conn, 1, march, &RunControl::new(d(2024, 3, 15)), ShortMonthPolicy::Clamp).unwrap();
        assert_eq!(summary.budget.total_spent, SplitTotal { actual: dec("100"), projected: dec("50") });
        assert_eq!(summary.income.net, dec("1500"));
        assert_eq!(summary.cashflow.remaining, dec("1350"));
        assert_eq!(summary.budget.lines[0].remaining, dec("350"));
        assert_eq!(summary.by_tag.len(), 1);
        assert_eq!(summary.by_tag["fixed"], SplitTotal { actual: dec("0"), projected: dec("50") });
    }
}
