use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use rollforward::aggregate::summarize;
use rollforward::error::Result;
use rollforward::fmt::money;
use rollforward::settings::Settings;

use super::{connect, control, WindowArgs};

fn signed(val: Decimal) -> String {
    if val.is_sign_negative() && !val.is_zero() {
        money(val).red().to_string()
    } else {
        money(val).green().to_string()
    }
}

pub fn run(owner_id: i64, window: &WindowArgs, as_of: Option<&str>, settings: &Settings) -> Result<()> {
    let conn = connect()?;
    let ctl = control(as_of)?;
    let window = window.resolve(ctl.as_of)?;
    let summary = summarize(&conn, owner_id, window, &ctl, settings.short_month_policy)?;

    let mut budget = Table::new();
    budget.set_header(vec!["Category", "Budget", "Actual", "Projected", "Remaining"]);
    for line in &summary.budget.lines {
        budget.add_row(vec![
            Cell::new(&line.name),
            Cell::new(money(line.budget)),
            Cell::new(money(line.spent.actual)),
            Cell::new(money(line.spent.projected)),
            Cell::new(signed(line.remaining)),
        ]);
    }
    budget.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(summary.budget.total_budget)),
        Cell::new(money(summary.budget.total_spent.actual)),
        Cell::new(money(summary.budget.total_spent.projected)),
        Cell::new(signed(summary.budget.total_budget - summary.budget.total_spent.combined())),
    ]);
    println!("Spend vs Budget {window}\n{budget}");

    if !summary.by_tag.is_empty() {
        let mut tags = Table::new();
        tags.set_header(vec!["Tag", "Actual", "Projected", "Total"]);
        for (tag, total) in &summary.by_tag {
            tags.add_row(vec![
                Cell::new(tag),
                Cell::new(money(total.actual)),
                Cell::new(money(total.projected)),
                Cell::new(money(total.combined())),
            ]);
        }
        println!("By Tag\n{tags}");
    }

    let mut income = Table::new();
    income.set_header(vec!["Income", "Paychecks", "Gross", "Deductions", "Net"]);
    for line in &summary.income.lines {
        income.add_row(vec![
            Cell::new(&line.description),
            Cell::new(line.paychecks),
            Cell::new(money(line.gross)),
            Cell::new(money(line.deductions)),
            Cell::new(money(line.net)),
        ]);
    }
    println!("Income\n{income}");

    let mut cashflow = Table::new();
    cashflow.set_header(vec!["Net Income", "Spent", "Still Projected", "Remaining"]);
    cashflow.add_row(vec![
        Cell::new(money(summary.cashflow.income_net)),
        Cell::new(money(summary.cashflow.spent.actual)),
        Cell::new(money(summary.cashflow.spent.projected)),
        Cell::new(signed(summary.cashflow.remaining)),
    ]);
    println!("Cash Flow (as of {})\n{cashflow}", ctl.as_of);
    Ok(())
}
