use comfy_table::{Cell, Table};

use rollforward::error::Result;
use rollforward::fmt::{money, parse_amount};
use rollforward::models::IncomeRule;
use rollforward::rules;

use super::{connect, ScheduleArgs};

pub fn add(owner_id: i64, description: &str, gross: &str, deductions: &str, schedule: &ScheduleArgs) -> Result<()> {
    let conn = connect()?;
    let rule = IncomeRule {
        id: None,
        owner_id,
        description: description.to_string(),
        gross_amount: parse_amount(gross)?,
        frequency: schedule.frequency()?,
        monthly_deductions: parse_amount(deductions)?,
        is_active: true,
    };
    let id = rules::add_income_rule(&conn, &rule)?;
    println!("Added income {id}: '{description}' {} {}", money(rule.gross_amount), rule.frequency);
    Ok(())
}

pub fn list(owner_id: i64) -> Result<()> {
    let conn = connect()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Description", "Gross", "Schedule", "Deductions / Month"]);
    for rule in rules::list_income_rules(&conn, owner_id, true)? {
        table.add_row(vec![
            Cell::new(rule.id.unwrap_or_default()),
            Cell::new(rule.description),
            Cell::new(money(rule.gross_amount)),
            Cell::new(rule.frequency.to_string()),
            Cell::new(money(rule.monthly_deductions)),
        ]);
    }
    println!("Income\n{table}");
    Ok(())
}
