use std::collections::HashMap;

use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use rollforward::error::Result;
use rollforward::fmt::{money, parse_amount};
use rollforward::models::RecurringRule;
use rollforward::rules;

use super::{connect, ScheduleArgs};

pub fn add(
    owner_id: i64,
    category: &str,
    amount: &str,
    description: &str,
    schedule: &ScheduleArgs,
    tags: Vec<String>,
) -> Result<()> {
    let conn = connect()?;
    let category_id = rules::find_category(&conn, owner_id, category)?;
    let rule = RecurringRule {
        id: None,
        owner_id,
        category_id,
        amount: parse_amount(amount)?,
        description: description.to_string(),
        frequency: schedule.frequency()?,
        is_active: true,
        tags: tags.into_iter().collect(),
    };
    let id = rules::add_rule(&conn, &rule)?;
    println!(
        "Added rule {id}: '{description}' {} {} \u{2192} {category}",
        money(rule.amount),
        rule.frequency
    );
    Ok(())
}

pub(crate) fn category_names(conn: &Connection, owner_id: i64) -> Result<HashMap<i64, String>> {
    Ok(rules::list_categories(conn, owner_id)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}

pub fn list(owner_id: i64, include_inactive: bool) -> Result<()> {
    let conn = connect()?;
    let names = category_names(&conn, owner_id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Description", "Amount", "Schedule", "Category", "Tags", "Active"]);
    for rule in rules::list_rules(&conn, owner_id, include_inactive)? {
        let active = if rule.is_active { "yes".green() } else { "no".dimmed() };
        table.add_row(vec![
            Cell::new(rule.id.unwrap_or_default()),
            Cell::new(&rule.description),
            Cell::new(money(rule.amount)),
            Cell::new(rule.frequency.to_string()),
            Cell::new(names.get(&rule.category_id).map(String::as_str).unwrap_or("?")),
            Cell::new(rule.tags.iter().cloned().collect::<Vec<_>>().join(", ")),
            Cell::new(active),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn set_active(owner_id: i64, id: i64, active: bool) -> Result<()> {
    let conn = connect()?;
    let rule = rules::get_rule(&conn, owner_id, id)?;
    rules::set_rule_active(&conn, owner_id, id, active)?;
    let verb = if active { "Activated" } else { "Deactivated" };
    println!("{verb} rule {id}: '{}'", rule.description);
    if !active {
        println!("Run `rollforward sync` to remove its upcoming events.");
    }
    Ok(())
}
