use comfy_table::{Cell, Table};

use rollforward::error::Result;
use rollforward::fmt::{money, parse_amount};
use rollforward::rules;

use super::connect;

pub fn add(owner_id: i64, name: &str, budget: &str) -> Result<()> {
    let conn = connect()?;
    let budget = parse_amount(budget)?;
    rules::add_category(&conn, owner_id, name, budget)?;
    println!("Added category: {name} ({} / month)", money(budget));
    Ok(())
}

pub fn list(owner_id: i64) -> Result<()> {
    let conn = connect()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Monthly Budget"]);
    for category in rules::list_categories(&conn, owner_id)? {
        table.add_row(vec![
            Cell::new(category.id),
            Cell::new(category.name),
            Cell::new(money(category.monthly_budget)),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}
