use colored::{ColoredString, Colorize};
use comfy_table::{Cell, Table};

use rollforward::aggregate::partition_by_state;
use rollforward::error::{Error, Result};
use rollforward::events::{self, EventFilter};
use rollforward::fmt::{money, parse_amount, parse_date};
use rollforward::models::{EventState, MaterializedEvent};
use rollforward::rules;

use super::rules::category_names;
use super::{connect, today, WindowArgs};

pub(crate) fn styled_state(state: EventState) -> ColoredString {
    match state {
        EventState::Actual => state.as_str().green(),
        EventState::Projected => state.as_str().yellow(),
    }
}

pub fn add(
    owner_id: i64,
    category: &str,
    amount: &str,
    total: Option<&str>,
    date: &str,
    description: &str,
    tags: Vec<String>,
) -> Result<()> {
    let conn = connect()?;
    let category_id = rules::find_category(&conn, owner_id, category)?;
    let date = parse_date(date)?;
    let amount = parse_amount(amount)?;
    let total_amount = match total {
        Some(raw) => parse_amount(raw)?,
        None => amount,
    };

    if events::exists(&conn, owner_id, category_id, date, description)? {
        return Err(Error::Other(format!(
            "'{description}' on {date} in {category} is already recorded"
        )));
    }

    let event = MaterializedEvent {
        id: None,
        owner_id,
        category_id,
        date,
        amount,
        total_amount,
        description: description.to_string(),
        state: EventState::classify(date, today()),
        rule_id: None,
        tags: tags.into_iter().collect(),
    };
    let id = events::insert_event(&conn, &event)?;
    println!(
        "Added event {id}: '{description}' {} on {date} ({})",
        money(total_amount),
        styled_state(event.state)
    );
    Ok(())
}

pub fn list(
    owner_id: i64,
    window: &WindowArgs,
    state: Option<&str>,
    category: Option<&str>,
    tag: Option<String>,
) -> Result<()> {
    let conn = connect()?;
    let window = window.resolve(today())?;
    let state = state
        .map(|raw| {
            EventState::parse(raw).ok_or_else(|| Error::Other(format!("unknown state '{raw}' (projected, actual)")))
        })
        .transpose()?;
    let category_id = category
        .map(|name| rules::find_category(&conn, owner_id, name))
        .transpose()?;
    let filter = EventFilter {
        state,
        category_id,
        tag,
        ..Default::default()
    };

    let names = category_names(&conn, owner_id)?;
    let rows = events::query_events(&conn, owner_id, window, &filter)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Category", "Amount", "State", "Source", "Tags"]);
    for event in &rows {
        let source = match event.rule_id {
            Some(rule_id) => format!("rule {rule_id}"),
            None => "manual".to_string(),
        };
        table.add_row(vec![
            Cell::new(event.id.unwrap_or_default()),
            Cell::new(event.date),
            Cell::new(&event.description),
            Cell::new(names.get(&event.category_id).map(String::as_str).unwrap_or("?")),
            Cell::new(money(event.total_amount)),
            Cell::new(styled_state(event.state)),
            Cell::new(source),
            Cell::new(event.tags.iter().cloned().collect::<Vec<_>>().join(", ")),
        ]);
    }
    println!("Events {window}\n{table}");
    let total = rows.len();
    let split = partition_by_state(rows);
    println!(
        "{total} event(s): {} actual, {} projected",
        split.actual.len(),
        split.projected.len()
    );
    Ok(())
}
