use rollforward::db::DB_FILE;
use rollforward::error::Result;
use rollforward::events::{count_events, query_events, EventFilter};
use rollforward::models::{DateWindow, EventState};
use rollforward::rules;
use rollforward::settings::load_settings;

use super::{connect, today};

pub fn run(owner_id: i64) -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Owner:      {owner_id}");
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!("Short months: {:?}", settings.short_month_policy);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `rollforward init` to set up.");
        return Ok(());
    }

    let conn = connect()?;
    let month = DateWindow::containing(today());
    let this_month = count_events(&conn, owner_id, month)?;
    let projected = query_events(
        &conn,
        owner_id,
        month,
        &EventFilter {
            state: Some(EventState::Projected),
            ..Default::default()
        },
    )?
    .len();

    println!();
    println!("Categories:    {}", rules::list_categories(&conn, owner_id)?.len());
    println!("Active rules:  {}", rules::list_active_rules(&conn, owner_id)?.len());
    println!("Income rules:  {}", rules::list_income_rules(&conn, owner_id, false)?.len());
    println!("Events {month}: {this_month} ({projected} projected)");
    Ok(())
}
