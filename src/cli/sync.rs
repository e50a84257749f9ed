use colored::Colorize;

use rollforward::error::Result;
use rollforward::materializer::Materializer;
use rollforward::settings::Settings;

use super::{connect, control, WindowArgs};

pub fn run(owner_id: i64, window: &WindowArgs, as_of: Option<&str>, settings: &Settings) -> Result<()> {
    let mut conn = connect()?;
    let ctl = control(as_of)?;
    let window = window.resolve(ctl.as_of)?;
    let report = Materializer::new(settings.short_month_policy).sync(&mut conn, owner_id, window, &ctl)?;

    println!("Synced {} (as of {})", window.to_string().bold(), ctl.as_of);
    println!("Rules:       {}", report.rules);
    println!("Occurrences: {}", report.occurrences);
    println!("Inserted:    {}", report.inserted);
    println!("Unchanged:   {}", report.kept);
    println!("Updated:     {}", report.updated);
    println!("Deleted:     {}", report.deleted);
    if report.retained > 0 {
        println!("Retained:    {} (settled events of inactive rules)", report.retained);
    }
    if report.skipped_duplicates > 0 {
        println!("Duplicates:  {}", report.skipped_duplicates.to_string().yellow());
    }
    if report.failed > 0 {
        println!("Failed:      {}", report.failed.to_string().red());
    }
    Ok(())
}
