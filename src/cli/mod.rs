pub mod categories;
pub mod events;
pub mod income;
pub mod init;
pub mod report;
pub mod rules;
pub mod run;
pub mod status;
pub mod sweep;
pub mod sync;

use chrono::{Local, NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use rollforward::control::RunControl;
use rollforward::db;
use rollforward::error::{Error, Result};
use rollforward::fmt::parse_date;
use rollforward::models::{DateWindow, Frequency};
use rollforward::settings::get_data_dir;

#[derive(Parser)]
#[command(name = "rollforward", about = "Project recurring bills and income into a dated ledger.")]
pub struct Cli {
    /// Owner whose data to operate on (default: owner_id from settings)
    #[arg(long, global = true)]
    pub owner: Option<i64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for rollforward data (default: ~/.local/share/rollforward)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage spending categories and their monthly budgets.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage recurring bill rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage recurring income.
    Income {
        #[command(subcommand)]
        command: IncomeCommands,
    },
    /// Enter or list events.
    Events {
        #[command(subcommand)]
        command: EventsCommands,
    },
    /// Materialize every active rule into a window.
    Sync {
        #[command(flatten)]
        window: WindowArgs,
        /// Classify against this date instead of today (YYYY-MM-DD)
        #[arg(long = "as-of")]
        as_of: Option<String>,
    },
    /// Settle projected events dated before today.
    Sweep {
        /// Settle against this date instead of today (YYYY-MM-DD)
        #[arg(long = "as-of")]
        as_of: Option<String>,
    },
    /// Spend vs budget, income and cash flow for a window.
    Report {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long = "as-of")]
        as_of: Option<String>,
    },
    /// Run the background scheduler until Ctrl-C.
    Run,
    /// Show the data directory and summary counts.
    Status,
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Add a category.
    Add {
        name: String,
        /// Monthly budget
        #[arg(long, default_value = "0")]
        budget: String,
    },
    /// List categories.
    List,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a recurring bill.
    Add {
        /// Category name
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        description: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
        /// Tag copied onto every generated event (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List rules.
    List {
        /// Include inactive rules
        #[arg(long)]
        all: bool,
    },
    /// Stop generating events for a rule.
    Deactivate { id: i64 },
    /// Resume generating events for a rule.
    Activate { id: i64 },
}

#[derive(Subcommand)]
pub enum IncomeCommands {
    /// Add a recurring paycheck.
    Add {
        #[arg(long)]
        description: String,
        /// Gross amount per paycheck
        #[arg(long)]
        gross: String,
        /// Deductions taken per month
        #[arg(long, default_value = "0")]
        deductions: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// List income rules.
    List,
}

#[derive(Subcommand)]
pub enum EventsCommands {
    /// Record a one-off event.
    Add {
        /// Category name
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: String,
        /// Total charged if different from amount
        #[arg(long)]
        total: Option<String>,
        /// Date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(long)]
        description: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List events in a window.
    List {
        #[command(flatten)]
        window: WindowArgs,
        /// projected or actual
        #[arg(long)]
        state: Option<String>,
        /// Category name
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
}

/// Exactly one recurrence anchor.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ScheduleArgs {
    /// Day of month (1-31)
    #[arg(long)]
    pub monthly: Option<u32>,
    /// Day of week, e.g. mon, friday
    #[arg(long)]
    pub weekly: Option<String>,
    /// Month and day: M-D, e.g. 3-1
    #[arg(long)]
    pub yearly: Option<String>,
}

impl ScheduleArgs {
    pub fn frequency(&self) -> Result<Frequency> {
        let parsed = match (&self.monthly, &self.weekly, &self.yearly) {
            (Some(day), _, _) => Frequency::monthly(*day),
            (_, Some(day), _) => day
                .parse::<Weekday>()
                .map(Frequency::weekly)
                .map_err(|_| format!("'{day}' is not a day of the week")),
            (_, _, Some(raw)) => Frequency::parse_yearly(raw),
            _ => Err("one of --monthly, --weekly or --yearly is required".to_string()),
        };
        parsed.map_err(Error::Other)
    }
}

#[derive(Args, Debug, Default)]
pub struct WindowArgs {
    /// Month: YYYY-MM (default: current month)
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub month: Option<String>,
    /// First day: YYYY-MM-DD
    #[arg(long, requires = "to")]
    pub from: Option<String>,
    /// Last day: YYYY-MM-DD
    #[arg(long, requires = "from")]
    pub to: Option<String>,
}

impl WindowArgs {
    pub fn resolve(&self, today: NaiveDate) -> Result<DateWindow> {
        match (&self.month, &self.from, &self.to) {
            (Some(month), _, _) => DateWindow::parse_month(month),
            (None, Some(from), Some(to)) => DateWindow::new(parse_date(from)?, parse_date(to)?),
            _ => Ok(DateWindow::containing(today)),
        }
    }
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn control(as_of: Option<&str>) -> Result<RunControl> {
    match as_of {
        Some(raw) => Ok(RunControl::new(parse_date(raw)?)),
        None => Ok(RunControl::today()),
    }
}

pub(crate) fn connect() -> Result<Connection> {
    db::open(&get_data_dir())
}
