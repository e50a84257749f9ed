mod cli;

use clap::Parser;

use cli::{CategoriesCommands, Cli, Commands, EventsCommands, IncomeCommands, RulesCommands};
use rollforward::settings::load_settings;

fn main() {
    let cli = Cli::parse();
    let settings = load_settings();
    rollforward::init_tracing(&settings.log_filter);
    let owner = cli.owner.unwrap_or(settings.owner_id);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Categories { command } => match command {
            CategoriesCommands::Add { name, budget } => cli::categories::add(owner, &name, &budget),
            CategoriesCommands::List => cli::categories::list(owner),
        },
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                category,
                amount,
                description,
                schedule,
                tags,
            } => cli::rules::add(owner, &category, &amount, &description, &schedule, tags),
            RulesCommands::List { all } => cli::rules::list(owner, all),
            RulesCommands::Deactivate { id } => cli::rules::set_active(owner, id, false),
            RulesCommands::Activate { id } => cli::rules::set_active(owner, id, true),
        },
        Commands::Income { command } => match command {
            IncomeCommands::Add {
                description,
                gross,
                deductions,
                schedule,
            } => cli::income::add(owner, &description, &gross, &deductions, &schedule),
            IncomeCommands::List => cli::income::list(owner),
        },
        Commands::Events { command } => match command {
            EventsCommands::Add {
                category,
                amount,
                total,
                date,
                description,
                tags,
            } => cli::events::add(owner, &category, &amount, total.as_deref(), &date, &description, tags),
            EventsCommands::List {
                window,
                state,
                category,
                tag,
            } => cli::events::list(owner, &window, state.as_deref(), category.as_deref(), tag),
        },
        Commands::Sync { window, as_of } => cli::sync::run(owner, &window, as_of.as_deref(), &settings),
        Commands::Sweep { as_of } => cli::sweep::run(owner, as_of.as_deref()),
        Commands::Report { window, as_of } => cli::report::run(owner, &window, as_of.as_deref(), &settings),
        Commands::Run => cli::run::run(&settings),
        Commands::Status => cli::status::run(owner),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
