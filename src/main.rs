mod budget;
mod categorizer;
mod cli;
mod error;
mod fmt;
mod importer;
mod logging;
mod mapper;
mod models;
mod reports;
mod session;
mod settings;

use clap::Parser;

use cli::{BudgetCommands, Cli, Commands, DateFormatCommands, OverrideCommands, RulesCommands, SettingsCommands};

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let config = cli.config.as_deref();

    let result = match cli.command {
        None | Some(Commands::Status) => cli::status::run(config),
        Some(Commands::Init { force }) => cli::init::run(config, force),
        Some(Commands::Import {
            file,
            input,
            month,
            json,
            save_mapping,
        }) => cli::import::run(config, &file, &input, month, json, save_mapping),
        Some(Commands::Budget { command }) => match command {
            BudgetCommands::Show {
                file,
                input,
                month,
                all,
                json,
            } => cli::budget::show(config, &file, &input, month, all, json),
            BudgetCommands::Set { category, limit } => cli::budget::set(config, &category, limit),
            BudgetCommands::Remove { category } => cli::budget::remove(config, &category),
            BudgetCommands::List => cli::budget::list(config),
        },
        Some(Commands::Rules { command }) => match command {
            RulesCommands::Add {
                pattern,
                category,
                match_type,
                position,
            } => cli::rules::add(config, &pattern, &category, match_type.into(), position),
            RulesCommands::Keywords { category, keywords } => cli::rules::keywords(config, &category, &keywords),
            RulesCommands::List => cli::rules::list(config),
            RulesCommands::Remove { position } => cli::rules::remove(config, position),
            RulesCommands::Move { from, to } => cli::rules::move_rule(config, from, to),
        },
        Some(Commands::Override { command }) => match command {
            OverrideCommands::Set { id, category } => cli::overrides::set(config, &id, &category),
            OverrideCommands::Reset { id } => cli::overrides::reset(config, &id),
            OverrideCommands::List => cli::overrides::list(config),
        },
        Some(Commands::Settings { command }) => match command {
            SettingsCommands::Show => cli::settings::show(config),
            SettingsCommands::Sign { convention } => cli::settings::sign(config, convention.into()),
            SettingsCommands::Credits { policy } => cli::settings::credits(config, policy.into()),
            SettingsCommands::DateFormat { command } => match command {
                DateFormatCommands::Add { format, first } => cli::settings::add_date_format(config, &format, first),
                DateFormatCommands::Clear => cli::settings::clear_date_formats(config),
            },
            SettingsCommands::Parse { input } => cli::settings::parse(config, &input),
            SettingsCommands::ClearMapping => cli::settings::clear_mapping(config),
        },
        Some(Commands::Report {
            file,
            input,
            month,
            top,
            json,
        }) => cli::report::run(config, &file, &input, month, top, json),
        Some(Commands::Demo) => cli::demo::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
