//! Tavern CLI - terminal companion for tabletop RPG campaigns.
//!
//! Commands:
//! - `tavern init [--gm <name>]`: Create the database, optionally registering a GM
//! - `tavern users add <name> [--gm]`: Register a user
//! - `tavern users list`: List users and roles
//! - `tavern list`: Page through visible Characters and NPCs
//! - `tavern show <id>`: Show a character sheet
//! - `tavern create --role <kind> --set field=value`: Create a record
//! - `tavern edit <id> --set field=value`: Change fields of a record
//! - `tavern delete <id>`: Delete a record
//! - `tavern schema list|add|remove|status|clear-flag`: Inspect and customise fields
//! - `tavern menu`: Interactive Character/NPC management
//!
//! Environment variables:
//! - TAVERN_DATABASE: Database file
//! - TAVERN_PAGE_SIZE: Records per page
//! - TAVERN_USER: Acting user id
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tavern::commands::{menu, records, schema, users, App};
use tavern::{Cli, CliOverrides, Commands, SchemaAction, TavernConfig, UsersAction};

fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = CliOverrides {
        database: cli.database,
        user: cli.user,
    };
    let config = TavernConfig::load(&overrides)?;
    let app = App::open(config)?;

    match cli.command {
        Commands::Init { gm } => users::run_init(&app, gm.as_deref()),

        Commands::Users { action } => match action {
            UsersAction::Add { name, gm } => users::run_add(&app, &name, gm),
            UsersAction::List { json } => users::run_list(&app, json),
        },

        Commands::List {
            role,
            owner,
            name,
            page,
            json,
        } => records::run_list(&app, role, owner, name, page, json),

        Commands::Show { id, json } => records::run_show(&app, id, json),

        Commands::Create { role, set } => records::run_create(&app, role, &set),

        Commands::Edit { id, set } => records::run_edit(&app, id, &set),

        Commands::Delete { id } => records::run_delete(&app, id),

        Commands::Schema { action } => match action {
            SchemaAction::List { json } => schema::run_list(&app, json),
            SchemaAction::Add {
                name,
                field_type,
                required,
                default,
            } => schema::run_add(&app, &name, &field_type, required, default.as_deref()),
            SchemaAction::Remove { name } => schema::run_remove(&app, &name),
            SchemaAction::Status => schema::run_status(&app),
            SchemaAction::ClearFlag => schema::run_clear_flag(&app),
        },

        Commands::Menu => menu::run_menu(&app),
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level
    let filter = if cli.debug {
        EnvFilter::new("tavern=debug,tavern_characters=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(exit_code);
}
