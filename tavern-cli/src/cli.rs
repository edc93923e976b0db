//! CLI definition for the Tavern command-line interface.
//!
//! This module only depends on `clap` and `std`; the command handlers map
//! its plain argument types onto the character store's types.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Tavern - terminal companion for tabletop RPG campaigns.
///
/// Keeps Characters and NPCs in a local SQLite database whose fields the GM
/// can customise while a campaign is running.
#[derive(Parser, Debug)]
#[command(name = "tavern")]
#[command(version)]
#[command(about = "Terminal companion for tabletop RPG campaigns")]
#[command(
    long_about = "Tavern keeps Characters and NPCs in a local SQLite database whose fields \
    the GM can add and remove while a campaign is running.\n\n\
    Configuration is read from ~/.config/tavern/config.toml and ./tavern.toml.\n\n\
    Environment variables:\n  \
    TAVERN_DATABASE   Path of the database file\n  \
    TAVERN_PAGE_SIZE  Records per page in listings\n  \
    TAVERN_USER       Id of the acting user"
)]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Database file (default: characters_npcs.db)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Act as this user id
    #[arg(short, long, global = true, value_name = "USER_ID")]
    pub user: Option<i64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Kind of record, as typed on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Character,
    Npc,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database tables, optionally registering a GM
    Init {
        /// Register a GM with this username
        #[arg(long, value_name = "USERNAME")]
        gm: Option<String>,
    },

    /// Manage users and their roles
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// List the Characters and NPCs visible to the acting user
    List {
        /// Only records of this kind
        #[arg(long, value_enum)]
        role: Option<RecordKind>,
        /// Only records created by this user id
        #[arg(long, value_name = "USER_ID")]
        owner: Option<i64>,
        /// Only records whose name contains this text
        #[arg(long)]
        name: Option<String>,
        /// Page to show, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the character sheet of a record
    Show {
        /// Record id
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a record from field assignments
    Create {
        /// Kind of record
        #[arg(long, value_enum)]
        role: RecordKind,
        /// Field assignment, e.g. --set name=Arin --set level=3
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    /// Change fields of a record
    Edit {
        /// Record id
        id: i64,
        /// Field assignment, e.g. --set level=4
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        set: Vec<String>,
    },

    /// Delete a record
    Delete {
        /// Record id
        id: i64,
    },

    /// Inspect and customise the record fields
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },

    /// Interactive Character/NPC management menu
    Menu,
}

#[derive(Subcommand, Debug)]
pub enum UsersAction {
    /// Register a user
    Add {
        /// Username
        name: String,
        /// Register as GM instead of player
        #[arg(long)]
        gm: bool,
    },

    /// List registered users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SchemaAction {
    /// List the fields in table order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a field (GM only)
    Add {
        /// Field name: letters, digits and underscores
        name: String,
        /// Field type: INTEGER, REAL, TEXT or BOOLEAN
        #[arg(value_name = "TYPE")]
        field_type: String,
        /// Reject empty values; requires --default
        #[arg(long)]
        required: bool,
        /// Value existing records read for the new field
        #[arg(long)]
        default: Option<String>,
    },

    /// Remove a field and its values from every record (GM only)
    Remove {
        /// Field name
        name: String,
    },

    /// Report whether an interrupted field removal left the store flagged
    Status,

    /// Acknowledge a manually repaired store after an interrupted removal (GM only)
    ClearFlag,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_with_assignments() {
        let cli = Cli::try_parse_from([
            "tavern", "-u", "2", "create", "--role", "npc", "--set", "name=Gob", "--set",
            "level=2",
        ])
        .unwrap();
        assert_eq!(cli.user, Some(2));
        match cli.command {
            Commands::Create { role, set } => {
                assert_eq!(role, RecordKind::Npc);
                assert_eq!(set, vec!["name=Gob", "level=2"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_edit_requires_assignment() {
        assert!(Cli::try_parse_from(["tavern", "edit", "3"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tavern", "list", "--database", "x.db", "--debug"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.database, Some(PathBuf::from("x.db")));
    }
}
