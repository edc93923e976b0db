//! Tavern CLI library: command definitions, configuration and handlers.

pub mod cli;
pub mod commands;
pub mod config;
pub mod prompt;
pub mod table;

pub use cli::{Cli, Commands, RecordKind, SchemaAction, UsersAction};
pub use config::{CliOverrides, TavernConfig};
