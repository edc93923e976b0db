//! Command handlers.
//!
//! Each handler opens what it needs from an [`App`], performs one command
//! and prints its result to stdout. Errors are returned to `main`, which
//! prints them and sets the exit code.

pub mod menu;
pub mod records;
pub mod schema;
pub mod users;

use crate::cli::RecordKind;
use crate::config::TavernConfig;
use anyhow::{anyhow, Context, Result};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tavern_characters::{Actor, CharacterService, Database, RecordRole, UserDirectory};

/// Open database and services for one command
pub struct App {
    pub config: TavernConfig,
    pub service: CharacterService,
    pub users: UserDirectory,
}

impl App {
    pub fn open(config: TavernConfig) -> Result<Self> {
        let db = Database::open(&config.database).with_context(|| {
            format!("cannot open database {}", config.database.display())
        })?;
        let db = Arc::new(db);
        let users = UserDirectory::new(db.clone());
        let service = CharacterService::new(db, Arc::new(users.clone()));
        Ok(Self {
            config,
            service,
            users,
        })
    }

    /// The configured acting user
    pub fn actor(&self) -> Result<Actor> {
        let user_id = self.config.user.ok_or_else(|| {
            anyhow!("no acting user; pass --user <USER_ID> or set `user` in tavern.toml")
        })?;
        Ok(self.service.actor(user_id)?)
    }

    pub fn page_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.config.page_size).unwrap_or(NonZeroUsize::MIN)
    }
}

impl From<RecordKind> for RecordRole {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Character => RecordRole::Character,
            RecordKind::Npc => RecordRole::Npc,
        }
    }
}
