//! Character and NPC records with a runtime-editable schema
//!
//! `tavern-characters` stores tabletop-RPG Characters and NPCs in a single
//! SQLite table whose columns a GM can add and remove while a campaign is
//! running. Values are parsed per column type, reads and writes are gated
//! by role and ownership, and records render as sectioned character sheets.
//!
//! # Architecture
//!
//! - **Live schema**: [`SchemaRegistry`] introspects the table on every call;
//!   column removal rebuilds the table inside one transaction
//! - **Allow-listed SQL**: column names are checked against the live schema
//!   before they reach statement text, values are always bound
//! - **Tagged values**: a record is a `name -> FieldValue` map, not a struct
//! - **Policy at the seam**: [`CharacterService`] consults [`AccessPolicy`]
//!   before the [`EntityStore`] is touched

pub mod codec;
pub mod db;
pub mod defaults;
pub mod error;
pub mod policy;
pub mod schema;
pub mod search;
pub mod service;
pub mod sheet;
pub mod skills;
pub mod store;
pub mod types;
pub mod users;

pub use codec::{FieldCodec, Prompter, QueuedPrompter};
pub use db::{Database, DEFAULT_DB_FILENAME};
pub use error::{CharacterError, Result};
pub use policy::{AccessPolicy, Action, Actor, ActorRole, Decision, RoleLookup, StaticRoles};
pub use schema::{validate_name, SchemaRegistry};
pub use search::{PaginatedSearch, SearchSession};
pub use service::CharacterService;
pub use sheet::{Section, Sheet, SheetRenderer};
pub use skills::{SkillSet, SKILL_CATALOG};
pub use store::{EntityStore, ListFilter};
pub use types::{Column, ColumnType, FieldValue, Ownership, Record, RecordRole};
pub use users::{User, UserDirectory};
