//! SQLite-backed storage for characters, users, and store metadata.
//!
//! # Schema
//!
//! - `characters`: the dynamic entity table; its columns are owned by
//!   [`SchemaRegistry`](crate::schema::SchemaRegistry)
//! - `users`: user id, name, and role, consulted for access checks
//! - `tavern_meta`: key/value flags, currently only the rebuild marker
//!   written around a column removal

use crate::defaults::seed_columns;
use crate::error::Result;
use crate::schema::{create_table_sql, quote_ident, read_columns};
use crate::types::OWNER_COLUMN;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Default database filename
pub const DEFAULT_DB_FILENAME: &str = "characters_npcs.db";

/// The dynamic entity table
pub const CHARACTERS_TABLE: &str = "characters";

/// Rebuild target used while removing a column
pub const SHADOW_TABLE: &str = "characters_shadow";

/// Meta key present while a column removal is in flight
const REBUILD_FLAG_KEY: &str = "rebuild_in_progress";

/// SQLite database for the character store
///
/// The connection sits behind a Mutex so the handle can be shared through
/// an `Arc` by the registry, the store, and the user directory.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Lock the connection; a poisoned lock is recovered since every
    /// multi-statement change runs inside its own transaction
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open (creating if needed) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening character database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_schema()?;
        db.upgrade_legacy_table()?;
        db.report_interrupted_rebuild()?;
        Ok(db)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL CHECK(role IN ('user', 'gm'))
            );

            CREATE TABLE IF NOT EXISTS tavern_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        conn.execute_batch(&create_table_sql(CHARACTERS_TABLE, &seed_columns(), true))?;
        Ok(())
    }

    /// Tables created before ownership tracking have no owner column
    fn upgrade_legacy_table(&self) -> Result<()> {
        let conn = self.conn();
        let columns = read_columns(&conn)?;
        if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(OWNER_COLUMN)) {
            info!("adding {OWNER_COLUMN} to legacy {CHARACTERS_TABLE} table");
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} INTEGER",
                CHARACTERS_TABLE,
                quote_ident(OWNER_COLUMN)
            ))?;
        }
        Ok(())
    }

    fn report_interrupted_rebuild(&self) -> Result<()> {
        if let Some(column) = self.rebuild_flag()? {
            warn!(
                "removal of field '{column}' was interrupted; schema changes are disabled until the flag is cleared"
            );
        } else if self.table_exists(SHADOW_TABLE)? {
            warn!("found leftover table {SHADOW_TABLE}; it is not used and can be dropped");
        }
        Ok(())
    }

    /// Whether a table with this exact name exists
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Column whose removal was interrupted, if any
    pub fn rebuild_flag(&self) -> Result<Option<String>> {
        read_rebuild_flag(&self.conn())
    }

    /// Acknowledge a manually repaired store. Returns whether a flag was set.
    pub fn clear_rebuild_flag(&self) -> Result<bool> {
        let cleared = clear_rebuild_flag(&self.conn())?;
        if cleared {
            info!("rebuild flag cleared");
        }
        Ok(cleared)
    }
}

pub(crate) fn read_rebuild_flag(conn: &Connection) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM tavern_meta WHERE key = ?1",
            [REBUILD_FLAG_KEY],
            |row| row.get(0),
        )
        .optional()?)
}

pub(crate) fn set_rebuild_flag(conn: &Connection, column: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO tavern_meta (key, value) VALUES (?1, ?2)",
        params![REBUILD_FLAG_KEY, column],
    )?;
    Ok(())
}

pub(crate) fn clear_rebuild_flag(conn: &Connection) -> Result<bool> {
    let removed = conn.execute("DELETE FROM tavern_meta WHERE key = ?1", [REBUILD_FLAG_KEY])?;
    Ok(removed > 0)
}
