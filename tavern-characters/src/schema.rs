//! Live column registry for the `characters` table.
//!
//! The registry never caches: every call introspects the table with
//! `PRAGMA table_info`, so the column list it hands out is the allow-list
//! for whatever statement is about to be generated.
//!
//! Column removal uses rebuild-and-swap inside one transaction:
//!
//! 1. create `characters_shadow` with the remaining columns in order
//! 2. copy every row across
//! 3. drop `characters` and rename the shadow into its place
//!
//! A marker row in `tavern_meta` brackets the transaction. If the process
//! dies mid-rebuild the marker survives, and further schema changes are
//! refused until an operator clears it.

use crate::db::{
    clear_rebuild_flag, read_rebuild_flag, set_rebuild_flag, Database, CHARACTERS_TABLE,
    SHADOW_TABLE,
};
use crate::error::{CharacterError, Result};
use crate::types::{is_system_column, Column, ColumnType, FieldValue, ROLE_COLUMN};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension};
use std::sync::Arc;
use tracing::{debug, info, warn};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Quote an identifier for statement text.
///
/// Only call this on names taken from the live column list or a constant;
/// quoting is not a substitute for the allow-list check.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read the live columns of `characters` in table order
pub(crate) fn read_columns(conn: &Connection) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({CHARACTERS_TABLE})"))?;
    let rows = stmt.query_map([], |row| {
        let declared: String = row.get(2)?;
        let column_type = ColumnType::from_declared(&declared);
        let default: Option<String> = row.get(4)?;
        Ok(Column {
            name: row.get(1)?,
            column_type,
            nullable: row.get::<_, i64>(3)? == 0,
            default: default
                .map(|literal| FieldValue::from_sql_literal(&literal, column_type))
                .filter(|value| !value.is_null()),
            primary_key: row.get::<_, i64>(5)? > 0,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// DDL fragment for one column
pub(crate) fn column_definition(column: &Column) -> String {
    let name = quote_ident(&column.name);
    if column.primary_key {
        return format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT");
    }
    if column.name.eq_ignore_ascii_case(ROLE_COLUMN) {
        return format!("{name} TEXT NOT NULL CHECK({name} IN ('character', 'npc'))");
    }
    let mut definition = format!("{name} {}", column.column_type.sql_type());
    if !column.nullable {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        definition.push_str(" DEFAULT ");
        definition.push_str(&default.to_sql_literal());
    }
    definition
}

/// `CREATE TABLE` statement for `table` with `columns` in order
pub(crate) fn create_table_sql(table: &str, columns: &[Column], if_not_exists: bool) -> String {
    let definitions: Vec<String> = columns.iter().map(column_definition).collect();
    format!(
        "CREATE TABLE {}{} (\n    {}\n)",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        table,
        definitions.join(",\n    ")
    )
}

/// Check a proposed column name before it can reach statement text
pub fn validate_name(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(CharacterError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// A snapshot of the live columns used to vet identifiers.
///
/// Lookups are case-insensitive like SQLite's, and always hand back the
/// registry's own spelling for embedding.
pub(crate) struct AllowList<'a> {
    columns: &'a [Column],
}

impl<'a> AllowList<'a> {
    pub(crate) fn new(columns: &'a [Column]) -> Self {
        Self { columns }
    }

    pub(crate) fn find(&self, name: &str) -> Option<&'a Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn resolve(&self, name: &str) -> Result<&'a Column> {
        self.find(name)
            .ok_or_else(|| CharacterError::unknown_field(name))
    }

    /// Quoted identifier for a column that is known to exist
    pub(crate) fn quoted(&self, name: &str) -> Result<String> {
        self.resolve(name).map(|c| quote_ident(&c.name))
    }
}

/// Introspects and mutates the column set of the `characters` table
#[derive(Clone)]
pub struct SchemaRegistry {
    db: Arc<Database>,
}

impl SchemaRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All columns, system columns included, in table order
    pub fn list_columns(&self) -> Result<Vec<Column>> {
        read_columns(&self.db.conn())
    }

    /// Look up one column by name
    pub fn column(&self, name: &str) -> Result<Column> {
        let columns = self.list_columns()?;
        AllowList::new(&columns).resolve(name).cloned()
    }

    /// Columns a user fills in: everything except the system columns
    pub fn editable_columns(&self) -> Result<Vec<Column>> {
        Ok(self
            .list_columns()?
            .into_iter()
            .filter(|c| !c.is_system())
            .collect())
    }

    /// Append a column. Existing rows read `default` (or null) for it.
    pub fn add_column(
        &self,
        name: &str,
        column_type: ColumnType,
        nullable: bool,
        default: Option<FieldValue>,
    ) -> Result<Column> {
        validate_name(name)?;
        let default = match default {
            Some(value) if !value.is_null() => Some(conform_default(name, column_type, value)?),
            _ => None,
        };
        if !nullable && default.is_none() {
            return Err(CharacterError::conflict(format!(
                "field '{name}' is not nullable and needs a default value"
            )));
        }

        let mut conn = self.db.conn();
        refuse_if_flagged(&conn)?;
        let tx = conn.transaction()?;
        let columns = read_columns(&tx)?;
        if AllowList::new(&columns).find(name).is_some() {
            return Err(CharacterError::conflict(format!(
                "field '{name}' already exists"
            )));
        }

        let column = Column {
            name: name.to_string(),
            column_type,
            nullable,
            default,
            primary_key: false,
        };
        let sql = format!(
            "ALTER TABLE {CHARACTERS_TABLE} ADD COLUMN {}",
            column_definition(&column)
        );
        debug!("{sql}");
        tx.execute_batch(&sql)?;
        tx.commit()?;

        info!("added field '{name}' ({column_type})");
        Ok(column)
    }

    /// Remove a column, preserving every other value of every row
    pub fn remove_column(&self, name: &str) -> Result<()> {
        if is_system_column(name) {
            return Err(CharacterError::ProtectedField {
                name: name.to_string(),
            });
        }

        let mut conn = self.db.conn();
        refuse_if_flagged(&conn)?;
        let columns = read_columns(&conn)?;
        let target = AllowList::new(&columns).resolve(name)?.name.clone();
        let remaining: Vec<Column> = columns
            .into_iter()
            .filter(|c| c.name != target)
            .collect();

        set_rebuild_flag(&conn, &target)?;
        let outcome = rebuild_without(&mut conn, &remaining);
        clear_rebuild_flag(&conn)?;

        match outcome {
            Ok(()) => {
                info!("removed field '{target}'");
                Ok(())
            }
            Err(source) => {
                warn!("removing field '{target}' failed and was rolled back: {source}");
                Err(CharacterError::SchemaRebuild {
                    column: target,
                    source,
                })
            }
        }
    }
}

fn refuse_if_flagged(conn: &Connection) -> Result<()> {
    match read_rebuild_flag(conn)? {
        Some(column) => Err(CharacterError::RecoveryRequired { column }),
        None => Ok(()),
    }
}

fn conform_default(name: &str, column_type: ColumnType, value: FieldValue) -> Result<FieldValue> {
    match (column_type, value) {
        (ColumnType::Real, FieldValue::Integer(i)) => Ok(FieldValue::Real(i as f64)),
        (expected, value) if value.kind() == Some(expected) => Ok(value),
        (expected, value) => Err(CharacterError::validation(
            name,
            format!("default '{value}' is not a {expected} value"),
        )),
    }
}

/// Copy `characters` into a shadow table holding only `remaining`, then
/// swap it in. Runs as a single transaction; on error nothing is applied.
fn rebuild_without(conn: &mut Connection, remaining: &[Column]) -> rusqlite::Result<()> {
    let column_list = remaining
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    let issued = sequence_value(&tx, CHARACTERS_TABLE)?;
    tx.execute_batch(&create_table_sql(SHADOW_TABLE, remaining, false))?;
    let copied = tx.execute(
        &format!(
            "INSERT INTO {SHADOW_TABLE} ({column_list}) SELECT {column_list} FROM {CHARACTERS_TABLE}"
        ),
        [],
    )?;
    tx.execute_batch(&format!(
        "DROP TABLE {CHARACTERS_TABLE};
         ALTER TABLE {SHADOW_TABLE} RENAME TO {CHARACTERS_TABLE};"
    ))?;
    // Dropping the table drops its AUTOINCREMENT counter; ids of deleted
    // records must not be handed out again.
    let copied_max = sequence_value(&tx, CHARACTERS_TABLE)?;
    if let Some(seq) = issued.max(copied_max) {
        tx.execute(
            "DELETE FROM sqlite_sequence WHERE name = ?1",
            [CHARACTERS_TABLE],
        )?;
        tx.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            rusqlite::params![CHARACTERS_TABLE, seq],
        )?;
    }
    tx.commit()?;
    debug!("rebuilt {CHARACTERS_TABLE} with {copied} rows");
    Ok(())
}

/// Last id issued for an AUTOINCREMENT table, if any
fn sequence_value(conn: &Connection, table: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT seq FROM sqlite_sequence WHERE name = ?1",
        [table],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::setup_db;

    fn names(registry: &SchemaRegistry) -> Vec<String> {
        registry
            .list_columns()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    fn insert_row(db: &Database, name: &str) -> i64 {
        let conn = db.conn();
        conn.execute(
            "INSERT INTO characters (name, role, race, level, health) VALUES (?1, 'character', 'Elf', 3, 27)",
            [name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_list_columns_seeded() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        let columns = registry.list_columns().unwrap();
        assert_eq!(columns[0].name, "id");
        assert!(columns[0].primary_key);
        let level = columns.iter().find(|c| c.name == "level").unwrap();
        assert_eq!(level.column_type, ColumnType::Integer);
        assert_eq!(level.default, Some(FieldValue::Integer(1)));
    }

    #[test]
    fn test_add_column_appends_once() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        registry
            .add_column("nickname", ColumnType::Text, true, None)
            .unwrap();

        let after = names(&registry);
        assert_eq!(after.last().map(String::as_str), Some("nickname"));
        assert_eq!(after.iter().filter(|n| *n == "nickname").count(), 1);

        let err = registry
            .add_column("nickname", ColumnType::Integer, true, None)
            .unwrap_err();
        assert!(matches!(err, CharacterError::SchemaConflict { .. }));
        assert_eq!(names(&registry), after);
    }

    #[test]
    fn test_add_column_duplicate_is_case_insensitive() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        let err = registry
            .add_column("Name", ColumnType::Text, true, None)
            .unwrap_err();
        assert!(matches!(err, CharacterError::SchemaConflict { .. }));
    }

    #[test]
    fn test_add_column_invalid_names() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        let before = names(&registry);
        for bad in ["", "two words", "tab\tname", "x\"); DROP TABLE characters; --", "9lives"] {
            let err = registry
                .add_column(bad, ColumnType::Text, true, None)
                .unwrap_err();
            assert!(
                matches!(err, CharacterError::InvalidName { .. }),
                "{bad:?} gave {err:?}"
            );
        }
        assert_eq!(names(&registry), before);
    }

    #[test]
    fn test_add_column_default_applies_to_existing_rows() {
        let (_dir, db) = setup_db();
        let id = insert_row(&db, "Arin");
        let registry = SchemaRegistry::new(db.clone());
        registry
            .add_column("gold", ColumnType::Integer, false, Some(FieldValue::Integer(10)))
            .unwrap();

        let gold: i64 = db
            .conn()
            .query_row("SELECT gold FROM characters WHERE id = ?1", [id], |row| row.get(0))
            .unwrap();
        assert_eq!(gold, 10);
    }

    #[test]
    fn test_add_not_null_without_default_is_conflict() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        let err = registry
            .add_column("gold", ColumnType::Integer, false, None)
            .unwrap_err();
        assert!(matches!(err, CharacterError::SchemaConflict { .. }));
        assert!(!names(&registry).contains(&"gold".to_string()));
    }

    #[test]
    fn test_add_column_default_type_mismatch() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        let err = registry
            .add_column("gold", ColumnType::Integer, true, Some(FieldValue::text("lots")))
            .unwrap_err();
        assert!(matches!(err, CharacterError::Validation { .. }));
    }

    #[test]
    fn test_text_default_with_quote() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        registry
            .add_column("motto", ColumnType::Text, true, Some(FieldValue::text("it's fine")))
            .unwrap();
        let motto = registry.column("motto").unwrap();
        assert_eq!(motto.default, Some(FieldValue::text("it's fine")));
    }

    #[test]
    fn test_remove_protected_columns() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        let before = names(&registry);
        for protected in ["id", "role", "owner_user_id"] {
            let err = registry.remove_column(protected).unwrap_err();
            assert!(matches!(err, CharacterError::ProtectedField { .. }));
        }
        assert_eq!(names(&registry), before);
    }

    #[test]
    fn test_remove_unknown_column() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db);
        let err = registry.remove_column("nickname").unwrap_err();
        assert!(matches!(err, CharacterError::UnknownField { .. }));
    }

    #[test]
    fn test_remove_column_preserves_other_values() {
        let (_dir, db) = setup_db();
        let first = insert_row(&db, "Arin");
        let second = insert_row(&db, "Bree");
        let registry = SchemaRegistry::new(db.clone());

        let snapshot = |db: &Database| -> Vec<(i64, String, String, i64, i64)> {
            let conn = db.conn();
            let mut stmt = conn
                .prepare("SELECT id, name, race, level, health FROM characters ORDER BY id")
                .unwrap();
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)))
                .unwrap()
                .collect::<rusqlite::Result<Vec<_>>>()
                .unwrap();
            rows
        };
        let before = snapshot(&db);

        registry.remove_column("class").unwrap();

        assert!(!names(&registry).contains(&"class".to_string()));
        assert_eq!(snapshot(&db), before);
        assert_eq!(before.iter().map(|r| r.0).collect::<Vec<_>>(), vec![first, second]);
        assert!(!db.table_exists(SHADOW_TABLE).unwrap());
        assert_eq!(db.rebuild_flag().unwrap(), None);
    }

    #[test]
    fn test_remove_column_keeps_order_and_constraints() {
        let (_dir, db) = setup_db();
        let registry = SchemaRegistry::new(db.clone());
        let mut expected = names(&registry);
        expected.retain(|n| n != "race");

        registry.remove_column("race").unwrap();
        assert_eq!(names(&registry), expected);

        let level = registry.column("level").unwrap();
        assert_eq!(level.default, Some(FieldValue::Integer(1)));
        let name = registry.column("name").unwrap();
        assert!(!name.nullable);

        // role CHECK constraint survives the rebuild
        let bad = db.conn().execute(
            "INSERT INTO characters (name, role) VALUES ('x', 'dragon')",
            [],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_ids_keep_increasing_after_rebuild() {
        let (_dir, db) = setup_db();
        let first = insert_row(&db, "Arin");
        insert_row(&db, "Bree");
        let last = insert_row(&db, "Cade");
        db.conn()
            .execute("DELETE FROM characters WHERE id > ?1", [first])
            .unwrap();

        SchemaRegistry::new(db.clone()).remove_column("class").unwrap();
        let next = insert_row(&db, "Dara");
        assert!(next > last, "id {next} reused after rebuild (previous max {last})");
    }

    #[test]
    fn test_ids_keep_increasing_after_rebuild_of_empty_table() {
        let (_dir, db) = setup_db();
        let only = insert_row(&db, "Arin");
        db.conn().execute("DELETE FROM characters", []).unwrap();

        SchemaRegistry::new(db.clone()).remove_column("class").unwrap();
        assert!(insert_row(&db, "Bree") > only);
    }

    #[test]
    fn test_failed_rebuild_rolls_back() {
        let (_dir, db) = setup_db();
        insert_row(&db, "Arin");
        // An unrelated table squatting on the shadow name makes the rebuild fail
        db.conn()
            .execute_batch("CREATE TABLE characters_shadow (x INTEGER)")
            .unwrap();
        let registry = SchemaRegistry::new(db.clone());
        let before = names(&registry);

        let err = registry.remove_column("class").unwrap_err();
        assert!(matches!(err, CharacterError::SchemaRebuild { .. }));
        assert!(err.to_string().contains("characters_shadow"));
        assert_eq!(names(&registry), before);
        assert_eq!(db.rebuild_flag().unwrap(), None);
    }

    #[test]
    fn test_flagged_store_refuses_schema_changes() {
        let (_dir, db) = setup_db();
        set_rebuild_flag(&db.conn(), "class").unwrap();
        let registry = SchemaRegistry::new(db.clone());

        let err = registry.remove_column("race").unwrap_err();
        assert!(matches!(err, CharacterError::RecoveryRequired { .. }));
        let err = registry
            .add_column("nickname", ColumnType::Text, true, None)
            .unwrap_err();
        assert!(matches!(err, CharacterError::RecoveryRequired { .. }));

        // reads still work
        assert!(!registry.list_columns().unwrap().is_empty());

        db.clear_rebuild_flag().unwrap();
        registry.remove_column("race").unwrap();
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_allow_list_resolves_canonical_name() {
        let (_dir, db) = setup_db();
        let columns = SchemaRegistry::new(db).list_columns().unwrap();
        let allow = AllowList::new(&columns);
        assert_eq!(allow.quoted("NAME").unwrap(), "\"name\"");
        assert!(matches!(
            allow.quoted("name; --"),
            Err(CharacterError::UnknownField { .. })
        ));
    }
}
