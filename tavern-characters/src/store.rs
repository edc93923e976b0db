//! CRUD over `characters` rows.
//!
//! Statements are generated per call from the live column list. Column
//! names reach statement text only after [`AllowList`] resolution; every
//! value is a bound parameter.

use crate::codec::FieldCodec;
use crate::db::{Database, CHARACTERS_TABLE};
use crate::error::{CharacterError, Result};
use crate::schema::{quote_ident, read_columns, AllowList, SchemaRegistry};
use crate::types::{
    is_system_column, Column, FieldValue, Ownership, Record, RecordRole, ID_COLUMN,
    NAME_COLUMN, OWNER_COLUMN, ROLE_COLUMN,
};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Which records [`EntityStore::list`] returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub role: Option<RecordRole>,
    pub owner_id: Option<i64>,
    /// Case-insensitive substring of the `name` column
    pub name_contains: Option<String>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: RecordRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_name(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }
}

/// Record storage over the dynamic `characters` table.
///
/// Performs no access checks; callers go through
/// [`CharacterService`](crate::service::CharacterService) for that.
#[derive(Clone)]
pub struct EntityStore {
    db: Arc<Database>,
    schema: SchemaRegistry,
}

impl EntityStore {
    pub fn new(db: Arc<Database>, schema: SchemaRegistry) -> Self {
        Self { db, schema }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Insert a record and return its id.
    ///
    /// Every key must name a current non-system column. Columns left out
    /// take their default, or null.
    pub fn create(
        &self,
        role: RecordRole,
        owner_id: i64,
        values: &HashMap<String, FieldValue>,
    ) -> Result<i64> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let columns = read_columns(&tx)?;
        let allow = AllowList::new(&columns);
        let assignments = checked_assignments(&allow, values)?;

        let supplied: Vec<&str> = assignments.iter().map(|(c, _)| c.name.as_str()).collect();
        if let Some(missing) = columns.iter().find(|c| {
            !c.is_system() && !c.is_optional() && !supplied.contains(&c.name.as_str())
        }) {
            return Err(CharacterError::validation(&missing.name, "a value is required"));
        }

        let mut names = vec![quote_ident(ROLE_COLUMN), quote_ident(OWNER_COLUMN)];
        let mut params = vec![Value::Text(role.as_str().to_string()), Value::Integer(owner_id)];
        for (column, value) in &assignments {
            names.push(quote_ident(&column.name));
            params.push(to_value(value));
        }
        let placeholders = (1..=names.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {CHARACTERS_TABLE} ({}) VALUES ({placeholders})",
            names.join(", ")
        );
        debug!("{sql}");
        tx.execute(&sql, params_from_iter(params))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!("created {role} {id} for user {owner_id}");
        Ok(id)
    }

    /// Fetch one record with a value for every current column
    pub fn get(&self, id: i64) -> Result<Record> {
        let conn = self.db.conn();
        let columns = read_columns(&conn)?;
        let sql = format!(
            "SELECT {} FROM {CHARACTERS_TABLE} WHERE {} = ?1",
            select_list(&columns),
            quote_ident(ID_COLUMN)
        );
        conn.query_row(&sql, [id], |row| row_to_record(row, &columns))
            .optional()?
            .ok_or_else(|| CharacterError::record_not_found(id))
    }

    /// Ownership of a record without decoding every column
    pub fn ownership(&self, id: i64) -> Result<Option<Ownership>> {
        let conn = self.db.conn();
        let sql = format!(
            "SELECT {}, {} FROM {CHARACTERS_TABLE} WHERE {} = ?1",
            quote_ident(ROLE_COLUMN),
            quote_ident(OWNER_COLUMN),
            quote_ident(ID_COLUMN)
        );
        let found = conn
            .query_row(&sql, [id], |row| {
                let role: String = row.get(0)?;
                Ok((role, row.get::<_, Option<i64>>(1)?))
            })
            .optional()?;
        found
            .map(|(role, owner_user_id)| -> Result<Ownership> {
                Ok(Ownership {
                    role: role.parse()?,
                    owner_user_id,
                })
            })
            .transpose()
    }

    /// Apply a partial update. Nothing is written unless every key is a
    /// current, editable column and every value fits its column.
    pub fn update(&self, id: i64, values: &HashMap<String, FieldValue>) -> Result<()> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let columns = read_columns(&tx)?;
        let assignments = checked_assignments(&AllowList::new(&columns), values)?;

        if !exists(&tx, id)? {
            return Err(CharacterError::record_not_found(id));
        }
        if assignments.is_empty() {
            return Ok(());
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", quote_ident(&column.name), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<Value> = assignments.iter().map(|(_, v)| to_value(v)).collect();
        params.push(Value::Integer(id));
        let sql = format!(
            "UPDATE {CHARACTERS_TABLE} SET {set_clause} WHERE {} = ?{}",
            quote_ident(ID_COLUMN),
            params.len()
        );
        debug!("{sql}");
        tx.execute(&sql, params_from_iter(params))?;
        tx.commit()?;

        info!("updated record {id} ({} fields)", assignments.len());
        Ok(())
    }

    /// Hard-delete a record. Returns whether a row was removed; a missing
    /// id is not an error.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.db.conn().execute(
            &format!(
                "DELETE FROM {CHARACTERS_TABLE} WHERE {} = ?1",
                quote_ident(ID_COLUMN)
            ),
            [id],
        )?;
        if removed > 0 {
            info!("deleted record {id}");
        }
        Ok(removed > 0)
    }

    /// Records matching `filter`, ascending by id
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Record>> {
        let conn = self.db.conn();
        let columns = read_columns(&conn)?;
        let allow = AllowList::new(&columns);

        let mut conditions = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(role) = filter.role {
            params.push(Value::Text(role.as_str().to_string()));
            conditions.push(format!("{} = ?{}", quote_ident(ROLE_COLUMN), params.len()));
        }
        if let Some(owner) = filter.owner_id {
            params.push(Value::Integer(owner));
            conditions.push(format!("{} = ?{}", quote_ident(OWNER_COLUMN), params.len()));
        }
        if let Some(fragment) = filter.name_contains.as_deref().filter(|f| !f.is_empty()) {
            params.push(Value::Text(format!("%{}%", escape_like(fragment))));
            conditions.push(format!(
                "{} LIKE ?{} ESCAPE '\\'",
                allow.quoted(NAME_COLUMN)?,
                params.len()
            ));
        }

        let mut sql = format!(
            "SELECT {} FROM {CHARACTERS_TABLE}",
            select_list(&columns)
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY {} ASC", quote_ident(ID_COLUMN)));
        debug!("{sql}");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| row_to_record(row, &columns))?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

/// Resolve and type-check user-supplied assignments, in a stable order
fn checked_assignments<'a>(
    allow: &AllowList<'a>,
    values: &HashMap<String, FieldValue>,
) -> Result<Vec<(&'a Column, FieldValue)>> {
    let mut keys: Vec<&String> = values.keys().collect();
    keys.sort();

    let mut assignments = Vec::with_capacity(keys.len());
    for key in keys {
        if is_system_column(key) {
            return Err(CharacterError::ProtectedField { name: key.clone() });
        }
        let column = allow.resolve(key)?;
        let value = FieldCodec::conform(column, &values[key])?;
        assignments.push((column, value));
    }
    Ok(assignments)
}

fn exists(conn: &Connection, id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            &format!(
                "SELECT 1 FROM {CHARACTERS_TABLE} WHERE {} = ?1",
                quote_ident(ID_COLUMN)
            ),
            [id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn select_list(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Real(r) => Value::Real(*r),
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Boolean(b) => Value::Integer(*b as i64),
    }
}

fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Decode a row selected with [`select_list`] over `columns`
fn row_to_record(row: &Row<'_>, columns: &[Column]) -> rusqlite::Result<Record> {
    let mut id = None;
    let mut role = None;
    let mut owner_user_id = None;
    let mut fields = HashMap::new();

    for (index, column) in columns.iter().enumerate() {
        let value = FieldValue::from_sql(row.get_ref(index)?, column.column_type);
        match column.name.as_str() {
            ID_COLUMN => id = value.as_integer(),
            ROLE_COLUMN => {
                let text = value.as_text().unwrap_or_default();
                role = Some(text.parse::<RecordRole>().map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        index,
                        column.name.clone(),
                        rusqlite::types::Type::Text,
                    )
                })?);
            }
            OWNER_COLUMN => owner_user_id = value.as_integer(),
            _ => {
                fields.insert(column.name.clone(), value);
            }
        }
    }

    Ok(Record {
        id: id.ok_or(rusqlite::Error::InvalidColumnName(ID_COLUMN.to_string()))?,
        role: role.ok_or(rusqlite::Error::InvalidColumnName(ROLE_COLUMN.to_string()))?,
        owner_user_id,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::setup_db;
    use crate::types::ColumnType;

    fn setup_store() -> (tempfile::TempDir, EntityStore) {
        let (dir, db) = setup_db();
        let schema = SchemaRegistry::new(db.clone());
        (dir, EntityStore::new(db, schema))
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> HashMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_then_get_round_trip() {
        let (_dir, store) = setup_store();
        let values = fields(&[
            ("name", FieldValue::text("Arin")),
            ("race", FieldValue::text("Half-Elf")),
            ("level", FieldValue::Integer(4)),
            ("health", FieldValue::Integer(31)),
            ("skills", FieldValue::text("Arcana 2, Stealth 5")),
        ]);
        let id = store.create(RecordRole::Character, 7, &values).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.role, RecordRole::Character);
        assert_eq!(record.owner_user_id, Some(7));
        for (name, value) in &values {
            assert_eq!(record.get(name), Some(value), "{name}");
        }
        // unspecified columns are present and null
        assert_eq!(record.get("class"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_create_applies_defaults() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Npc, 1, &fields(&[("name", FieldValue::text("Gob"))]))
            .unwrap();
        assert_eq!(store.get(id).unwrap().get("level"), Some(&FieldValue::Integer(1)));
    }

    #[test]
    fn test_create_rejects_unknown_and_protected_fields() {
        let (_dir, store) = setup_store();
        let err = store
            .create(
                RecordRole::Character,
                1,
                &fields(&[("name", FieldValue::text("A")), ("nickname", FieldValue::text("B"))]),
            )
            .unwrap_err();
        assert!(matches!(err, CharacterError::UnknownField { .. }));

        let err = store
            .create(
                RecordRole::Character,
                1,
                &fields(&[("name", FieldValue::text("A")), ("id", FieldValue::Integer(99))]),
            )
            .unwrap_err();
        assert!(matches!(err, CharacterError::ProtectedField { .. }));
        assert!(store.list(&ListFilter::new()).unwrap().is_empty());
    }

    #[test]
    fn test_create_requires_name() {
        let (_dir, store) = setup_store();
        let err = store
            .create(RecordRole::Character, 1, &fields(&[("race", FieldValue::text("Elf"))]))
            .unwrap_err();
        assert!(matches!(err, CharacterError::Validation { .. }));
    }

    #[test]
    fn test_create_rejects_wrong_type() {
        let (_dir, store) = setup_store();
        let err = store
            .create(
                RecordRole::Character,
                1,
                &fields(&[("name", FieldValue::text("A")), ("level", FieldValue::text("two"))]),
            )
            .unwrap_err();
        assert!(matches!(err, CharacterError::Validation { .. }));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_dir, store) = setup_store();
        assert!(matches!(
            store.get(404),
            Err(CharacterError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_applies_named_fields() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Character, 1, &fields(&[("name", FieldValue::text("Arin"))]))
            .unwrap();
        store
            .update(
                id,
                &fields(&[("level", FieldValue::Integer(5)), ("race", FieldValue::text("Elf"))]),
            )
            .unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.get("level"), Some(&FieldValue::Integer(5)));
        assert_eq!(record.get("race"), Some(&FieldValue::text("Elf")));
        assert_eq!(record.name(), Some("Arin"));
    }

    #[test]
    fn test_update_unknown_field_changes_nothing() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Character, 1, &fields(&[("name", FieldValue::text("Arin"))]))
            .unwrap();
        let before = store.get(id).unwrap();

        let err = store
            .update(
                id,
                &fields(&[("level", FieldValue::Integer(9)), ("nonexistent", FieldValue::Integer(1))]),
            )
            .unwrap_err();
        assert!(matches!(err, CharacterError::UnknownField { .. }));
        assert_eq!(store.get(id).unwrap(), before);
    }

    #[test]
    fn test_update_cannot_touch_system_columns() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Character, 1, &fields(&[("name", FieldValue::text("Arin"))]))
            .unwrap();
        for protected in ["role", "owner_user_id", "ID"] {
            let err = store
                .update(id, &fields(&[(protected, FieldValue::Integer(2))]))
                .unwrap_err();
            assert!(matches!(err, CharacterError::ProtectedField { .. }));
        }
    }

    #[test]
    fn test_update_missing_record() {
        let (_dir, store) = setup_store();
        let err = store
            .update(5, &fields(&[("level", FieldValue::Integer(2))]))
            .unwrap_err();
        assert!(matches!(err, CharacterError::NotFound { .. }));
    }

    #[test]
    fn test_update_name_to_null_is_rejected() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Character, 1, &fields(&[("name", FieldValue::text("Arin"))]))
            .unwrap();
        let err = store
            .update(id, &fields(&[("name", FieldValue::Null)]))
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Npc, 1, &fields(&[("name", FieldValue::text("Gob"))]))
            .unwrap();
        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert!(!store.delete(9999).unwrap());
        assert!(store.get(id).is_err());
    }

    #[test]
    fn test_list_filters_and_orders() {
        let (_dir, store) = setup_store();
        let arin = store
            .create(RecordRole::Character, 7, &fields(&[("name", FieldValue::text("Arin"))]))
            .unwrap();
        let gob = store
            .create(RecordRole::Npc, 1, &fields(&[("name", FieldValue::text("Goblin"))]))
            .unwrap();
        let bree = store
            .create(RecordRole::Character, 8, &fields(&[("name", FieldValue::text("Bree"))]))
            .unwrap();

        let ids = |filter: ListFilter| -> Vec<i64> {
            store.list(&filter).unwrap().into_iter().map(|r| r.id).collect()
        };
        assert_eq!(ids(ListFilter::new()), vec![arin, gob, bree]);
        assert_eq!(ids(ListFilter::new().with_role(RecordRole::Character)), vec![arin, bree]);
        assert_eq!(ids(ListFilter::new().with_owner(8)), vec![bree]);
        assert_eq!(ids(ListFilter::new().with_name("RI")), vec![arin]);
        assert_eq!(ids(ListFilter::new().with_name("b")), vec![gob, bree]);
        assert!(ids(ListFilter::new().with_name("%")).is_empty());
    }

    #[test]
    fn test_list_name_filter_without_name_column() {
        let (_dir, store) = setup_store();
        store
            .create(RecordRole::Character, 1, &fields(&[("name", FieldValue::text("Arin"))]))
            .unwrap();
        store.schema().remove_column(NAME_COLUMN).unwrap();

        assert_eq!(store.list(&ListFilter::new()).unwrap().len(), 1);
        assert!(matches!(
            store.list(&ListFilter::new().with_name("x")),
            Err(CharacterError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_added_column_reads_null_for_existing_rows() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Character, 1, &fields(&[("name", FieldValue::text("Arin"))]))
            .unwrap();
        store
            .schema()
            .add_column("inspired", ColumnType::Boolean, true, None)
            .unwrap();
        assert_eq!(store.get(id).unwrap().get("inspired"), Some(&FieldValue::Null));

        store
            .update(id, &fields(&[("inspired", FieldValue::Boolean(true))]))
            .unwrap();
        assert_eq!(
            store.get(id).unwrap().get("inspired"),
            Some(&FieldValue::Boolean(true))
        );
    }

    #[test]
    fn test_nickname_scenario() {
        let (_dir, store) = setup_store();
        let schema = store.schema().clone();
        schema
            .add_column("nickname", ColumnType::Text, true, None)
            .unwrap();
        assert!(schema
            .list_columns()
            .unwrap()
            .iter()
            .any(|c| c.name == "nickname" && c.column_type == ColumnType::Text));

        let id = store
            .create(
                RecordRole::Character,
                7,
                &fields(&[("name", FieldValue::text("Arin")), ("nickname", FieldValue::text("Red"))]),
            )
            .unwrap();
        assert_eq!(store.get(id).unwrap().get("nickname"), Some(&FieldValue::text("Red")));

        schema.remove_column("nickname").unwrap();
        let record = store.get(id).unwrap();
        assert!(record.get("nickname").is_none());
        assert_eq!(record.name(), Some("Arin"));
    }

    #[test]
    fn test_ownership() {
        let (_dir, store) = setup_store();
        let id = store
            .create(RecordRole::Npc, 3, &fields(&[("name", FieldValue::text("Gob"))]))
            .unwrap();
        let ownership = store.ownership(id).unwrap().unwrap();
        assert_eq!(ownership.role, RecordRole::Npc);
        assert_eq!(ownership.owner_user_id, Some(3));
        assert!(store.ownership(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
