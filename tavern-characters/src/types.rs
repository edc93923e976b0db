//! Core column, value, and record types.
//!
//! A record's attributes are held as a `name -> FieldValue` map rather than
//! fixed struct fields, so the set of attributes can follow the live schema.

use crate::error::{CharacterError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Primary key column
pub const ID_COLUMN: &str = "id";
/// Character/NPC discriminator column
pub const ROLE_COLUMN: &str = "role";
/// Creating user, used for ownership checks
pub const OWNER_COLUMN: &str = "owner_user_id";
/// Column used by name filters and sheet titles
pub const NAME_COLUMN: &str = "name";

/// Columns that exist on every table and can never be removed or edited
pub const SYSTEM_COLUMNS: [&str; 3] = [ID_COLUMN, ROLE_COLUMN, OWNER_COLUMN];

/// Whether `name` is one of the system columns
pub fn is_system_column(name: &str) -> bool {
    SYSTEM_COLUMNS
        .iter()
        .any(|system| system.eq_ignore_ascii_case(name))
}

/// Turn a column name into a display label: `armor_class` -> `Armor class`
pub fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl ColumnType {
    pub const ALL: [ColumnType; 4] = [Self::Integer, Self::Real, Self::Text, Self::Boolean];

    /// Declared SQL type used in generated DDL
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
        }
    }

    /// Map a declared type read back from SQLite onto a column type.
    ///
    /// Follows SQLite's affinity rules so tables created by other tools
    /// still introspect; unrecognised declarations read as text.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("BOOL") {
            Self::Boolean
        } else if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

impl FromStr for ColumnType {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.sql_type().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CharacterError::conflict(format!(
                    "unsupported field type '{}' (expected INTEGER, REAL, TEXT or BOOLEAN)",
                    s.trim()
                ))
            })
    }
}

/// A single attribute value tagged with its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The column type this value belongs to, `None` for null
    pub fn kind(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::Real(_) => Some(ColumnType::Real),
            Self::Text(_) => Some(ColumnType::Text),
            Self::Boolean(_) => Some(ColumnType::Boolean),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Decode a stored SQLite value for a column of type `column_type`.
    ///
    /// Booleans are stored as 0/1. Values whose storage class does not match
    /// the declared type are kept as-is so a table rebuild copies them
    /// unchanged.
    pub fn from_sql(value: ValueRef<'_>, column_type: ColumnType) -> Self {
        match (value, column_type) {
            (ValueRef::Null, _) => Self::Null,
            (ValueRef::Integer(i), ColumnType::Boolean) => Self::Boolean(i != 0),
            (ValueRef::Integer(i), ColumnType::Real) => Self::Real(i as f64),
            (ValueRef::Integer(i), _) => Self::Integer(i),
            (ValueRef::Real(r), _) => Self::Real(r),
            (ValueRef::Text(bytes), _) | (ValueRef::Blob(bytes), _) => {
                Self::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }

    /// Render as an SQL literal for a `DEFAULT` clause.
    ///
    /// DDL cannot bind parameters, so defaults are the one place a value is
    /// written into statement text; text is quoted with `'` doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => format!("{r:?}"),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Boolean(b) => (*b as i64).to_string(),
        }
    }

    /// Parse a `dflt_value` literal as reported by `PRAGMA table_info`
    pub fn from_sql_literal(literal: &str, column_type: ColumnType) -> Self {
        let literal = literal.trim();
        if literal.eq_ignore_ascii_case("NULL") {
            return Self::Null;
        }
        if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
            let inner = literal[1..literal.len() - 1].replace("''", "'");
            return Self::Text(inner);
        }
        let parsed = match column_type {
            ColumnType::Integer => literal.parse().ok().map(Self::Integer),
            ColumnType::Real => literal.parse().ok().map(Self::Real),
            ColumnType::Boolean => literal.parse::<i64>().ok().map(|i| Self::Boolean(i != 0)),
            ColumnType::Text => None,
        };
        parsed.unwrap_or_else(|| Self::Text(literal.to_string()))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Self::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Boolean(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
        })
    }
}

/// A column of the `characters` table as seen by the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
    #[serde(skip)]
    pub primary_key: bool,
}

impl Column {
    pub fn is_system(&self) -> bool {
        is_system_column(&self.name)
    }

    /// Whether an insert may leave this column out
    pub fn is_optional(&self) -> bool {
        self.nullable || self.default.is_some() || self.primary_key
    }

    pub fn label(&self) -> String {
        humanize(&self.name)
    }
}

/// The kind of record: a player character or a GM-controlled NPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordRole {
    Character,
    Npc,
}

impl RecordRole {
    /// Value stored in the `role` column
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Npc => "npc",
        }
    }
}

impl fmt::Display for RecordRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character => f.write_str("Character"),
            Self::Npc => f.write_str("NPC"),
        }
    }
}

impl FromStr for RecordRole {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "character" | "pc" => Ok(Self::Character),
            "npc" => Ok(Self::Npc),
            other => Err(CharacterError::validation(
                ROLE_COLUMN,
                format!("'{other}' is not a role (expected character or npc)"),
            )),
        }
    }
}

/// The parts of a record that access checks look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub role: RecordRole,
    pub owner_user_id: Option<i64>,
}

/// A Character or NPC row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    pub role: RecordRole,
    pub owner_user_id: Option<i64>,
    /// Every non-system column of the live schema, null when unset
    pub fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_COLUMN).and_then(FieldValue::as_text)
    }

    pub fn ownership(&self) -> Ownership {
        Ownership {
            role: self.role,
            owner_user_id: self.owner_user_id,
        }
    }

    /// Value of any column, system columns included
    pub fn value_of(&self, column: &str) -> FieldValue {
        match column {
            ID_COLUMN => FieldValue::Integer(self.id),
            ROLE_COLUMN => FieldValue::text(self.role.as_str()),
            OWNER_COLUMN => self
                .owner_user_id
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Null),
            other => self.fields.get(other).cloned().unwrap_or(FieldValue::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("INTEGER", ColumnType::Integer)]
    #[case("integer", ColumnType::Integer)]
    #[case(" Real ", ColumnType::Real)]
    #[case("TEXT", ColumnType::Text)]
    #[case("boolean", ColumnType::Boolean)]
    fn test_column_type_from_str(#[case] input: &str, #[case] expected: ColumnType) {
        assert_eq!(input.parse::<ColumnType>().unwrap(), expected);
    }

    #[test]
    fn test_unsupported_column_type_is_conflict() {
        let err = "BLOB".parse::<ColumnType>().unwrap_err();
        assert!(matches!(err, CharacterError::SchemaConflict { .. }));
    }

    #[rstest]
    #[case("INTEGER", ColumnType::Integer)]
    #[case("BIGINT", ColumnType::Integer)]
    #[case("VARCHAR(20)", ColumnType::Text)]
    #[case("DOUBLE", ColumnType::Real)]
    #[case("BOOLEAN", ColumnType::Boolean)]
    #[case("", ColumnType::Text)]
    fn test_column_type_from_declared(#[case] declared: &str, #[case] expected: ColumnType) {
        assert_eq!(ColumnType::from_declared(declared), expected);
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("armor_class"), "Armor class");
        assert_eq!(humanize("name"), "Name");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        let value = FieldValue::text("O'Brien");
        assert_eq!(value.to_sql_literal(), "'O''Brien'");
        assert_eq!(
            FieldValue::from_sql_literal(&value.to_sql_literal(), ColumnType::Text),
            value
        );
    }

    #[test]
    fn test_sql_literal_numbers_and_booleans() {
        assert_eq!(FieldValue::Real(2.0).to_sql_literal(), "2.0");
        assert_eq!(FieldValue::Boolean(true).to_sql_literal(), "1");
        assert_eq!(
            FieldValue::from_sql_literal("1", ColumnType::Boolean),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            FieldValue::from_sql_literal("-3", ColumnType::Integer),
            FieldValue::Integer(-3)
        );
        assert_eq!(
            FieldValue::from_sql_literal("NULL", ColumnType::Integer),
            FieldValue::Null
        );
    }

    #[test]
    fn test_from_sql_boolean_column() {
        assert_eq!(
            FieldValue::from_sql(ValueRef::Integer(1), ColumnType::Boolean),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            FieldValue::from_sql(ValueRef::Integer(0), ColumnType::Boolean),
            FieldValue::Boolean(false)
        );
        assert_eq!(
            FieldValue::from_sql(ValueRef::Null, ColumnType::Boolean),
            FieldValue::Null
        );
    }

    #[test]
    fn test_field_value_serializes_tagged() {
        let json = serde_json::to_value(FieldValue::Integer(7)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "integer", "value": 7}));
    }

    #[test]
    fn test_record_role_parse() {
        assert_eq!("NPC".parse::<RecordRole>().unwrap(), RecordRole::Npc);
        assert_eq!("character".parse::<RecordRole>().unwrap(), RecordRole::Character);
        assert!("monster".parse::<RecordRole>().is_err());
    }

    #[test]
    fn test_system_columns() {
        assert!(is_system_column("id"));
        assert!(is_system_column("ROLE"));
        assert!(is_system_column("owner_user_id"));
        assert!(!is_system_column("name"));
    }
}
