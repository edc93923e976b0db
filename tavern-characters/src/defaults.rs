//! Seed schema for a freshly created `characters` table.
//!
//! These are the pre-populated D&D columns a new campaign starts with. They
//! are ordinary columns afterwards: a GM can remove any of them except the
//! system columns, and add new ones.

use crate::skills::SKILLS_COLUMN;
use crate::types::{Column, ColumnType, FieldValue, ID_COLUMN, NAME_COLUMN, OWNER_COLUMN, ROLE_COLUMN};

fn column(name: &str, column_type: ColumnType) -> Column {
    Column {
        name: name.to_string(),
        column_type,
        nullable: true,
        default: None,
        primary_key: false,
    }
}

/// Columns of a new `characters` table, in table order
pub fn seed_columns() -> Vec<Column> {
    vec![
        Column {
            primary_key: true,
            nullable: false,
            ..column(ID_COLUMN, ColumnType::Integer)
        },
        Column {
            nullable: false,
            ..column(NAME_COLUMN, ColumnType::Text)
        },
        Column {
            nullable: false,
            ..column(ROLE_COLUMN, ColumnType::Text)
        },
        column(OWNER_COLUMN, ColumnType::Integer),
        column("race", ColumnType::Text),
        column("class", ColumnType::Text),
        Column {
            default: Some(FieldValue::Integer(1)),
            ..column("level", ColumnType::Integer)
        },
        column("health", ColumnType::Integer),
        column("strength", ColumnType::Integer),
        column("intelligence", ColumnType::Integer),
        column("armor_class", ColumnType::Integer),
        column("hit_dice", ColumnType::Text),
        column("fortitude", ColumnType::Integer),
        column("reflex", ColumnType::Integer),
        column("will", ColumnType::Integer),
        column(SKILLS_COLUMN, ColumnType::Text),
        column("abilities", ColumnType::Text),
        column("non_consumable_inventory", ColumnType::Text),
        column("consumable_inventory", ColumnType::Text),
        column("spells_known", ColumnType::Text),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seed_contains_system_columns() {
        let columns = seed_columns();
        for name in crate::types::SYSTEM_COLUMNS {
            assert!(columns.iter().any(|c| c.name == name), "missing {name}");
        }
        assert!(columns[0].primary_key);
    }

    #[test]
    fn test_seed_names_unique() {
        let columns = seed_columns();
        let names: HashSet<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), columns.len());
    }

    #[test]
    fn test_only_name_is_required() {
        let required: Vec<_> = seed_columns()
            .into_iter()
            .filter(|c| !c.is_system() && !c.is_optional())
            .map(|c| c.name)
            .collect();
        assert_eq!(required, vec![NAME_COLUMN.to_string()]);
    }
}
