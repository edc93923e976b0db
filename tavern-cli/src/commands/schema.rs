//! `tavern schema list|add|remove|status|clear-flag`

use super::App;
use crate::table::new_table;
use anyhow::{bail, Result};
use tavern_characters::{Column, ColumnType, FieldCodec, FieldValue};

pub fn run_list(app: &App, json: bool) -> Result<()> {
    let columns = app.service.schema().list_columns()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&columns)?);
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec!["Field", "Label", "Type", "Nullable", "Default", "System"]);
    for column in &columns {
        table.add_row(vec![
            column.name.clone(),
            column.label(),
            column.column_type.to_string(),
            yes_no(column.nullable),
            column
                .default
                .as_ref()
                .map(FieldCodec::display)
                .unwrap_or_default(),
            yes_no(column.is_system()),
        ]);
    }
    println!("{table}");
    println!("\n{} field(s).", columns.len());
    Ok(())
}

pub fn run_add(
    app: &App,
    name: &str,
    field_type: &str,
    required: bool,
    default: Option<&str>,
) -> Result<()> {
    let actor = app.actor()?;
    let column_type: ColumnType = field_type.parse()?;
    let default = default
        .map(|raw| parse_default(name, column_type, raw))
        .transpose()?;
    let column = app
        .service
        .add_column(&actor, name, column_type, !required, default)?;
    println!("Added field '{}' ({}).", column.name, column.column_type);
    Ok(())
}

pub fn run_remove(app: &App, name: &str) -> Result<()> {
    let actor = app.actor()?;
    app.service.remove_column(&actor, name)?;
    println!("Removed field '{name}'.");
    Ok(())
}

pub fn run_status(app: &App) -> Result<()> {
    match app.service.database().rebuild_flag()? {
        Some(column) => {
            println!("Removal of field '{column}' was interrupted.");
            println!("Repair the database, then run `tavern schema clear-flag`.");
        }
        None => println!("Schema is healthy."),
    }
    Ok(())
}

pub fn run_clear_flag(app: &App) -> Result<()> {
    let actor = app.actor()?;
    if !actor.is_gm() {
        bail!("permission denied: only the GM may clear the rebuild flag");
    }
    if app.service.database().clear_rebuild_flag()? {
        println!("Rebuild flag cleared.");
    } else {
        println!("No rebuild flag was set.");
    }
    Ok(())
}

/// Parse a default value as if typed for a nullable column of `column_type`
pub(crate) fn parse_default(
    name: &str,
    column_type: ColumnType,
    raw: &str,
) -> tavern_characters::Result<FieldValue> {
    let column = Column {
        name: name.to_string(),
        column_type,
        nullable: true,
        default: None,
        primary_key: false,
    };
    FieldCodec::parse(&column, raw)
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}
