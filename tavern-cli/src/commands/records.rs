//! `tavern list|show|create|edit|delete`

use super::App;
use crate::cli::RecordKind;
use crate::table::records_table;
use anyhow::{bail, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tavern_characters::{Column, FieldValue, ListFilter, PaginatedSearch, Record, RecordRole};

/// One page of `tavern list --json`
#[derive(Serialize)]
struct ListPage<'a> {
    page: usize,
    pages: usize,
    total: usize,
    records: Vec<RecordView<'a>>,
}

#[derive(Serialize)]
struct RecordView<'a> {
    id: i64,
    role: RecordRole,
    owner_user_id: Option<i64>,
    fields: OrderedFields<'a>,
}

/// Non-system fields of a record in table order
struct OrderedFields<'a> {
    columns: &'a [Column],
    record: &'a Record,
}

impl Serialize for OrderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for column in self.columns.iter().filter(|c| !c.is_system()) {
            let value = self.record.get(&column.name).unwrap_or(&FieldValue::Null);
            map.serialize_entry(&column.name, value)?;
        }
        map.end()
    }
}

fn page_json(search: &PaginatedSearch<Record>, columns: &[Column]) -> serde_json::Result<String> {
    let page = ListPage {
        page: search.page_index() + 1,
        pages: search.page_count(),
        total: search.len(),
        records: search
            .page()
            .iter()
            .map(|record| RecordView {
                id: record.id,
                role: record.role,
                owner_user_id: record.owner_user_id,
                fields: OrderedFields { columns, record },
            })
            .collect(),
    };
    serde_json::to_string_pretty(&page)
}

pub fn run_list(
    app: &App,
    role: Option<RecordKind>,
    owner: Option<i64>,
    name: Option<String>,
    page: usize,
    json: bool,
) -> Result<()> {
    let actor = app.actor()?;
    let filter = ListFilter {
        role: role.map(RecordRole::from),
        owner_id: owner,
        name_contains: name,
    };
    let mut search = app.service.search(&actor, &filter, app.page_size())?;

    if page == 0 {
        bail!("pages are numbered from 1");
    }
    for _ in 1..page {
        if !search.next() {
            break;
        }
    }

    if json {
        let columns = app.service.schema().list_columns()?;
        println!("{}", page_json(&search, &columns)?);
        return Ok(());
    }

    if search.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    println!("{}", records_table(search.page(), search.page_offset() + 1));
    println!(
        "\nPage {} of {} ({} record(s)).",
        search.page_index() + 1,
        search.page_count(),
        search.len()
    );
    Ok(())
}

pub fn run_show(app: &App, id: i64, json: bool) -> Result<()> {
    let actor = app.actor()?;
    let sheet = app.service.sheet(&actor, id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sheet)?);
    } else {
        print!("{sheet}");
    }
    Ok(())
}

pub fn run_create(app: &App, role: RecordKind, assignments: &[String]) -> Result<()> {
    let actor = app.actor()?;
    let values = app
        .service
        .codec()
        .parse_assignments(assignments.iter().map(String::as_str))?;
    let role = RecordRole::from(role);
    let id = app.service.create(&actor, role, &values)?;
    println!("Created {role} #{id}.");
    Ok(())
}

pub fn run_edit(app: &App, id: i64, assignments: &[String]) -> Result<()> {
    let actor = app.actor()?;
    let values = app
        .service
        .codec()
        .parse_assignments(assignments.iter().map(String::as_str))?;
    app.service.update(&actor, id, &values)?;
    println!("Updated #{id} ({} field(s)).", values.len());
    Ok(())
}

pub fn run_delete(app: &App, id: i64) -> Result<()> {
    let actor = app.actor()?;
    if app.service.delete(&actor, id)? {
        println!("Deleted #{id}.");
    } else {
        println!("Nothing to delete: #{id} does not exist.");
    }
    Ok(())
}
