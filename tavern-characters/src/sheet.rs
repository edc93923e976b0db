//! Character sheet layout.
//!
//! Known column names are claimed by fixed sections; whatever the live
//! schema holds beyond those lands in [`Section::Other`]. Every column of
//! the schema therefore shows up exactly once.

use crate::codec::FieldCodec;
use crate::skills::{SkillSet, SKILLS_COLUMN};
use crate::types::{Column, FieldValue, Record, OWNER_COLUMN};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{CellAlignment, ContentArrangement, Table};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Section {
    Identity,
    Attributes,
    Saves,
    Combat,
    Skills,
    Inventory,
    FeatsSpells,
    Abilities,
    Other,
}

impl Section {
    /// Display order
    pub const ALL: [Section; 9] = [
        Self::Identity,
        Self::Attributes,
        Self::Saves,
        Self::Combat,
        Self::Skills,
        Self::Inventory,
        Self::FeatsSpells,
        Self::Abilities,
        Self::Other,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Attributes => "Attributes",
            Self::Saves => "Saves",
            Self::Combat => "Combat",
            Self::Skills => "Skills",
            Self::Inventory => "Inventory",
            Self::FeatsSpells => "Feats & Spells",
            Self::Abilities => "Abilities",
            Self::Other => "Other",
        }
    }

    /// Column names this section claims
    fn claims(self) -> &'static [&'static str] {
        match self {
            Self::Identity => &[
                "id",
                "name",
                "role",
                OWNER_COLUMN,
                "race",
                "class",
                "level",
                "alignment",
                "background",
            ],
            Self::Attributes => &[
                "strength",
                "dexterity",
                "constitution",
                "intelligence",
                "wisdom",
                "charisma",
            ],
            Self::Saves => &["fortitude", "reflex", "will"],
            Self::Combat => &[
                "health",
                "armor_class",
                "hit_dice",
                "initiative",
                "speed",
                "base_attack",
            ],
            Self::Skills => &[SKILLS_COLUMN],
            Self::Inventory => &[
                "non_consumable_inventory",
                "consumable_inventory",
                "inventory",
                "gold",
            ],
            Self::FeatsSpells => &["feats", "spells_known", "spells"],
            Self::Abilities => &["abilities"],
            Self::Other => &[],
        }
    }

    /// The section a column belongs to
    pub fn for_column(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|section| {
                section
                    .claims()
                    .iter()
                    .any(|claimed| claimed.eq_ignore_ascii_case(name))
            })
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One labelled value on a sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetEntry {
    pub column: String,
    pub label: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetSection {
    pub section: Section,
    pub entries: Vec<SheetEntry>,
}

/// A record laid out for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub title: String,
    pub sections: Vec<SheetSection>,
}

impl Sheet {
    /// Every column shown, in display order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.entries.iter().map(|e| e.column.as_str()))
    }

    pub fn section(&self, section: Section) -> Option<&SheetSection> {
        self.sections.iter().find(|s| s.section == section)
    }
}

pub struct SheetRenderer;

impl SheetRenderer {
    /// Lay out `record` over `columns`, the live schema in table order.
    ///
    /// Sections keep schema order internally and are omitted when empty.
    pub fn build(columns: &[Column], record: &Record) -> Sheet {
        let sections = Section::ALL
            .into_iter()
            .filter_map(|section| {
                let entries: Vec<SheetEntry> = columns
                    .iter()
                    .filter(|c| Section::for_column(&c.name) == section)
                    .map(|c| SheetEntry {
                        column: c.name.clone(),
                        label: c.label(),
                        value: record.value_of(&c.name),
                    })
                    .collect();
                (!entries.is_empty()).then_some(SheetSection { section, entries })
            })
            .collect();

        let title = match record.name() {
            Some(name) => format!("{name} ({}, #{})", record.role, record.id),
            None => format!("{} #{}", record.role, record.id),
        };
        Sheet { title, sections }
    }

    /// Render a sheet as terminal text
    pub fn render(columns: &[Column], record: &Record) -> String {
        Self::build(columns, record).to_string()
    }
}

/// Two-column skill table, or `None` when the stored text does not parse
fn skills_table(value: &FieldValue) -> Option<Table> {
    let skills = SkillSet::parse(value.as_text()?).ok()?;
    if skills.is_empty() {
        return None;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Skill", "Value"]);
    for (name, value) in skills.iter() {
        table.add_row(vec![name.to_string(), value.to_string()]);
    }
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    Some(table)
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.title)?;
        for section in &self.sections {
            writeln!(f)?;
            writeln!(f, "[{}]", section.section)?;
            let width = section
                .entries
                .iter()
                .map(|e| e.label.chars().count())
                .max()
                .unwrap_or(0);
            for entry in &section.entries {
                if section.section == Section::Skills {
                    if let Some(table) = skills_table(&entry.value) {
                        writeln!(f, "{table}")?;
                        continue;
                    }
                }
                writeln!(
                    f,
                    "  {:<width$} : {}",
                    entry.label,
                    FieldCodec::display(&entry.value)
                )?;
            }
        }
        Ok(())
    }
}
