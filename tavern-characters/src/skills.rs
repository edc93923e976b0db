//! The composite `skills` attribute.
//!
//! Skills are a closed catalog of named slots, each holding an integer. The
//! whole set is stored in one text column as comma-separated `Name Value`
//! pairs, e.g. `Acrobatics 2, Animal Handling 0, Arcana 5`. Names outside
//! the catalog are rejected; accepted names take the catalog spelling.
//!
//! Parsing splits on commas, then takes the last whitespace-delimited token
//! of each item as the value. A skill name must therefore never end in a
//! token that reads as a number, and must not contain a comma.

use crate::error::{CharacterError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Column holding the encoded skill set
pub const SKILLS_COLUMN: &str = "skills";

/// Skill slots offered when entering a sheet
pub const SKILL_CATALOG: [&str; 18] = [
    "Acrobatics",
    "Animal Handling",
    "Arcana",
    "Athletics",
    "Deception",
    "History",
    "Insight",
    "Intimidation",
    "Investigation",
    "Medicine",
    "Nature",
    "Perception",
    "Performance",
    "Persuasion",
    "Religion",
    "Sleight of Hand",
    "Stealth",
    "Survival",
];

/// Ordered skill name -> value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillSet {
    entries: Vec<(String, i64)>,
}

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a skill, replacing an existing entry of the same name in place
    pub fn set(&mut self, name: impl Into<String>, value: i64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the stored text form
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|(name, value)| format!("{name} {value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse the stored text form
    pub fn parse(blob: &str) -> Result<Self> {
        let mut set = Self::new();
        for item in blob.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (name, value) = item
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| invalid(format!("'{item}' has no value")))?;
            let name = name.trim_end();
            if name.is_empty() {
                return Err(invalid(format!("'{item}' has no skill name")));
            }
            let name = catalog_name(name)
                .ok_or_else(|| invalid(format!("'{name}' is not a known skill")))?;
            let value = value
                .parse::<i64>()
                .map_err(|_| invalid(format!("'{value}' is not a whole number in '{item}'")))?;
            set.set(name, value);
        }
        Ok(set)
    }
}

/// Catalog spelling of a skill name, matched case-insensitively
pub fn catalog_name(name: &str) -> Option<&'static str> {
    SKILL_CATALOG
        .iter()
        .copied()
        .find(|skill| skill.eq_ignore_ascii_case(name))
}

fn invalid(message: String) -> CharacterError {
    CharacterError::validation(SKILLS_COLUMN, message)
}

impl FromStr for SkillSet {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SkillSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
