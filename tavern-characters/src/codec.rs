//! Type-dispatched parsing, prompting, and formatting of field values.

use crate::error::{CharacterError, Result};
use crate::schema::SchemaRegistry;
use crate::skills::{SkillSet, SKILLS_COLUMN, SKILL_CATALOG};
use crate::types::{Column, ColumnType, FieldValue};
use std::collections::{HashMap, VecDeque};
use std::io;
use tracing::debug;

/// Inputs accepted for a boolean `true`
const TRUE_INPUTS: [&str; 4] = ["true", "yes", "y", "1"];
/// Inputs accepted for a boolean `false`
const FALSE_INPUTS: [&str; 4] = ["false", "no", "n", "0"];

/// Source of interactive line input.
///
/// The terminal host implements this over its prompt library; tests feed
/// scripted answers through [`QueuedPrompter`].
pub trait Prompter {
    /// Show `prompt` and read one line. Blocks until input arrives.
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;

    /// Show a message, e.g. why the last input was rejected
    fn notify(&mut self, message: &str);
}

/// A [`Prompter`] that answers from a fixed queue of lines
#[derive(Debug, Default)]
pub struct QueuedPrompter {
    inputs: VecDeque<String>,
    /// Prompts shown, in order
    pub prompts: Vec<String>,
    /// Messages shown, in order
    pub messages: Vec<String>,
}

impl QueuedPrompter {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }
}

impl Prompter for QueuedPrompter {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.inputs
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"))
    }

    fn notify(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Parses and prompts for values according to the live column types
#[derive(Clone)]
pub struct FieldCodec {
    schema: SchemaRegistry,
}

impl FieldCodec {
    pub fn new(schema: SchemaRegistry) -> Self {
        Self { schema }
    }

    /// Parse raw input for `column`.
    ///
    /// Empty input means null for nullable numeric and boolean columns.
    /// Text passes through unmodified, except the skills column which must
    /// hold a well-formed skill list.
    pub fn parse(column: &Column, raw: &str) -> Result<FieldValue> {
        let trimmed = raw.trim();
        if column.column_type != ColumnType::Text && trimmed.is_empty() {
            return if column.nullable {
                Ok(FieldValue::Null)
            } else {
                Err(CharacterError::validation(&column.name, "a value is required"))
            };
        }

        match column.column_type {
            ColumnType::Integer => trimmed.parse().map(FieldValue::Integer).map_err(|_| {
                CharacterError::validation(
                    &column.name,
                    format!("'{trimmed}' is not a whole number"),
                )
            }),
            ColumnType::Real => match trimmed.parse::<f64>() {
                Ok(r) if r.is_finite() => Ok(FieldValue::Real(r)),
                _ => Err(CharacterError::validation(
                    &column.name,
                    format!("'{trimmed}' is not a number"),
                )),
            },
            ColumnType::Boolean => parse_boolean(trimmed)
                .map(FieldValue::Boolean)
                .ok_or_else(|| {
                    CharacterError::validation(
                        &column.name,
                        format!("'{trimmed}' is not one of true/false, yes/no, 1/0"),
                    )
                }),
            ColumnType::Text if is_skills(column) => {
                Ok(FieldValue::Text(SkillSet::parse(raw)?.encode()))
            }
            ColumnType::Text => Ok(FieldValue::Text(raw.to_string())),
        }
    }

    /// Parse raw input for the column called `name` in the live schema
    pub fn parse_field(&self, name: &str, raw: &str) -> Result<FieldValue> {
        let column = self.schema.column(name)?;
        Self::parse(&column, raw)
    }

    /// Parse `name=value` assignments against the live schema
    pub fn parse_assignments<'a, I>(&self, assignments: I) -> Result<HashMap<String, FieldValue>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let columns = self.schema.list_columns()?;
        let mut values = HashMap::new();
        for assignment in assignments {
            let (name, raw) = assignment.split_once('=').ok_or_else(|| {
                CharacterError::validation(assignment, "expected field=value")
            })?;
            let name = name.trim();
            let column = columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| CharacterError::unknown_field(name))?;
            values.insert(column.name.clone(), Self::parse(column, raw)?);
        }
        Ok(values)
    }

    /// Make `value` storable in `column`, widening integers for real columns
    pub fn conform(column: &Column, value: &FieldValue) -> Result<FieldValue> {
        match (column.column_type, value) {
            (_, FieldValue::Null) if column.nullable => Ok(FieldValue::Null),
            (_, FieldValue::Null) => Err(CharacterError::validation(
                &column.name,
                "a value is required",
            )),
            (ColumnType::Real, FieldValue::Integer(i)) => Ok(FieldValue::Real(*i as f64)),
            (expected, value) if value.kind() == Some(expected) => Ok(value.clone()),
            (expected, value) => Err(CharacterError::validation(
                &column.name,
                format!("'{value}' is not a {expected} value"),
            )),
        }
    }

    /// Prompt until a valid value for `column` is entered.
    ///
    /// A bad entry is reported and asked again; only an input failure
    /// (closed terminal) ends the loop with an error.
    pub fn prompt_value<P: Prompter + ?Sized>(
        &self,
        column: &Column,
        prompter: &mut P,
    ) -> Result<FieldValue> {
        if is_skills(column) {
            return self.prompt_skills(prompter);
        }
        let prompt = format!("Enter {} ({})", column.label(), column.column_type);
        loop {
            let raw = prompter.read_line(&prompt)?;
            match Self::parse(column, &raw) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_recoverable() => {
                    debug!("rejected input for {}: {err}", column.name);
                    prompter.notify(&format!("{err}. Please try again."));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Prompt for every catalog skill and return the encoded set
    pub fn prompt_skills<P: Prompter + ?Sized>(&self, prompter: &mut P) -> Result<FieldValue> {
        let mut skills = SkillSet::new();
        for name in SKILL_CATALOG {
            let prompt = format!("Enter {name} (INTEGER, blank for 0)");
            let value = loop {
                let raw = prompter.read_line(&prompt)?;
                let raw = raw.trim();
                if raw.is_empty() {
                    break 0;
                }
                match raw.parse::<i64>() {
                    Ok(value) => break value,
                    Err(_) => prompter.notify(&format!(
                        "'{raw}' is not a whole number. Please try again."
                    )),
                }
            };
            skills.set(name, value);
        }
        Ok(FieldValue::Text(skills.encode()))
    }

    /// Prompt for every editable column of the live schema.
    ///
    /// Null answers are left out so column defaults apply on insert.
    pub fn prompt_record<P: Prompter + ?Sized>(
        &self,
        prompter: &mut P,
    ) -> Result<HashMap<String, FieldValue>> {
        let mut values = HashMap::new();
        for column in self.schema.editable_columns()? {
            let value = self.prompt_value(&column, prompter)?;
            if !value.is_null() {
                values.insert(column.name, value);
            }
        }
        Ok(values)
    }

    /// Text shown for a value on sheets and in tables
    pub fn display(value: &FieldValue) -> String {
        match value {
            FieldValue::Null => "-".to_string(),
            FieldValue::Boolean(true) => "yes".to_string(),
            FieldValue::Boolean(false) => "no".to_string(),
            other => other.to_string(),
        }
    }
}

fn is_skills(column: &Column) -> bool {
    column.column_type == ColumnType::Text && column.name.eq_ignore_ascii_case(SKILLS_COLUMN)
}

fn parse_boolean(input: &str) -> Option<bool> {
    let lower = input.to_ascii_lowercase();
    if TRUE_INPUTS.contains(&lower.as_str()) {
        Some(true)
    } else if FALSE_INPUTS.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}
