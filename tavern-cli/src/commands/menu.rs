//! `tavern menu`: the interactive Character/NPC management loop.
//!
//! All input and output goes through a [`Prompter`], so a scripted
//! [`QueuedPrompter`](tavern_characters::QueuedPrompter) can drive a whole
//! session in tests. Running out of input ends the session.

use super::schema::parse_default;
use super::App;
use crate::prompt::TerminalPrompter;
use crate::table::records_table;
use anyhow::Result;
use std::collections::HashMap;
use std::io;
use tavern_characters::{
    Action, Actor, CharacterError, ColumnType, ListFilter, Ownership, Prompter, Record,
    RecordRole, SearchSession, SheetRenderer,
};

const MAIN_MENU: &str = "\n--- Character/NPC Management ---
1. Add Character/NPC
2. View Characters/NPCs
3. Edit Character/NPC
4. Delete Character/NPC
5. Customize Fields
6. Back";

const FIELDS_MENU: &str = "\n--- Customize Character/NPC Fields ---
1. Add a new field
2. Remove a field
3. Back";

const BROWSE_HELP: &str = "[n]ext, [p]revious, row number to open, [s]earch again, [b]ack";

type MenuResult<T> = tavern_characters::Result<T>;

pub fn run_menu(app: &App) -> Result<()> {
    let actor = app.actor()?;
    let mut prompter = TerminalPrompter::new();
    Menu::new(app, actor).run(&mut prompter)?;
    Ok(())
}

pub struct Menu<'a> {
    app: &'a App,
    actor: Actor,
}

impl<'a> Menu<'a> {
    pub fn new(app: &'a App, actor: Actor) -> Self {
        Self { app, actor }
    }

    /// Run until the user picks Back or input ends
    pub fn run<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        loop {
            p.notify(MAIN_MENU);
            let outcome = match read(p, "Enter your choice") {
                Ok(choice) => match choice.trim() {
                    "1" => self.add(p),
                    "2" => self.view(p),
                    "3" => self.edit(p),
                    "4" => self.delete(p),
                    "5" => self.customize(p),
                    "6" => return Ok(()),
                    _ => {
                        p.notify("Invalid choice. Please try again.");
                        Ok(())
                    }
                },
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => {}
                Err(err) if is_end_of_input(&err) => return Ok(()),
                Err(err @ CharacterError::Io(_)) => return Err(err),
                Err(err) => p.notify(&format!("Error: {err}")),
            }
        }
    }

    fn add<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        let role = loop {
            let raw = read(p, "Kind (character/npc, blank for character)")?;
            if raw.trim().is_empty() {
                break RecordRole::Character;
            }
            match raw.parse::<RecordRole>() {
                Ok(role) => break role,
                Err(err) => p.notify(&format!("{err}. Please try again.")),
            }
        };
        let ownership = Ownership {
            role,
            owner_user_id: Some(self.actor.user_id),
        };
        self.app
            .service
            .policy()
            .enforce(&self.actor, &ownership, Action::Create)?;

        let values = self.app.service.codec().prompt_record(p)?;
        let id = self.app.service.create(&self.actor, role, &values)?;
        p.notify(&format!("{role} added successfully with id #{id}."));
        Ok(())
    }

    fn view<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        let mut session = SearchSession::new(self.app.page_size());
        self.new_search(p, &mut session)?;

        loop {
            let results = session.results();
            if results.is_empty() {
                p.notify("No characters or NPCs found.");
                return Ok(());
            }
            p.notify(&records_table(results.page(), results.page_offset() + 1).to_string());
            p.notify(&format!(
                "Page {} of {} ({} record(s))",
                results.page_index() + 1,
                results.page_count(),
                results.len()
            ));

            let command = read(p, BROWSE_HELP)?;
            match command.trim().to_ascii_lowercase().as_str() {
                "n" | "next" => {
                    if !session.results_mut().next() {
                        p.notify("Already on the last page.");
                    }
                }
                "p" | "previous" => {
                    if !session.results_mut().previous() {
                        p.notify("Already on the first page.");
                    }
                }
                "s" | "search" => self.new_search(p, &mut session)?,
                "b" | "back" | "" => return Ok(()),
                other => match other.parse::<usize>().ok().and_then(|row| {
                    row.checked_sub(1)
                        .and_then(|index| session.results().select(index))
                }) {
                    Some(record) => self.show_sheet(p, record)?,
                    None => p.notify(&format!("'{other}' is not a row. {BROWSE_HELP}")),
                },
            }
        }
    }

    fn new_search<P: Prompter>(
        &self,
        p: &mut P,
        session: &mut SearchSession<Record>,
    ) -> MenuResult<()> {
        let fragment = read(p, "Search by name (blank for all)")?;
        let fragment = fragment.trim();
        let filter = if fragment.is_empty() {
            ListFilter::new()
        } else {
            ListFilter::new().with_name(fragment)
        };
        session.start(filter, |filter| self.app.service.list(&self.actor, filter))?;
        Ok(())
    }

    fn show_sheet<P: Prompter>(&self, p: &mut P, record: &Record) -> MenuResult<()> {
        let columns = self.app.service.schema().list_columns()?;
        p.notify(&SheetRenderer::render(&columns, record));
        Ok(())
    }

    fn edit<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        let Some(id) = read_id(p, "Enter the ID of the character/NPC to edit")? else {
            return Ok(());
        };
        let record = self.app.service.get(&self.actor, id)?;
        self.app
            .service
            .policy()
            .enforce(&self.actor, &record.ownership(), Action::Update)?;

        let columns = self.app.service.schema().editable_columns()?;
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        p.notify(&format!("Available fields: {}", names.join(", ")));

        let mut changes = HashMap::new();
        loop {
            let field = read(p, "Field to edit (blank to finish)")?;
            let field = field.trim();
            if field.is_empty() {
                break;
            }
            match columns.iter().find(|c| c.name.eq_ignore_ascii_case(field)) {
                Some(column) => {
                    let value = self.app.service.codec().prompt_value(column, p)?;
                    changes.insert(column.name.clone(), value);
                }
                None => p.notify(&format!("Unknown field '{field}'.")),
            }
        }

        if changes.is_empty() {
            p.notify("Nothing changed.");
            return Ok(());
        }
        self.app.service.update(&self.actor, id, &changes)?;
        p.notify(&format!("Character/NPC #{id} updated successfully."));
        Ok(())
    }

    fn delete<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        let Some(id) = read_id(p, "Enter the ID of the character/NPC to delete")? else {
            return Ok(());
        };
        let record = self.app.service.get(&self.actor, id)?;
        let name = record.name().unwrap_or("this record");
        if !confirm(p, &format!("Delete {name} (#{id})? This cannot be undone"))? {
            p.notify("Kept.");
            return Ok(());
        }
        self.app.service.delete(&self.actor, id)?;
        p.notify(&format!("Character/NPC #{id} deleted successfully."));
        Ok(())
    }

    fn customize<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        if !self.actor.is_gm() {
            p.notify("Only the GM can customize fields.");
            return Ok(());
        }
        loop {
            p.notify(FIELDS_MENU);
            let outcome = match read(p, "Enter your choice")?.trim() {
                "1" => self.add_field(p),
                "2" => self.remove_field(p),
                "3" => return Ok(()),
                _ => {
                    p.notify("Invalid choice. Please try again.");
                    Ok(())
                }
            };
            match outcome {
                Ok(()) => {}
                Err(err @ CharacterError::Io(_)) => return Err(err),
                Err(err) => p.notify(&format!("Error: {err}")),
            }
        }
    }

    fn add_field<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        let name = read(p, "Enter the name of the new field")?.trim().to_string();
        let column_type = loop {
            let raw = read(p, "Enter the type of the field (INTEGER, TEXT, REAL, BOOLEAN)")?;
            match raw.parse::<ColumnType>() {
                Ok(column_type) => break column_type,
                Err(err) => p.notify(&format!("{err}. Please try again.")),
            }
        };
        let nullable = confirm(p, "Can this field be empty?")?;
        let default = loop {
            let raw = read(p, "Enter the default value (blank to skip)")?;
            if raw.trim().is_empty() {
                break None;
            }
            match parse_default(&name, column_type, &raw) {
                Ok(value) => break Some(value),
                Err(err) if err.is_recoverable() => {
                    p.notify(&format!("{err}. Please try again."))
                }
                Err(err) => return Err(err),
            }
        };

        let column = self
            .app
            .service
            .add_column(&self.actor, &name, column_type, nullable, default)?;
        p.notify(&format!(
            "Field '{}' of type {} added.",
            column.name, column.column_type
        ));
        Ok(())
    }

    fn remove_field<P: Prompter>(&self, p: &mut P) -> MenuResult<()> {
        let name = read(p, "Enter the name of the field to remove")?.trim().to_string();
        let column = self.app.service.schema().column(&name)?;
        if column.is_system() {
            return Err(CharacterError::ProtectedField { name: column.name });
        }
        if !confirm(
            p,
            &format!("Remove '{}' and its value from every record?", column.name),
        )? {
            p.notify("Kept.");
            return Ok(());
        }
        self.app.service.remove_column(&self.actor, &column.name)?;
        p.notify(&format!("Field '{}' removed successfully.", column.name));
        Ok(())
    }
}

fn read<P: Prompter>(p: &mut P, prompt: &str) -> MenuResult<String> {
    Ok(p.read_line(prompt)?)
}

/// Ask for a record id; blank cancels
fn read_id<P: Prompter>(p: &mut P, prompt: &str) -> MenuResult<Option<i64>> {
    loop {
        let raw = read(p, &format!("{prompt} (blank to cancel)"))?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        match raw.parse() {
            Ok(id) => return Ok(Some(id)),
            Err(_) => p.notify(&format!("'{raw}' is not an id. Please try again.")),
        }
    }
}

fn confirm<P: Prompter>(p: &mut P, question: &str) -> MenuResult<bool> {
    loop {
        let raw = read(p, &format!("{question} (yes/no)"))?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => p.notify("Please answer yes or no."),
        }
    }
}

fn is_end_of_input(err: &CharacterError) -> bool {
    matches!(err, CharacterError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
}
