//! Terminal-aware table utilities.

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use tavern_characters::{FieldCodec, Record};

/// Widest name shown in a listing row
const NAME_WIDTH: usize = 32;

/// Create a table pre-configured for terminal-width-aware output.
///
/// Uses crossterm to detect the actual terminal width, falling back to
/// 120 columns when not connected to a TTY.
pub fn new_table() -> Table {
    let width = crossterm::terminal::size()
        .map(|(w, _)| w)
        .unwrap_or(120);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(width);
    table
}

/// Truncate a string to `max` characters, appending "..." if truncated.
///
/// Safe for multi-byte (UTF-8) strings.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Listing table for records; `first_row` numbers the rows
pub fn records_table(records: &[Record], first_row: usize) -> Table {
    let mut table = new_table();
    table.set_header(vec!["#", "ID", "Name", "Kind", "Owner", "Class", "Level"]);
    for (offset, record) in records.iter().enumerate() {
        let cell = |field: &str| {
            record
                .get(field)
                .map(FieldCodec::display)
                .unwrap_or_else(|| "-".to_string())
        };
        table.add_row(vec![
            (first_row + offset).to_string(),
            record.id.to_string(),
            truncate_str(record.name().unwrap_or("-"), NAME_WIDTH),
            record.role.to_string(),
            record
                .owner_user_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            cell("class"),
            cell("level"),
        ]);
    }
    table
}
