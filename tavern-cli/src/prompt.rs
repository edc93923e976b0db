//! Terminal prompting through dialoguer.

use dialoguer::{theme::ColorfulTheme, Input};
use std::io;
use tavern_characters::Prompter;

/// A [`Prompter`] reading from the terminal
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(into_io)
    }

    fn notify(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Unwrap dialoguer's error so callers can tell end of input apart
fn into_io(err: dialoguer::Error) -> io::Error {
    match err {
        dialoguer::Error::IO(e) => e,
    }
}
