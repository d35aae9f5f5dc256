//! Command output
//!
//! A command ends with one of three calls: [`Formatter::done`] after a
//! change, [`Formatter::listing`] for enumerations, or [`Formatter::error`].
//! In JSON mode each call writes a single JSON document, errors to stderr.

use serde::Serialize;

use super::OutputConfig;

#[derive(Debug, Clone, Copy)]
enum Mark {
    Done,
    Failed,
}

/// Writes command results in the format selected on the command line
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Report a completed change: `record` in JSON mode, else `message`
    pub fn done<T: Serialize>(&self, record: &T, message: &str) {
        if self.config.quiet {
            return;
        }
        if self.config.json {
            print_json(record);
        } else {
            println!("{}", self.marked(Mark::Done, message));
        }
    }

    /// Print an enumeration: `record` in JSON mode, else `text` unless empty
    pub fn listing<T: Serialize>(&self, record: &T, text: &str) {
        if self.config.quiet {
            return;
        }
        if self.config.json {
            print_json(record);
        } else if !text.is_empty() {
            println!("{text}");
        }
    }

    /// Report a failure; never silenced by quiet mode
    pub fn error(&self, message: &str) {
        if self.config.json {
            eprintln!("{}", error_document(message));
        } else {
            eprintln!("{}", self.marked(Mark::Failed, message));
        }
    }

    fn marked(&self, mark: Mark, message: &str) -> String {
        let (glyph, color) = match mark {
            Mark::Done => ('✓', 32),
            Mark::Failed => ('✗', 31),
        };
        if self.config.no_color {
            format!("{glyph} {message}")
        } else {
            format!("\x1b[{color}m{glyph}\x1b[0m {message}")
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing output: {e}"),
    }
}

fn error_document(message: &str) -> String {
    serde_json::to_string_pretty(&serde_json::json!({ "error": message }))
        .unwrap_or_else(|_| message.to_string())
}
