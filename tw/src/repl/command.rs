//! Parsing of REPL input lines

use std::path::PathBuf;

use colored::Colorize;

use crate::record::RecordSet;
use crate::store::StoreEvent;

/// A command typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Load a file, prompting for the name when not given
    Load(Option<PathBuf>),
    Unload,
    Print,
    /// Save the table, prompting for a destination when not given
    Save(Option<PathBuf>),
    Status,
    Help,
    Exit,
}

/// Parse one line of input. The command word is case-insensitive; anything
/// after it is taken verbatim as a file name.
pub fn parse_command(input: &str) -> Result<ReplCommand, String> {
    let input = input.trim();
    let (word, rest) = match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    };
    let arg = (!rest.is_empty()).then(|| PathBuf::from(rest));

    let command = match word.to_lowercase().as_str() {
        "load" => ReplCommand::Load(arg),
        "save" => ReplCommand::Save(arg),
        "unload" => no_args(ReplCommand::Unload, word, rest)?,
        "print" => no_args(ReplCommand::Print, word, rest)?,
        "status" => no_args(ReplCommand::Status, word, rest)?,
        "help" | "?" => ReplCommand::Help,
        "exit" | "quit" => ReplCommand::Exit,
        _ => return Err("Unknown command. Try: load, unload, print, save, status, help, exit.".to_string()),
    };
    Ok(command)
}

fn no_args(command: ReplCommand, word: &str, rest: &str) -> Result<ReplCommand, String> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(format!("'{}' takes no arguments", word))
    }
}

/// Interpret a yes/no answer; None for anything else
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Render rows for display, one `Row N: a | b | c` line each
pub fn format_rows(records: &RecordSet) -> Vec<String> {
    records
        .iter()
        .enumerate()
        .map(|(i, row)| format!("Row {}: {}", i + 1, row.join(" | ")))
        .collect()
}

/// Render a watcher notice as a single `[Watcher] ...` line
pub fn format_notice(event: &StoreEvent) -> String {
    match event {
        StoreEvent::Reloaded { path, rows } => format!(
            "{} Detected file change. Reloaded {} rows from {}",
            "[Watcher]".bright_blue(),
            rows,
            path.display()
        ),
        StoreEvent::ReloadFailed { path, error } => {
            format!("{} Failed to reload {}: {}", "[Watcher]".yellow(), path.display(), error)
        }
    }
}
