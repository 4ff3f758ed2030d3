//! Interactive command line for wildline
//!
//! This module provides a reedline editor wired to the completion engine:
//! - Tab completion through the active pipeline
//! - Command history with inline hints
//! - Highlighting of range, command name and search character
//!
//! Accepted lines are classified with the tokenizer and echoed back; `:quit`
//! (or `:q`, `:xit`, `exit`) ends the session.

mod completer;
mod engine;
mod highlighter;
mod hinter;
mod prompt;


pub use completer::WildCompleter;
pub use engine::ReplEngine;
pub use highlighter::CmdlineHighlighter;
pub use hinter::HistoryHinter;
pub use prompt::WildPrompt;

use crate::cmdline::tokenize;

/// What to do with an accepted line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    /// Nothing was typed
    Empty,
    /// End the session
    Quit,
    /// Print this description of the line
    Echo(String),
}

/// Classify an accepted line
pub fn evaluate(line: &str) -> LineAction {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineAction::Empty;
    }
    if trimmed == "exit" {
        return LineAction::Quit;
    }
    if let Some(pattern) = trimmed.strip_prefix('/').or_else(|| trimmed.strip_prefix('?')) {
        return LineAction::Echo(format!("search: {pattern}"));
    }

    let parsed = tokenize(line);
    match parsed.command_name.as_str() {
        "" => LineAction::Echo(format!("no command: {trimmed}")),
        "quit" | "xit" => LineAction::Quit,
        name => {
            let bang = if parsed.bang { "!" } else { "" };
            LineAction::Echo(format!("{name}{bang}: {}", parsed.arg().trim_end()))
        }
    }
}
