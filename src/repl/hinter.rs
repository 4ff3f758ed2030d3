//! Hinter for reedline - inline hints from the command history

use nu_ansi_term::{Color, Style};
use reedline::{Hinter, History, SearchQuery};

/// Suggests the rest of the most recent history entry sharing the typed prefix
pub struct HistoryHinter {
    /// Style for hints
    style: Style,
    /// Current hint text
    current_hint: String,
}

impl HistoryHinter {
    pub fn new() -> Self {
        Self {
            style: Style::new().italic().fg(Color::DarkGray),
            current_hint: String::new(),
        }
    }
}

impl Default for HistoryHinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Hinter for HistoryHinter {
    /// Provide a hint for the current line
    ///
    /// # Arguments
    /// * `line` - The current input line
    /// * `pos` - Cursor position
    /// * `history` - Command history
    /// * `use_ansi_coloring` - Whether to use ANSI colors
    /// * `_cwd` - Current working directory (unused)
    ///
    /// # Returns
    /// * `String` - Hint text to display after the cursor
    fn handle(
        &mut self,
        line: &str,
        pos: usize,
        history: &dyn History,
        use_ansi_coloring: bool,
        _cwd: &str,
    ) -> String {
        self.current_hint.clear();

        // Hints only make sense with the cursor at the end
        if pos != line.len() || line.trim().is_empty() {
            return String::new();
        }

        let found = history
            .search(SearchQuery::last_with_prefix(line.to_string(), None))
            .ok()
            .and_then(|results| results.into_iter().next());

        let Some(item) = found else {
            return String::new();
        };
        let Some(rest) = item.command_line.strip_prefix(line) else {
            return String::new();
        };
        if rest.is_empty() {
            return String::new();
        }

        self.current_hint = rest.to_string();
        if use_ansi_coloring {
            self.style.paint(rest).to_string()
        } else {
            rest.to_string()
        }
    }

    /// Hint up to and including the next word break
    fn next_hint_token(&self) -> String {
        let hint = self.current_hint.as_str();
        let leading = hint.len() - hint.trim_start().len();
        let end = hint[leading..]
            .find(char::is_whitespace)
            .map(|i| leading + i)
            .unwrap_or(hint.len());
        hint[..end].to_string()
    }

    fn complete_hint(&self) -> String {
        self.current_hint.clone()
    }
}
