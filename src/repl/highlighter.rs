//! Highlighter for the command line
//!
//! Colors the parts the tokenizer recognises: the range prefix, the command
//! name (built-in, user-defined or unknown) and, for search lines, the search
//! character.

use nu_ansi_term::{Color, Style};
use reedline::{Highlighter, StyledText};

use crate::cmdline::{BuiltinCatalog, CommandCatalog, is_user_command, tokenize};

/// Command-line highlighter
pub struct CmdlineHighlighter {
    /// Names of the built-in commands
    builtins: Vec<String>,
    enabled: bool,
}

impl CmdlineHighlighter {
    /// Create a highlighter that knows the commands of `catalog`
    pub fn new(catalog: &dyn CommandCatalog, enabled: bool) -> Self {
        Self {
            builtins: catalog.command_names(),
            enabled,
        }
    }

    fn command_style(&self, name: &str) -> Style {
        if is_user_command(name) {
            Color::Cyan.bold()
        } else if self.builtins.iter().any(|b| b == name) {
            Color::Green.bold()
        } else {
            Color::Red.normal()
        }
    }

    fn highlight_search(line: &str) -> StyledText {
        let mut styled = StyledText::new();
        let split = line.chars().next().map(char::len_utf8).unwrap_or(0);
        styled.push((Color::Magenta.bold(), line[..split].to_string()));
        styled.push((Style::default(), line[split..].to_string()));
        styled
    }
}

/// End offset of the command name as typed, before expansion
fn raw_name_end(line: &str, start: usize) -> usize {
    let rest = &line[start..];
    let run = |keep: fn(&char) -> bool| {
        rest.char_indices()
            .find(|(_, c)| !keep(c))
            .map(|(i, _)| start + i)
            .unwrap_or(line.len())
    };
    match rest.chars().next() {
        Some(c) if c.is_ascii_uppercase() => run(char::is_ascii_alphanumeric),
        Some(c) if c.is_ascii_lowercase() => run(char::is_ascii_alphabetic),
        Some(c) => start + c.len_utf8(),
        None => start,
    }
}

impl Default for CmdlineHighlighter {
    fn default() -> Self {
        Self::new(&BuiltinCatalog, true)
    }
}

impl Highlighter for CmdlineHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();
        if !self.enabled {
            styled.push((Style::default(), line.to_string()));
            return styled;
        }

        if line.starts_with('/') || line.starts_with('?') {
            return Self::highlight_search(line);
        }

        let parsed = tokenize(line);
        if parsed.command_name.is_empty() {
            styled.push((Style::default(), line.to_string()));
            return styled;
        }

        let name_end = raw_name_end(line, parsed.command_start);
        styled.push((Color::Yellow.normal(), line[..parsed.command_start].to_string()));
        styled.push((
            self.command_style(&parsed.command_name),
            line[parsed.command_start..name_end].to_string(),
        ));
        styled.push((Style::default(), line[name_end..].to_string()));
        styled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(styled: &StyledText) -> Vec<&str> {
        styled
            .buffer
            .iter()
            .map(|(_, text)| text.as_str())
            .filter(|text| !text.is_empty())
            .collect()
    }

    #[test]
    fn test_disabled_highlighter_keeps_line() {
        let highlighter = CmdlineHighlighter::new(&BuiltinCatalog, false);
        let styled = highlighter.highlight(":e foo", 0);
        assert_eq!(styled.raw_string(), ":e foo");
        assert_eq!(styled.buffer.len(), 1);
    }

    #[test]
    fn test_command_parts() {
        let highlighter = CmdlineHighlighter::default();
        let styled = highlighter.highlight(":1,2s/a/b", 0);
        assert_eq!(styled.raw_string(), ":1,2s/a/b");
        assert_eq!(pieces(&styled), vec![":1,2", "s", "/a/b"]);
    }

    #[test]
    fn test_command_styles() {
        let highlighter = CmdlineHighlighter::default();
        assert_eq!(highlighter.command_style("edit"), Color::Green.bold());
        assert_eq!(highlighter.command_style("MyCmd"), Color::Cyan.bold());
        assert_eq!(highlighter.command_style("nosuch"), Color::Red.normal());
    }

    #[test]
    fn test_search_line() {
        let highlighter = CmdlineHighlighter::default();
        let styled = highlighter.highlight("/foo", 0);
        assert_eq!(pieces(&styled), vec!["/", "foo"]);
        assert_eq!(styled.buffer[0].0, Color::Magenta.bold());
    }
}
