//! Command line tokenizer
//!
//! Splits a command line into the command name and the offset where its
//! arguments start. Parsing never fails: a line without a recognisable command
//! yields an empty name and an argument offset of 0.

use serde::Serialize;
use tracing::trace;

use super::commands::{SINGLE_CHAR_COMMANDS, expand_command};
use super::scanner::Scanner;

/// Classification of one command line
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ParseResult {
    /// The line that was parsed
    pub line: String,
    /// Byte offset where the command's arguments begin
    pub arg_start: usize,
    /// Full command name (abbreviations expanded), empty when none was found
    pub command_name: String,
    /// Byte offset where the command name begins
    pub command_start: usize,
    /// Whether the command carries a `!`
    pub bang: bool,
}

impl ParseResult {
    /// Result for a line without a command
    fn empty(line: &str) -> Self {
        Self {
            line: line.to_string(),
            ..Self::default()
        }
    }

    /// Argument text the user has typed so far
    pub fn arg(&self) -> &str {
        self.line.get(self.arg_start..).unwrap_or("")
    }

    /// Whether the cursor is still on the command name itself
    pub fn in_command_name(&self) -> bool {
        !self.command_name.is_empty()
            && self.arg_start == self.line.len()
            && !self.bang
            && !self.line.ends_with(super::scanner::is_whitespace)
    }
}

/// Tokenizer with a one-slot cache keyed by the exact input line
#[derive(Debug, Default)]
pub struct CmdlineParser {
    cache: Option<ParseResult>,
    scans: usize,
}

impl CmdlineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `line`, reusing the previous result when the line is unchanged
    pub fn parse(&mut self, line: &str) -> ParseResult {
        if let Some(cached) = &self.cache {
            if cached.line == line {
                trace!("cmdline cache hit");
                return cached.clone();
            }
        }

        self.scans += 1;
        let parsed = tokenize(line);
        self.cache = Some(parsed.clone());
        parsed
    }

    /// Splice `candidate` into `line` at its argument offset
    pub fn replace(&mut self, line: &str, candidate: &str) -> String {
        let parsed = self.parse(line);
        replace(&parsed, line, candidate)
    }

    /// Number of lines actually scanned (cache misses)
    pub fn scans(&self) -> usize {
        self.scans
    }
}

/// Tokenize `line` from scratch
pub fn tokenize(line: &str) -> ParseResult {
    let mut s = Scanner::new(line);

    // leading whitespace and colons
    loop {
        s.skip_whitespace();
        if !s.eat(':') {
            break;
        }
    }

    skip_range(&mut s);
    s.skip_whitespace();

    let command_start = s.pos();
    let raw = scan_command_name(&mut s);
    if raw.is_empty() {
        return ParseResult::empty(line);
    }

    let bang = raw.chars().all(|c| c.is_ascii_alphanumeric()) && s.eat('!');
    s.skip_whitespace();

    ParseResult {
        line: line.to_string(),
        arg_start: s.pos(),
        command_name: expand_command(raw),
        command_start,
        bang,
    }
}

/// Splice a chosen candidate into the original line
///
/// Keeps everything before the argument offset and appends `candidate`; the
/// rest of the typed argument is dropped. Menu-style commands splice at the
/// same point as every other command.
pub fn replace(parsed: &ParseResult, line: &str, candidate: &str) -> String {
    let head = line.get(..parsed.arg_start).unwrap_or(line);
    format!("{head}{candidate}")
}

/// Split the argument of a substitute-style command being typed
///
/// Returns the delimiter and the pattern typed so far, e.g. `/fo` gives
/// `("/", "fo")`. Returns `None` when there is no delimited pattern or the
/// pattern is already closed and the replacement is being typed.
pub fn split_substitute(arg: &str) -> Option<(String, String)> {
    let mut s = Scanner::new(arg);
    let delim = s.bump()?;
    if delim.is_ascii_alphanumeric() || super::scanner::is_whitespace(delim) || "\\\"|".contains(delim) {
        return None;
    }

    let start = s.pos();
    while let Some(c) = s.bump() {
        if c == '\\' {
            s.bump();
        } else if c == delim {
            return None;
        }
    }
    Some((delim.to_string(), arg[start..].to_string()))
}

fn scan_command_name<'a>(s: &mut Scanner<'a>) -> &'a str {
    match s.peek() {
        Some(c) if c.is_ascii_uppercase() => s.take_while(|c| c.is_ascii_alphanumeric()),
        Some(c) if c.is_ascii_alphabetic() => s.take_while(|c| c.is_ascii_alphabetic()),
        Some(c) if SINGLE_CHAR_COMMANDS.contains(&c) => {
            let start = s.pos();
            s.bump();
            &s.line()[start..s.pos()]
        }
        _ => "",
    }
}

/// Skip a line range such as `%`, `1,$`, `'a,'b` or `/pat/;?pat?`
fn skip_range(s: &mut Scanner<'_>) {
    while let Some(c) = s.peek() {
        match c {
            '0'..='9' | '.' | '$' | '%' | ',' | ';' | '+' | '-' => {
                s.bump();
            }
            '\'' => {
                s.bump();
                s.bump();
            }
            '\\' => {
                // \/ \? \&
                s.bump();
                s.bump();
            }
            '/' | '?' => {
                s.bump();
                skip_pattern(s, c);
            }
            _ => break,
        }
    }
}

/// Skip to just past the next unescaped `delim`
fn skip_pattern(s: &mut Scanner<'_>, delim: char) {
    while let Some(c) = s.bump() {
        if c == '\\' {
            s.bump();
        } else if c == delim {
            return;
        }
    }
}
