//! Cursor over a single command line
//!
//! Positions are byte offsets into the line and always sit on a character
//! boundary.

/// Whitespace as the editor sees it: space, or a control code from tab
/// through carriage return
pub fn is_whitespace(c: char) -> bool {
    c == ' ' || ('\u{9}'..='\u{d}').contains(&c)
}

/// Scanning state over one line
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn line(&self) -> &'a str {
        self.line
    }

    /// Text from the cursor to the end of the line
    pub fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.line.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consume one character
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume `expected` if it is the next character
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consume characters while `pred` holds, returning the consumed slice
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.line[start..self.pos]
    }

    /// Advance past whitespace
    ///
    /// Returns `false` when the end of the line is reached, `true` when a
    /// non-whitespace character follows.
    pub fn skip_whitespace(&mut self) -> bool {
        self.take_while(is_whitespace);
        !self.is_at_end()
    }

    /// Advance past non-whitespace, with the same return convention as
    /// [`Scanner::skip_whitespace`]
    pub fn skip_nonwhitespace(&mut self) -> bool {
        self.take_while(|c| !is_whitespace(c));
        !self.is_at_end()
    }
}
