//! Candidate records delivered to the menu
//!
//! A [`Candidate`] pairs the completed text with the [`Replacer`] that splices
//! it into the command line once the user accepts it.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cmdline;
use crate::pipeline::{Flow, RunContext, StepFn, Value, step};

/// Splice function: `(line, output) -> new line`
#[derive(Clone)]
pub struct Replacer(Arc<dyn Fn(&str, &str) -> String + Send + Sync>);

impl Replacer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Replace the command's argument with the candidate
    pub fn cmdline() -> Self {
        Self::new(|line, output| cmdline::replace(&cmdline::tokenize(line), line, output))
    }

    /// Replace the command name itself with the candidate
    pub fn command_name() -> Self {
        Self::new(|line, output| {
            let parsed = cmdline::tokenize(line);
            let start = if parsed.command_name.is_empty() {
                line.len()
            } else {
                parsed.command_start
            };
            format!("{}{}", line.get(..start).unwrap_or(line), output)
        })
    }

    /// Replace the pattern of a substitute-style command, keeping `prefix`
    pub fn substitute(prefix: String) -> Self {
        Self::new(move |line, output| {
            let parsed = cmdline::tokenize(line);
            cmdline::replace(&parsed, line, &format!("{prefix}{output}"))
        })
    }

    /// Replace the whole line
    pub fn whole_line() -> Self {
        Self::new(|_, output| output.to_string())
    }

    pub fn apply(&self, line: &str, output: &str) -> String {
        (self.0)(line, output)
    }
}

impl fmt::Debug for Replacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Replacer")
    }
}

/// One completion suggestion
#[derive(Clone, Serialize)]
pub struct Candidate {
    /// Raw completion result
    pub result: String,
    /// Text shown in the menu
    pub draw: String,
    /// Text inserted into the line
    pub output: String,
    /// How to splice `output` into the line
    #[serde(skip)]
    pub replace: Replacer,
}

impl Candidate {
    /// Candidate drawn and inserted as `result`
    pub fn new(result: impl Into<String>, replace: Replacer) -> Self {
        let result = result.into();
        Self {
            draw: result.clone(),
            output: result.clone(),
            result,
            replace,
        }
    }

    pub fn with_draw(mut self, draw: impl Into<String>) -> Self {
        self.draw = draw.into();
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// The line after accepting this candidate
    pub fn apply(&self, line: &str) -> String {
        self.replace.apply(line, &self.output)
    }
}

impl PartialEq for Candidate {
    // the replacer is not comparable
    fn eq(&self, other: &Self) -> bool {
        self.result == other.result && self.draw == other.draw && self.output == other.output
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("result", &self.result)
            .field("draw", &self.draw)
            .field("output", &self.output)
            .finish()
    }
}

/// Step turning a list of strings into candidates spliced by `replace`
pub fn annotate(replace: Replacer) -> StepFn {
    step(move |_: &mut RunContext, input: Value| {
        let items = input.expect_strings("annotate")?;
        let candidates = items
            .into_iter()
            .map(|s| Candidate::new(s, replace.clone()))
            .collect::<Vec<_>>();
        Ok(Flow::value(candidates))
    })
}

/// Candidates for file paths: drawn as-is, inserted escaped
pub fn file_candidates(paths: Vec<String>) -> Vec<Candidate> {
    paths
        .into_iter()
        .map(|p| {
            let escaped = super::steps::escape_file(&p);
            Candidate::new(p, Replacer::cmdline()).with_output(escaped)
        })
        .collect()
}

/// Candidates for a substitute pattern: display escaped, inserted raw
pub fn substitute_candidates(prefix: &str, patterns: Vec<String>) -> Vec<Candidate> {
    let replace = Replacer::substitute(prefix.to_string());
    patterns
        .into_iter()
        .map(|p| {
            let draw = super::steps::escape_pattern_display(&p);
            Candidate::new(p, replace.clone()).with_draw(draw)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmdline_replacer() {
        let c = Candidate::new("foo.txt", Replacer::cmdline());
        assert_eq!(c.apply(":e fo"), ":e foo.txt");
        assert_eq!(c.apply(""), "foo.txt");
    }

    #[test]
    fn test_command_name_replacer() {
        let c = Candidate::new("vsplit", Replacer::command_name());
        assert_eq!(c.apply(":vs"), ":vsplit");
        assert_eq!(c.apply(":1,2vs"), ":1,2vsplit");
        assert_eq!(c.apply(":"), ":vsplit");
    }

    #[test]
    fn test_substitute_replacer() {
        let c = substitute_candidates("/", vec!["foo.bar".to_string()]).remove(0);
        assert_eq!(c.draw, "foo\\.bar");
        assert_eq!(c.output, "foo.bar");
        assert_eq!(c.apply(":%s/fo"), ":%s/foo.bar");
    }

    #[test]
    fn test_file_candidates_escape_output() {
        let c = file_candidates(vec!["my file.txt".to_string()]).remove(0);
        assert_eq!(c.draw, "my file.txt");
        if cfg!(windows) {
            assert_eq!(c.output, "\"my file.txt\"");
        } else {
            assert_eq!(c.output, "my\\ file.txt");
            assert_eq!(c.apply(":e my"), ":e my\\ file.txt");
        }
    }

    #[test]
    fn test_equality_ignores_replacer() {
        let a = Candidate::new("x", Replacer::cmdline());
        let b = Candidate::new("x", Replacer::whole_line());
        assert_eq!(a, b);
        assert_ne!(a, b.with_draw("y"));
    }

    #[test]
    fn test_serialize_skips_replacer() {
        let c = Candidate::new("x", Replacer::cmdline());
        assert_eq!(
            serde_json::to_string(&c).unwrap(),
            r#"{"result":"x","draw":"x","output":"x"}"#
        );
    }
}
