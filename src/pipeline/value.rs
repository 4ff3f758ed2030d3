//! Values threaded through a pipeline run
//!
//! A step receives the current [`Value`] and answers with a [`Flow`]: either a
//! new value for the next step, or one of the two sentinels that end the run
//! early.

use serde::Serialize;

use crate::cmdline::ParseResult;
use crate::completion::Candidate;
use crate::error::StepFault;

/// Data carried between steps
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// No data
    #[default]
    Null,
    /// Boolean result (also what `Flow::Done` finishes with)
    Bool(bool),
    /// Plain string, typically the command line or an argument
    Str(String),
    /// Ordered values; `map` joins its sub-results into one of these
    List(Vec<Value>),
    /// Tokenizer output for a command line
    Parsed(ParseResult),
    /// Annotated completion candidates
    Candidates(Vec<Candidate>),
}

/// What a step hands back to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Pass this value to the next step
    Continue(Value),
    /// Abort the run silently; neither callback fires
    Skip,
    /// Finish immediately with this boolean, bypassing remaining steps
    Done(bool),
}

/// Result of invoking a single step
pub type StepResult = std::result::Result<Flow, StepFault>;

impl Value {
    /// Short name of the variant, used in fault messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Parsed(_) => "parsed",
            Value::Candidates(_) => "candidates",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_parsed(&self) -> Option<&ParseResult> {
        match self {
            Value::Parsed(p) => Some(p),
            _ => None,
        }
    }

    /// Check whether this is the `false` a `Done(false)` finishes with
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    /// Convert a list of strings into owned strings
    ///
    /// Returns `None` if this is not a list or any element is not a string.
    pub fn into_strings(self) -> Option<Vec<String>> {
        match self {
            Value::List(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Str(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Like [`Value::into_strings`], but reports a step fault on mismatch
    pub fn expect_strings(self, step: &str) -> std::result::Result<Vec<String>, StepFault> {
        let kind = self.kind();
        self.into_strings()
            .ok_or_else(|| StepFault::step(format!("{step}: expected a list of strings, got {kind}")))
    }
}

impl Flow {
    /// Continue with anything convertible into a [`Value`]
    pub fn value(v: impl Into<Value>) -> Self {
        Flow::Continue(v.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::Str).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ParseResult> for Value {
    fn from(p: ParseResult) -> Self {
        Value::Parsed(p)
    }
}

impl From<Vec<Candidate>> for Value {
    fn from(c: Vec<Candidate>) -> Self {
        Value::Candidates(c)
    }
}
