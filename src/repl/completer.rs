//! Completer for reedline - provides completion suggestions from the engine

use std::time::Duration;

use reedline::{Completer, Span, Suggestion};
use tracing::debug;

use crate::completion::{Candidate, complete_blocking};
use crate::error::{PipelineError, WildError};
use crate::pipeline::Engine;

/// Characters after which a replaced word starts
const WORD_BREAKS: &[char] = &[':', '/', '?', '|', '\\'];

/// Completer that runs the engine's pipeline over the text before the cursor
pub struct WildCompleter {
    /// Engine the runs are started on
    engine: Engine,

    /// How long to wait for a deferred run
    wait: Duration,
}

impl WildCompleter {
    /// Create a new completer
    ///
    /// # Arguments
    /// * `engine` - Engine with a pipeline or default factory installed
    /// * `wait` - How long a completion request may block the editor
    ///
    /// # Returns
    /// * `Self` - New completer
    pub fn new(engine: Engine, wait: Duration) -> Self {
        Self { engine, wait }
    }

    /// Candidates for `line` with the cursor at its end
    fn candidates(&mut self, line: &str) -> Vec<Candidate> {
        match complete_blocking(&mut self.engine, line, self.wait) {
            Ok(candidates) => candidates,
            Err(WildError::Pipeline(PipelineError::NoResult)) => Vec::new(),
            Err(e) => {
                debug!(line, error = %e, "completion failed");
                Vec::new()
            }
        }
    }
}

impl Completer for WildCompleter {
    /// Complete the input at the given cursor position
    ///
    /// Each candidate is spliced into the text before the cursor; the
    /// suggestion replaces only the word that actually changes so the menu
    /// shows readable entries.
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let Some(before) = line.get(..pos) else {
            return Vec::new();
        };

        self.candidates(before)
            .into_iter()
            .map(|candidate| {
                let spliced = candidate.apply(before);
                let start = replaced_word_start(before, &spliced);
                let description = (candidate.draw != candidate.output).then(|| candidate.draw.clone());
                Suggestion {
                    value: spliced[start..].to_string(),
                    description,
                    span: Span::new(start, pos),
                    append_whitespace: false,
                    ..Suggestion::default()
                }
            })
            .collect()
    }
}

/// Offset of the word in `before` that `spliced` rewrites
///
/// Both strings agree up to the returned offset, which lies on a char
/// boundary right after whitespace or one of [`WORD_BREAKS`].
pub(crate) fn replaced_word_start(before: &str, spliced: &str) -> usize {
    let common = before
        .char_indices()
        .zip(spliced.chars())
        .find(|((_, a), b)| a != b)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| before.len().min(spliced.len()));

    before[..common]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace() || WORD_BREAKS.contains(c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0)
}
