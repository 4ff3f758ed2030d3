//! Steps that reshape candidate lists
//!
//! Each step here works on a `Value::List` of strings. The plain functions
//! behind them are public too, for hosts that want the same behavior outside
//! a pipeline.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StepFault;
use crate::pipeline::{Flow, RunContext, StepFn, Value, step};

/// Characters escaped when a file path is inserted into the command line
#[cfg(not(windows))]
const FILE_SPECIAL: &[char] = &[
    ' ', '\t', '\n', '*', '?', '[', '{', '`', '$', '\\', '%', '#', '\'', '"', '|', '!', '<',
];

/// Regex metacharacters escaped when a pattern is shown in the menu
const PATTERN_SPECIAL: &[char] = &['^', '$', '.', '*', '~', '[', ']', '\\'];

/// Drop repeated strings, keeping the first occurrence
pub fn uniq_strings(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Keep the strings matching `pattern`
///
/// With `basename_only`, only the final path component is matched, so a
/// directory prefix typed by the user does not count against the filter.
pub fn filter_strings(
    pattern: &str,
    items: Vec<String>,
    basename_only: bool,
) -> Result<Vec<String>, regex::Error> {
    let re = Regex::new(pattern)?;
    Ok(items
        .into_iter()
        .filter(|s| {
            let subject = if basename_only { basename(s) } else { s };
            re.is_match(subject)
        })
        .collect())
}

/// Final path component, ignoring a trailing separator
fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches(std::path::is_separator);
    Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(trimmed)
}

/// Case-insensitive subsequence pattern: `abc` becomes `(?i)a.*b.*c`
pub fn fuzzy_pattern(query: &str) -> String {
    let parts = query
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>();
    format!("(?i){}", parts.join(".*"))
}

/// How closely `query` matches the best stretch of `item`, from 0.0 to 1.0
///
/// Compares case-insensitively, sliding the shorter string over the longer
/// one and keeping the best normalized Levenshtein similarity.
pub fn partial_ratio(item: &str, query: &str) -> f64 {
    let item = item.to_lowercase().chars().collect::<Vec<_>>();
    let query = query.to_lowercase().chars().collect::<Vec<_>>();
    let (short, long) = if query.len() <= item.len() {
        (query, item)
    } else {
        (item, query)
    };
    if short.is_empty() {
        return 0.0;
    }

    let needle = short.iter().collect::<String>();
    long.windows(short.len())
        .map(|window| strsim::normalized_levenshtein(&window.iter().collect::<String>(), &needle))
        .fold(0.0, f64::max)
}

/// Order `items` best match for `query` first
///
/// Equally good matches keep their relative order. With `basename_only`, the
/// final path component is compared.
pub fn rank_fuzzy(query: &str, items: Vec<String>, basename_only: bool) -> Vec<String> {
    if query.is_empty() {
        return items;
    }
    let mut scored = items
        .into_iter()
        .map(|item| {
            let subject = if basename_only { basename(&item) } else { &item };
            (partial_ratio(subject, query), item)
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

/// Search `lines` for matches of `pattern`
///
/// Returns each distinct match at most once, in the order found, and stops
/// after `max_candidates` matches (0 means no limit). An empty pattern
/// matches nothing.
pub fn search_lines(
    pattern: &str,
    lines: &[String],
    max_candidates: usize,
) -> Result<Vec<String>, regex::Error> {
    search_lines_until(pattern, lines, max_candidates, None)
}

/// [`search_lines`] that gives up with the matches found so far once
/// `cancel` fires
pub fn search_lines_until(
    pattern: &str,
    lines: &[String],
    max_candidates: usize,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<String>, regex::Error> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let re = Regex::new(pattern)?;

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for line in lines {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            debug!(found = found.len(), "buffer search cancelled");
            break;
        }
        for m in re.find_iter(line) {
            let text = m.as_str();
            if text.is_empty() || !seen.insert(text.to_string()) {
                continue;
            }
            found.push(text.to_string());
            if max_candidates > 0 && found.len() >= max_candidates {
                return Ok(found);
            }
        }
    }
    Ok(found)
}

/// Spans of the non-empty capture groups of `pattern` matched at the start
/// of `text`
///
/// Spans are inclusive byte ranges `(start, end)`. Returns an empty list when
/// the pattern does not match.
pub fn extract_captures(pattern: &str, text: &str) -> Result<Vec<(usize, usize)>, regex::Error> {
    let re = Regex::new(&format!("^(?:{pattern})"))?;
    let Some(caps) = re.captures(text) else {
        return Ok(Vec::new());
    };
    Ok(caps
        .iter()
        .skip(1)
        .flatten()
        .filter(|m| !m.is_empty())
        .map(|m| (m.start(), m.end() - 1))
        .collect())
}

/// Escape a file path for insertion into the command line
#[cfg(not(windows))]
pub fn escape_file(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if FILE_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a file path for insertion into the command line
///
/// Backslash is the path separator here, so paths with spaces are quoted
/// instead.
#[cfg(windows)]
pub fn escape_file(path: &str) -> String {
    if path.contains(' ') {
        format!("\"{path}\"")
    } else {
        path.to_string()
    }
}

/// Escape regex metacharacters so a pattern reads literally in the menu
pub fn escape_pattern_display(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if PATTERN_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Step removing duplicates from a list of strings
pub fn uniq() -> StepFn {
    step(|_: &mut RunContext, input: Value| {
        let items = input.expect_strings("uniq")?;
        Ok(Flow::value(uniq_strings(items)))
    })
}

/// Step sorting a list of strings
pub fn sort() -> StepFn {
    step(|_: &mut RunContext, input: Value| {
        let mut items = input.expect_strings("sort")?;
        items.sort();
        Ok(Flow::value(items))
    })
}

/// Step keeping the strings that start with `prefix(ctx)`
pub fn prefix_filter<F>(prefix: F) -> StepFn
where
    F: Fn(&RunContext) -> String + Send + Sync + 'static,
{
    step(move |ctx: &mut RunContext, input: Value| {
        let prefix = prefix(ctx);
        let items = input.expect_strings("prefix_filter")?;
        Ok(Flow::value(
            items
                .into_iter()
                .filter(|s| s.starts_with(&prefix))
                .collect::<Vec<_>>(),
        ))
    })
}

/// Step filtering `[pattern, [candidates...]]` with [`filter_strings`]
///
/// The pair is what `map` produces from a pattern sub-pipeline and a
/// candidate sub-pipeline.
pub fn filter(basename_only: bool) -> StepFn {
    step(move |_: &mut RunContext, input: Value| {
        let kind = input.kind();
        let Value::List(mut pair) = input else {
            return Err(StepFault::step(format!(
                "filter: expected [pattern, candidates], got {kind}"
            )));
        };
        if pair.len() != 2 {
            return Err(StepFault::step(format!(
                "filter: expected 2 elements, got {}",
                pair.len()
            )));
        }
        let items = pair.pop().unwrap_or_default().expect_strings("filter")?;
        let pattern = match pair.pop() {
            Some(Value::Str(p)) => p,
            other => {
                return Err(StepFault::step(format!(
                    "filter: pattern must be a string, got {}",
                    other.unwrap_or_default().kind()
                )));
            }
        };
        Ok(Flow::value(filter_strings(&pattern, items, basename_only)?))
    })
}

/// Step searching the lines `lines()` returns for the pattern it receives as
/// input
pub fn search<L>(lines: L, max_candidates: usize) -> StepFn
where
    L: Fn() -> Vec<String> + Send + Sync + 'static,
{
    step(move |_: &mut RunContext, input: Value| {
        let pattern = input
            .as_str()
            .ok_or_else(|| StepFault::step(format!("search: expected a pattern, got {}", input.kind())))?;
        Ok(Flow::value(search_lines(pattern, &lines(), max_candidates)?))
    })
}
