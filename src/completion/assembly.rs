//! Ready-made completion pipelines
//!
//! Each function returns a step list for [`Engine::set_pipeline`]. The runs
//! start from the raw command line as a `Value::Str`.
//!
//! - [`cmdline_pipeline`]: command names, user commands, file arguments and
//!   the editor's own argument completion
//! - [`substitute_pipeline`]: the pattern of `:s/pat`, `:g/pat` and friends
//! - [`search_pipeline`]: `/pat` and `?pat` lines against the buffer
//! - [`default_pipeline`]: all of the above
//!
//! [`Engine::set_pipeline`]: crate::pipeline::Engine::set_pipeline

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use glob::PatternError;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::candidate::{Candidate, Replacer, annotate, file_candidates, substitute_candidates};
use super::jobs::JobRunner;
use super::source::{CompletionSource, FsSource, has_wildcard};
use super::steps::{self, filter_strings, fuzzy_pattern, rank_fuzzy, search_lines_until, uniq};
use crate::cmdline::{
    ArgKind, BuiltinCatalog, CmdlineParser, CommandCatalog, ParseResult, is_substitute_command,
    is_user_command, split_substitute,
};
use crate::config::CompletionConfig;
use crate::error::StepFault;
use crate::pipeline::{Flow, RunContext, StepFn, StepSpec, Value, branch, check, map, step};

/// Everything the assembled pipelines draw on
#[derive(Clone)]
pub struct PipelineOptions {
    pub catalog: Arc<dyn CommandCatalog>,
    pub source: Arc<dyn CompletionSource>,
    pub files: FsSource,
    /// Match as case-insensitive subsequences instead of prefixes
    pub fuzzy: bool,
    /// Cap on buffer search matches (0 = unlimited)
    pub max_candidates: usize,
    /// When set, file listing and buffer search run in the background
    pub jobs: Option<Arc<JobRunner>>,
    parser: Arc<Mutex<CmdlineParser>>,
}

impl PipelineOptions {
    pub fn new(source: Arc<dyn CompletionSource>, files: FsSource) -> Self {
        Self {
            catalog: Arc::new(BuiltinCatalog),
            source,
            files,
            fuzzy: false,
            max_candidates: 0,
            jobs: None,
            parser: Arc::new(Mutex::new(CmdlineParser::new())),
        }
    }

    /// Options as configured by the `[completion]` section
    pub fn from_config(
        config: &CompletionConfig,
        source: Arc<dyn CompletionSource>,
        files: FsSource,
    ) -> Result<Self, PatternError> {
        let files = files
            .with_show_hidden(config.show_hidden)
            .with_ignore(&config.ignore)?
            .with_search_path(config.path.iter().map(PathBuf::from).collect());
        Ok(Self::new(source, files)
            .with_fuzzy(config.fuzzy_filter)
            .with_max_candidates(config.max_candidates))
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CommandCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn with_jobs(mut self, jobs: Arc<JobRunner>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Keep the items matching what the user typed
    fn matching(&self, query: &str, items: Vec<String>) -> Result<Vec<String>, StepFault> {
        if self.fuzzy && !query.is_empty() {
            return Ok(filter_strings(&fuzzy_pattern(query), items, false)?);
        }
        Ok(items.into_iter().filter(|s| s.starts_with(query)).collect())
    }

    /// Best fuzzy matches first; unchanged without fuzzy matching
    fn ranked(&self, query: &str, items: Vec<String>) -> Vec<String> {
        if self.fuzzy {
            rank_fuzzy(query, items, false)
        } else {
            items
        }
    }
}

/// Lines typed at a search prompt start with `/` or `?`
fn is_search_line(line: &str) -> bool {
    line.starts_with(['/', '?'])
}

fn parsed_input<'a>(input: &'a Value, name: &str) -> Result<&'a ParseResult, StepFault> {
    input
        .as_parsed()
        .ok_or_else(|| StepFault::step(format!("{name}: expected a parsed line, got {}", input.kind())))
}

/// Gate on a command line (as opposed to a search line)
fn cmdline_mode() -> StepFn {
    check(|_, v| v.as_str().is_some_and(|line| !is_search_line(line)))
}

/// Tokenize the line through the shared, caching parser
fn parse(opts: &PipelineOptions) -> StepFn {
    let parser = Arc::clone(&opts.parser);
    step(move |_: &mut RunContext, input: Value| {
        let line = input
            .as_str()
            .ok_or_else(|| StepFault::step(format!("parse: expected a line, got {}", input.kind())))?;
        let mut parser = parser.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Flow::value(parser.parse(line)))
    })
}

fn user_command_names(opts: &PipelineOptions) -> Vec<StepSpec> {
    let opts = opts.clone();
    vec![
        check(|_, v| {
            v.as_parsed()
                .is_some_and(|p| p.in_command_name() && is_user_command(&p.command_name))
        })
        .into(),
        step(move |_: &mut RunContext, input: Value| {
            let parsed = parsed_input(&input, "user_commands")?;
            let mut names = opts.matching(&parsed.command_name, opts.source.user_commands())?;
            names.sort();
            Ok(Flow::value(opts.ranked(&parsed.command_name, names)))
        })
        .into(),
        annotate(Replacer::command_name()).into(),
    ]
}

fn command_names(opts: &PipelineOptions) -> Vec<StepSpec> {
    let opts = opts.clone();
    vec![
        check(|_, v| v.as_parsed().is_some_and(ParseResult::in_command_name)).into(),
        step(move |_: &mut RunContext, input: Value| {
            let parsed = parsed_input(&input, "command_names")?;
            // the abbreviation as typed, not its expansion
            let typed = parsed.line.get(parsed.command_start..).unwrap_or("");
            let mut names = opts.matching(typed, opts.catalog.command_names())?;
            names.sort();
            Ok(Flow::value(opts.ranked(typed, names)))
        })
        .into(),
        annotate(Replacer::command_name()).into(),
    ]
}

/// Pass file-argument lines through untouched for [`resolve_files`]
///
/// A shell command is completed only while its first word is typed.
fn file_arguments(opts: &PipelineOptions) -> Vec<StepSpec> {
    let catalog = Arc::clone(&opts.catalog);
    vec![
        check(move |_, v| {
            v.as_parsed().is_some_and(|p| {
                !p.command_name.is_empty()
                    && catalog.has_file_args(&p.command_name)
                    && !(catalog.arg_kind(&p.command_name) == ArgKind::ShellCmd
                        && p.arg().contains(char::is_whitespace))
            })
        })
        .into(),
    ]
}

fn editor_arguments(opts: &PipelineOptions) -> Vec<StepSpec> {
    let opts = opts.clone();
    vec![
        step(move |_: &mut RunContext, input: Value| {
            let parsed = parsed_input(&input, "arguments")?;
            let values = opts.matching(parsed.arg(), opts.source.arguments(parsed))?;
            Ok(Flow::value(values))
        })
        .into(),
        annotate(Replacer::cmdline()).into(),
    ]
}

fn cmdline_alternatives(opts: &PipelineOptions) -> Vec<StepSpec> {
    vec![
        cmdline_mode().into(),
        parse(opts).into(),
        branch(vec![
            user_command_names(opts),
            command_names(opts),
            file_arguments(opts),
            editor_arguments(opts),
        ])
        .into(),
    ]
}

/// List files for a parsed line, honoring fuzzy matching
fn list_files(
    opts: &PipelineOptions,
    parsed: &ParseResult,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<Candidate>, StepFault> {
    let kind = match opts.catalog.arg_kind(&parsed.command_name) {
        ArgKind::Other => ArgKind::File,
        kind => kind,
    };
    let arg = parsed.arg();
    // wildcards and user names are matched by the listing itself
    let fuzzy = opts.fuzzy && kind != ArgKind::User && !arg.starts_with('~') && !has_wildcard(arg);

    let paths = if fuzzy {
        let split = arg.rfind(std::path::is_separator).map_or(0, |i| i + 1);
        let (head, tail) = arg.split_at(split);
        let listed = opts.files.list(head, kind, cancel)?;
        if tail.is_empty() {
            listed
        } else {
            let matched = filter_strings(&fuzzy_pattern(tail), listed, true)?;
            rank_fuzzy(tail, matched, true)
        }
    } else {
        opts.files.list(arg, kind, cancel)?
    };
    trace!(arg, found = paths.len(), "listed files");
    Ok(file_candidates(paths))
}

/// Turn a parsed file-argument line into file candidates
///
/// Any other value passes through. With a job runner the listing happens in
/// the background, which requires this step to sit at the top level.
fn resolve_files(opts: &PipelineOptions) -> StepFn {
    let opts = opts.clone();
    step(move |ctx: &mut RunContext, input: Value| {
        let parsed = match input {
            Value::Parsed(parsed) => parsed,
            other => return Ok(Flow::Continue(other)),
        };
        match &opts.jobs {
            Some(jobs) if !ctx.is_nested() => {
                let deferred = ctx.defer()?;
                let opts = opts.clone();
                jobs.submit(
                    deferred,
                    Box::new(move |cancel: &CancellationToken| {
                        Ok(Value::from(list_files(&opts, &parsed, Some(cancel))?))
                    }),
                );
                Ok(Flow::Skip)
            }
            _ => Ok(Flow::value(list_files(&opts, &parsed, None)?)),
        }
    })
}

/// Command-line completion
///
/// Tries, in order: user command names, built-in command names, file
/// arguments, then the editor's own completion for the argument.
pub fn cmdline_pipeline(opts: &PipelineOptions) -> Vec<StepSpec> {
    let mut steps = cmdline_alternatives(opts);
    steps.push(resolve_files(opts).into());
    steps
}

/// Element `index` of a list
fn nth(index: usize) -> StepFn {
    step(move |_: &mut RunContext, input: Value| match input {
        Value::List(mut items) if index < items.len() => Ok(Flow::Continue(items.swap_remove(index))),
        other => Err(StepFault::step(format!(
            "nth: no element {index} in {}",
            other.kind()
        ))),
    })
}

/// Completion of the pattern in substitute-style commands
///
/// `nested` receives the pattern typed so far and must produce a list of
/// strings. Candidates show the results with regex metacharacters escaped
/// and insert them unescaped after the delimiter.
pub fn substitute_pipeline(opts: &PipelineOptions, nested: Vec<StepSpec>) -> Vec<StepSpec> {
    let mut pattern = vec![nth(1).into()];
    pattern.extend(nested);

    vec![
        cmdline_mode().into(),
        parse(opts).into(),
        check(|_, v| {
            v.as_parsed()
                .is_some_and(|p| p.command_name != "&" && is_substitute_command(&p.command_name))
        })
        .into(),
        step(|_: &mut RunContext, input: Value| {
            let parsed = parsed_input(&input, "substitute")?;
            Ok(match split_substitute(parsed.arg()) {
                Some((delim, pattern)) => Flow::value(vec![delim, pattern]),
                None => Flow::Done(false),
            })
        })
        .into(),
        map(vec![vec![nth(0).into()], pattern]).into(),
        step(|_: &mut RunContext, input: Value| {
            let mut pair = input
                .as_list()
                .map(<[Value]>::to_vec)
                .ok_or_else(|| StepFault::step(format!("substitute: expected a list, got {}", input.kind())))?;
            let results = pair.pop().unwrap_or_default();
            // the pattern pipeline declined
            if results.is_false() {
                return Ok(Flow::Done(false));
            }
            let results = results.expect_strings("substitute")?;
            let delim = pair.pop().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
            Ok(Flow::value(substitute_candidates(&delim, results)))
        })
        .into(),
    ]
}

/// Words in the buffer that start with `pattern`
fn buffer_words(opts: &PipelineOptions) -> Vec<StepSpec> {
    let source = Arc::clone(&opts.source);
    let max = opts.max_candidates;
    vec![
        step(|_: &mut RunContext, input: Value| {
            let pattern = input.as_str().unwrap_or_default();
            Ok(Flow::value(if pattern.is_empty() {
                String::new()
            } else {
                format!("{pattern}\\w*")
            }))
        })
        .into(),
        steps::search(move || source.buffer_lines(), max).into(),
        uniq().into(),
    ]
}

/// Buffer words completing the pattern of a search line
fn search_candidates(
    opts: &PipelineOptions,
    line: &str,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<Candidate>, StepFault> {
    let pattern = line.get(1..).unwrap_or_default();
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let lines = opts.source.buffer_lines();
    let found = search_lines_until(&format!("{pattern}\\w*"), &lines, opts.max_candidates, cancel)?;
    trace!(pattern, found = found.len(), "searched buffer");

    // keep the search character
    let replace = Replacer::new(|line, output| format!("{}{}", line.get(..1).unwrap_or_default(), output));
    Ok(found
        .into_iter()
        .map(|word| Candidate::new(word, replace.clone()))
        .collect())
}

/// Turn a search line into buffer candidates
///
/// Any other value passes through. With a job runner the scan happens in the
/// background, which requires this step to sit at the top level.
fn resolve_search(opts: &PipelineOptions) -> StepFn {
    let opts = opts.clone();
    step(move |ctx: &mut RunContext, input: Value| {
        let line = match input.as_str() {
            Some(line) if is_search_line(line) => line.to_string(),
            _ => return Ok(Flow::Continue(input)),
        };
        match &opts.jobs {
            Some(jobs) if !ctx.is_nested() => {
                let deferred = ctx.defer()?;
                let opts = opts.clone();
                jobs.submit(
                    deferred,
                    Box::new(move |cancel: &CancellationToken| {
                        Ok(Value::from(search_candidates(&opts, &line, Some(cancel))?))
                    }),
                );
                Ok(Flow::Skip)
            }
            _ => Ok(Flow::value(search_candidates(&opts, &line, None)?)),
        }
    })
}

fn search_mode() -> StepFn {
    check(|_, v| v.as_str().is_some_and(is_search_line))
}

/// Completion for `/pat` and `?pat` search lines against the buffer
pub fn search_pipeline(opts: &PipelineOptions) -> Vec<StepSpec> {
    vec![search_mode().into(), resolve_search(opts).into()]
}

/// Everything wildline completes out of the box
///
/// Substitute patterns first, then search lines, then command lines. File
/// listing and buffer search are resolved last so they can run in the
/// background.
pub fn default_pipeline(opts: &PipelineOptions) -> Vec<StepSpec> {
    vec![
        branch(vec![
            substitute_pipeline(opts, buffer_words(opts)),
            vec![search_mode().into()],
            cmdline_alternatives(opts),
        ])
        .into(),
        resolve_files(opts).into(),
        resolve_search(opts).into(),
    ]
}
