//! Producers of raw completion strings
//!
//! [`CompletionSource`] is what the host editor provides: its user commands,
//! its own completion for command arguments, and the lines of the current
//! buffer. [`FsSource`] lists files and directories.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use glob::{MatchOptions, Pattern, PatternError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cmdline::{ArgKind, ParseResult};

/// Completion data owned by the host editor
pub trait CompletionSource: Send + Sync {
    /// Names of user-defined commands
    fn user_commands(&self) -> Vec<String>;

    /// The editor's own completions for the argument of `parsed`
    fn arguments(&self, parsed: &ParseResult) -> Vec<String>;

    /// Lines of the buffer searched by pattern completion
    fn buffer_lines(&self) -> Vec<String>;
}

/// Source backed by fixed tables
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    user_commands: Vec<String>,
    arguments: HashMap<String, Vec<String>>,
    lines: Vec<String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small set of option names and color schemes, enough for the
    /// interactive shell to be useful without an editor behind it
    pub fn with_editor_defaults() -> Self {
        let options = [
            "autoindent", "background", "expandtab", "fileformat", "hidden", "hlsearch",
            "ignorecase", "incsearch", "list", "number", "relativenumber", "shiftwidth",
            "smartcase", "spell", "tabstop", "textwidth", "wildmenu", "wrap",
        ];
        let schemes = ["blue", "darkblue", "default", "desert", "elflord", "evening", "habamax",
            "industry", "koehler", "morning", "murphy", "pablo", "peachpuff", "quiet", "ron",
            "shine", "slate", "torte", "zellner"];

        Self::new()
            .with_arguments("set", options.iter().map(|s| s.to_string()).collect())
            .with_arguments("colorscheme", schemes.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_user_commands(mut self, names: Vec<String>) -> Self {
        self.user_commands = names;
        self
    }

    /// Completions offered for every argument of `command` (full name)
    pub fn with_arguments(mut self, command: &str, values: Vec<String>) -> Self {
        self.arguments.insert(command.to_string(), values);
        self
    }

    pub fn with_lines(mut self, lines: Vec<String>) -> Self {
        self.lines = lines;
        self
    }
}

impl CompletionSource for StaticSource {
    fn user_commands(&self) -> Vec<String> {
        self.user_commands.clone()
    }

    fn arguments(&self, parsed: &ParseResult) -> Vec<String> {
        self.arguments
            .get(&parsed.command_name)
            .cloned()
            .unwrap_or_default()
    }

    fn buffer_lines(&self) -> Vec<String> {
        self.lines.clone()
    }
}

/// Characters that make a typed path a wildcard pattern
const WILDCARDS: &[char] = &['*', '?', '['];

/// Default user database read for `~user` completion
const PASSWD: &str = "/etc/passwd";

/// Whether `arg` should be expanded as a glob pattern
pub fn has_wildcard(arg: &str) -> bool {
    arg.contains(WILDCARDS)
}

/// Lists file system entries for a partially typed path
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
    show_hidden: bool,
    ignore: Vec<Pattern>,
    /// Directories searched by `ArgKind::FileInPath` arguments
    search_path: Vec<PathBuf>,
    /// Directories searched for executables; `$PATH` when unset
    exec_path: Option<Vec<PathBuf>>,
    user_db: PathBuf,
}

impl FsSource {
    /// List relative paths against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            show_hidden: false,
            ignore: Vec::new(),
            search_path: vec![PathBuf::new()],
            exec_path: None,
            user_db: PathBuf::from(PASSWD),
        }
    }

    /// List relative paths against the process working directory
    pub fn current_dir() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Always include dot-files
    pub fn with_show_hidden(mut self, show: bool) -> Self {
        self.show_hidden = show;
        self
    }

    /// Skip entries whose name matches one of the glob `patterns`
    pub fn with_ignore(mut self, patterns: &[String]) -> Result<Self, PatternError> {
        self.ignore = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self)
    }

    /// Directories `ArgKind::FileInPath` arguments are looked up in
    ///
    /// Relative entries are taken against the root; an empty entry is the
    /// root itself.
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = dirs;
        self
    }

    /// Directories searched for shell commands instead of `$PATH`
    pub fn with_exec_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.exec_path = Some(dirs);
        self
    }

    /// Read user names from `path` (passwd format) instead of `/etc/passwd`
    pub fn with_user_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_db = path.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Complete the typed path `arg`
    ///
    /// Lists the entries of `arg`'s directory whose name starts with the final
    /// component, sorted, each prefixed with the directory part of `arg` as
    /// typed. Directories get a trailing separator. `.` and `..` also offer
    /// the parent (and current) directory. A missing directory yields no
    /// entries. When `cancel` fires, listing stops and returns what it has.
    ///
    /// Arguments containing `*`, `?` or `[` are expanded as glob patterns
    /// (`**` descends into subdirectories). `~name` completes user home
    /// directories. `kind` selects where to look: shell commands come from
    /// the executable path and `FileInPath` arguments from the search path.
    pub fn list(
        &self,
        arg: &str,
        kind: ArgKind,
        cancel: Option<&CancellationToken>,
    ) -> io::Result<Vec<String>> {
        if kind == ArgKind::User {
            return Ok(self.list_users(arg.strip_prefix('~').unwrap_or(arg)));
        }
        if let Some(name) = arg.strip_prefix('~') {
            if !name.contains(std::path::is_separator) {
                return Ok(self
                    .list_users(name)
                    .into_iter()
                    .map(|user| format!("~{user}{MAIN_SEPARATOR}"))
                    .collect());
            }
        }

        let bare = !arg.contains(std::path::is_separator);
        match kind {
            ArgKind::ShellCmd if bare => return Ok(self.list_commands(arg, cancel)),
            ArgKind::FileInPath if !is_anchored(arg) => return Ok(self.list_in_path(arg, cancel)),
            _ => {}
        }

        if has_wildcard(arg) {
            let (base, prefix, rest) = self.wildcard_base(arg);
            return Ok(self.expand_wildcard(&base, prefix, rest, kind, cancel));
        }

        let (head, tail) = split_path(arg);
        let dir = self.resolve(head);
        let names = self.scan(&dir, tail, kind, cancel)?;
        Ok(finish_listing(arg, head, names))
    }

    /// User names starting with `prefix`, sorted
    ///
    /// An unreadable user database yields no names.
    pub fn list_users(&self, prefix: &str) -> Vec<String> {
        match fs::read_to_string(&self.user_db) {
            Ok(text) => users_from_passwd(&text, prefix),
            Err(e) => {
                debug!(path = %self.user_db.display(), "cannot read user database: {}", e);
                Vec::new()
            }
        }
    }

    /// Executables on the executable path whose name starts with `prefix`
    fn list_commands(&self, prefix: &str, cancel: Option<&CancellationToken>) -> Vec<String> {
        let dirs = match &self.exec_path {
            Some(dirs) => dirs.clone(),
            None => std::env::var_os("PATH")
                .map(|path| std::env::split_paths(&path).collect())
                .unwrap_or_default(),
        };

        let mut names = Vec::new();
        for dir in dirs.iter().filter(|d| !d.as_os_str().is_empty()) {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                break;
            }
            // one unreadable entry does not spoil the rest of the path
            match self.scan(dir, prefix, ArgKind::ShellCmd, cancel) {
                Ok(found) => names.extend(found.into_iter().filter(|n| !n.ends_with(MAIN_SEPARATOR))),
                Err(e) => debug!(dir = %dir.display(), "skipping path entry: {}", e),
            }
        }
        names.sort();
        names.dedup();
        trace!(prefix, found = names.len(), "listed commands");
        names
    }

    /// `arg` looked up in every directory of the search path
    fn list_in_path(&self, arg: &str, cancel: Option<&CancellationToken>) -> Vec<String> {
        let (head, tail) = split_path(arg);
        let mut names = Vec::new();
        for dir in &self.search_path {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                break;
            }
            let base = self.resolve(&dir.to_string_lossy());
            if has_wildcard(arg) {
                names.extend(self.expand_wildcard(&base, "", arg, ArgKind::File, cancel));
            } else {
                match self.scan(&base.join(head), tail, ArgKind::File, cancel) {
                    Ok(found) => names.extend(found),
                    Err(e) => debug!(dir = %base.display(), "skipping search path entry: {}", e),
                }
            }
        }
        if has_wildcard(arg) {
            names.sort();
            names.dedup();
            return names;
        }
        let mut listed = finish_listing(arg, head, names);
        listed.dedup();
        listed
    }

    /// Entries of `dir` whose name starts with `tail`, unsorted
    fn scan(
        &self,
        dir: &Path,
        tail: &str,
        kind: ArgKind,
        cancel: Option<&CancellationToken>,
    ) -> io::Result<Vec<String>> {
        let show_hidden = self.show_hidden || tail.starts_with('.');

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(dir = %dir.display(), "no such directory");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                debug!("file listing cancelled");
                break;
            }
            let Ok(entry) = entry else { continue };
            let name = entry.file_name().to_string_lossy().into_owned();

            if name.starts_with('.') && !show_hidden {
                continue;
            }
            if !name.starts_with(tail) || self.is_ignored(&name) {
                continue;
            }
            // follows symlinks
            let path = entry.path();
            let is_dir = path.is_dir();
            match kind {
                ArgKind::Dir if !is_dir => continue,
                ArgKind::ShellCmd if !is_dir && !is_executable(&path) => continue,
                _ => {}
            }
            names.push(if is_dir {
                format!("{name}{MAIN_SEPARATOR}")
            } else {
                name
            });
        }
        Ok(names)
    }

    /// Split a wildcard argument into the directory it is relative to, the
    /// prefix shown in front of matches and the pattern itself
    fn wildcard_base<'a>(&self, arg: &'a str) -> (PathBuf, &'a str, &'a str) {
        if Path::new(arg).is_absolute() {
            return (PathBuf::new(), "", arg);
        }
        if let Some(rest) = arg.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return (home, "~/", rest);
            }
        }
        (self.root.clone(), "", arg)
    }

    /// Paths under `base` matching the glob `pattern`, sorted
    fn expand_wildcard(
        &self,
        base: &Path,
        prefix: &str,
        pattern: &str,
        kind: ArgKind,
        cancel: Option<&CancellationToken>,
    ) -> Vec<String> {
        let (fixed, tail) = split_path(pattern);
        let show_hidden = self.show_hidden || tail.starts_with('.');
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: !show_hidden,
        };

        let full = if base.as_os_str().is_empty() {
            pattern.to_string()
        } else {
            format!("{}{MAIN_SEPARATOR}{pattern}", Pattern::escape(&base.to_string_lossy()))
        };
        let paths = match glob::glob_with(&full, options) {
            Ok(paths) => paths,
            Err(e) => {
                debug!(pattern = %full, "invalid wildcard: {}", e);
                return Vec::new();
            }
        };
        // the directory a `dir/**` pattern starts from is not a match
        let own_dir = Path::new(fixed.trim_end_matches(std::path::is_separator));

        let mut found = Vec::new();
        for path in paths.flatten() {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                debug!("wildcard expansion cancelled");
                break;
            }
            let relative = path.strip_prefix(base).unwrap_or(&path);
            if relative.as_os_str().is_empty() || relative == own_dir {
                continue;
            }
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if (name.starts_with('.') && !show_hidden) || self.is_ignored(&name) {
                continue;
            }
            let is_dir = path.is_dir();
            match kind {
                ArgKind::Dir if !is_dir => continue,
                ArgKind::ShellCmd if !is_dir && !is_executable(&path) => continue,
                _ => {}
            }
            let shown = format!("{prefix}{}", relative.display());
            found.push(if is_dir {
                format!("{shown}{MAIN_SEPARATOR}")
            } else {
                shown
            });
        }
        found.sort();
        trace!(pattern, found = found.len(), "expanded wildcard");
        found
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|p| p.matches(name))
    }

    /// Directory to read for the typed directory part `head`
    fn resolve(&self, head: &str) -> PathBuf {
        if head.is_empty() {
            return self.root.clone();
        }
        if let Some(rest) = head.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        // an absolute head replaces the root
        self.root.join(head)
    }
}

/// Sort `names`, prefix them with the typed `head` and add `./` and `../`
/// for `.` and `..`
fn finish_listing(arg: &str, head: &str, mut names: Vec<String>) -> Vec<String> {
    names.sort();
    let mut paths = names
        .into_iter()
        .map(|name| format!("{head}{name}"))
        .collect::<Vec<_>>();

    match arg {
        "." => {
            paths.insert(0, "../".to_string());
            paths.insert(0, "./".to_string());
        }
        ".." => paths.insert(0, "../".to_string()),
        _ => {}
    }
    paths
}

/// Paths that name their directory explicitly bypass the search path
fn is_anchored(arg: &str) -> bool {
    Path::new(arg).is_absolute()
        || arg.starts_with('~')
        || arg == "."
        || arg == ".."
        || arg.starts_with("./")
        || arg.starts_with("../")
}

/// Names from passwd-format `text` starting with `prefix`, sorted
fn users_from_passwd(text: &str, prefix: &str) -> Vec<String> {
    let mut names = text
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split(':').next())
        .filter(|name| !name.is_empty() && name.starts_with(prefix))
        .map(str::to_string)
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    names
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Split a typed path after its last separator: `src/ma` -> (`src/`, `ma`)
fn split_path(arg: &str) -> (&str, &str) {
    match arg.rfind(std::path::is_separator) {
        Some(i) => arg.split_at(i + 1),
        None => ("", arg),
    }
}
