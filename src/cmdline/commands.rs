//! Command classification
//!
//! Answers questions about a command name: whether the user defined it,
//! whether its arguments are a delimited pattern, and what kind of argument it
//! takes.

/// Built-in commands with the shortest accepted abbreviation length
const COMMANDS: &[(&str, usize)] = &[
    ("append", 1),
    ("badd", 3),
    ("bdelete", 2),
    ("buffer", 1),
    ("call", 3),
    ("cd", 2),
    ("change", 1),
    ("chdir", 3),
    ("colorscheme", 4),
    ("copy", 2),
    ("delete", 1),
    ("diffsplit", 5),
    ("echo", 2),
    ("edit", 1),
    ("enew", 3),
    ("execute", 3),
    ("file", 1),
    ("find", 3),
    ("global", 1),
    ("help", 1),
    ("insert", 1),
    ("join", 1),
    ("lcd", 2),
    ("let", 3),
    ("list", 1),
    ("lua", 3),
    ("move", 1),
    ("new", 3),
    ("next", 1),
    ("normal", 4),
    ("print", 1),
    ("quit", 1),
    ("read", 1),
    ("runtime", 2),
    ("saveas", 3),
    ("set", 2),
    ("sfind", 2),
    ("smagic", 2),
    ("snomagic", 3),
    ("source", 2),
    ("split", 2),
    ("substitute", 1),
    ("tabedit", 4),
    ("tabfind", 4),
    ("tabnew", 6),
    ("tcd", 3),
    ("undo", 1),
    ("vglobal", 1),
    ("vnew", 3),
    ("vsplit", 2),
    ("wq", 2),
    ("write", 1),
    ("xit", 1),
    ("yank", 1),
];

/// Commands whose arguments are `<delim>pattern<delim>replacement`
const SUBSTITUTE_COMMANDS: &[&str] = &["substitute", "smagic", "snomagic", "global", "vglobal", "&"];

/// Commands made of a single punctuation character
pub(crate) const SINGLE_CHAR_COMMANDS: &[char] = &['&', '!', '<', '>', '=', '@', '~', '#', '*'];

/// Kind of argument a command takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Any file path
    File,
    /// Directory paths only
    Dir,
    /// A program on the executable path, or a path to one
    ShellCmd,
    /// A file looked up in the configured search path
    FileInPath,
    /// A user name
    User,
    /// Nothing the core knows how to complete
    Other,
}

/// Knowledge about built-in commands the completion pipelines consume
pub trait CommandCatalog: Send + Sync {
    /// Argument kind of the (expanded) command `name`
    fn arg_kind(&self, name: &str) -> ArgKind;

    /// Full names of all known commands
    fn command_names(&self) -> Vec<String>;

    /// Whether the arguments of `name` are completed from the file system
    fn has_file_args(&self, name: &str) -> bool {
        !matches!(self.arg_kind(name), ArgKind::Other)
    }
}

/// Catalog of the editor's common built-in commands
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl CommandCatalog for BuiltinCatalog {
    fn arg_kind(&self, name: &str) -> ArgKind {
        match name {
            "cd" | "lcd" | "tcd" | "chdir" => ArgKind::Dir,
            "edit" | "split" | "vsplit" | "new" | "vnew" | "read" | "write" | "wq" | "xit"
            | "saveas" | "source" | "tabedit" | "tabnew" | "badd" | "file" | "diffsplit"
            | "runtime" => ArgKind::File,
            "find" | "sfind" | "tabfind" => ArgKind::FileInPath,
            "!" => ArgKind::ShellCmd,
            _ => ArgKind::Other,
        }
    }

    fn command_names(&self) -> Vec<String> {
        COMMANDS.iter().map(|(name, _)| name.to_string()).collect()
    }
}

/// A command is user-defined when its name starts with an uppercase letter
pub fn is_user_command(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Whether `name` takes a delimited pattern/replacement argument
pub fn is_substitute_command(name: &str) -> bool {
    SUBSTITUTE_COMMANDS.contains(&name)
}

/// Expand an abbreviated built-in command to its full name
///
/// User commands, punctuation commands and unknown names come back unchanged.
pub fn expand_command(raw: &str) -> String {
    if raw.is_empty() || is_user_command(raw) || !raw.chars().all(|c| c.is_ascii_lowercase()) {
        return raw.to_string();
    }
    COMMANDS
        .iter()
        .find(|(full, min)| raw.len() >= *min && full.starts_with(raw))
        .map(|(full, _)| full.to_string())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_user_command() {
        assert!(is_user_command("MyCmd"));
        assert!(!is_user_command("echo"));
        assert!(!is_user_command(""));
        assert!(!is_user_command("&"));
    }

    #[test]
    fn test_is_substitute_command() {
        assert!(is_substitute_command("substitute"));
        assert!(is_substitute_command("&"));
        assert!(is_substitute_command("vglobal"));
        assert!(!is_substitute_command("echo"));
        assert!(!is_substitute_command("s"));
    }

    #[test]
    fn test_expand_command() {
        assert_eq!(expand_command("s"), "substitute");
        assert_eq!(expand_command("e"), "edit");
        assert_eq!(expand_command("g"), "global");
        assert_eq!(expand_command("v"), "vglobal");
        assert_eq!(expand_command("sm"), "smagic");
        assert_eq!(expand_command("sno"), "snomagic");
        assert_eq!(expand_command("vs"), "vsplit");
        assert_eq!(expand_command("fi"), "file");
        assert_eq!(expand_command("fin"), "find");
        assert_eq!(expand_command("sf"), "sfind");
        assert_eq!(expand_command("tabf"), "tabfind");
        assert_eq!(expand_command("sp"), "split");
        assert_eq!(expand_command("edit"), "edit");
    }

    #[test]
    fn test_expand_command_leaves_unknown() {
        assert_eq!(expand_command("sn"), "sn");
        assert_eq!(expand_command("zzz"), "zzz");
        assert_eq!(expand_command("MyCmd"), "MyCmd");
        assert_eq!(expand_command("&"), "&");
        assert_eq!(expand_command(""), "");
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = BuiltinCatalog;
        assert!(catalog.has_file_args("edit"));
        assert!(catalog.has_file_args("cd"));
        assert_eq!(catalog.arg_kind("lcd"), ArgKind::Dir);
        assert!(!catalog.has_file_args("substitute"));
        assert_eq!(catalog.arg_kind("!"), ArgKind::ShellCmd);
        assert_eq!(catalog.arg_kind("find"), ArgKind::FileInPath);
        assert!(catalog.has_file_args("tabfind"));
        assert!(catalog.command_names().contains(&"vsplit".to_string()));
    }
}
