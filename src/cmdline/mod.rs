//! Command line parsing and classification
//!
//! The completion pipelines call into this module to find out what is being
//! completed:
//!
//! - **Scanner**: byte-offset cursor with the editor's notion of whitespace
//! - **Parser**: extracts the command name and argument offset, cached per line
//! - **Commands**: classification queries (user command, substitute-style,
//!   file arguments) and abbreviation expansion
//!
//! # Examples
//!
//! ```no_run
//! use wildline::cmdline::CmdlineParser;
//!
//! let mut parser = CmdlineParser::new();
//! let parsed = parser.parse(":e fo");
//! assert_eq!(parsed.arg_start, 3);
//! assert_eq!(parser.replace(":e fo", "foo.txt"), ":e foo.txt");
//! ```

mod commands;
mod parser;
mod scanner;

pub use commands::{
    ArgKind, BuiltinCatalog, CommandCatalog, expand_command, is_substitute_command,
    is_user_command,
};
pub use parser::{CmdlineParser, ParseResult, replace, split_substitute, tokenize};
pub use scanner::{Scanner, is_whitespace};
