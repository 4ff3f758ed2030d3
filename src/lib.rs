//! Command-line completion pipelines
//!
//! This library provides the engine and collaborators behind wildline's
//! interactive command line. It can be embedded to drive completion in any
//! line editor.
//!
//! # Modules
//!
//! - `pipeline`: Step registry, run contexts, combinators and the engine
//! - `cmdline`: Command-line tokenizer and command classification
//! - `completion`: Candidates, completion sources and ready-made pipelines
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `cli`: Command-line interface and argument parsing
//! - `repl`: Interactive line editor
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wildline::completion::{
//!     FsSource, PipelineOptions, StaticSource, complete_blocking, default_pipeline,
//! };
//! use wildline::pipeline::Engine;
//!
//! fn main() -> wildline::Result<()> {
//!     let source = StaticSource::with_editor_defaults();
//!     let opts = PipelineOptions::new(Arc::new(source), FsSource::current_dir()?);
//!     let mut engine = Engine::new().with_default(move || default_pipeline(&opts));
//!
//!     for candidate in complete_blocking(&mut engine, ":vs", Duration::from_millis(200))? {
//!         println!("{}", candidate.draw);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod cmdline;
pub mod completion;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod repl;

// Re-export commonly used types
pub use cmdline::{CmdlineParser, ParseResult};
pub use completion::{Candidate, PipelineOptions};
pub use config::Config;
pub use error::{Result, StepFault, WildError};
pub use pipeline::{Engine, Flow, RunContext, StepSpec, Value};
pub use repl::ReplEngine;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
