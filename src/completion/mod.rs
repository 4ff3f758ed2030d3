//! Completion candidates, sources and the pipelines built from them
//!
//! This module provides the pieces a host plugs into the
//! [`pipeline`](crate::pipeline) engine:
//!
//! - **Candidates**: [`Candidate`] records and the [`Replacer`]s that splice
//!   them into the line
//! - **Steps**: uniq, sort, filter, buffer search, capture extraction and
//!   escaping
//! - **Sources**: the host's [`CompletionSource`] and file listing via
//!   [`FsSource`]
//! - **Jobs**: background producers on the tokio blocking pool
//! - **Assembly**: the ready-made pipelines, [`default_pipeline`] among them
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wildline::completion::{
//!     FsSource, PipelineOptions, StaticSource, complete_blocking, default_pipeline,
//! };
//! use wildline::pipeline::Engine;
//!
//! let opts = PipelineOptions::new(Arc::new(StaticSource::new()), FsSource::new("."));
//! let mut engine = Engine::new().with_default(move || default_pipeline(&opts));
//! let found = complete_blocking(&mut engine, ":e src/", Duration::from_millis(200)).unwrap();
//! for candidate in found {
//!     println!("{}", candidate.draw);
//! }
//! ```

mod assembly;
mod candidate;
mod collect;
pub mod jobs;
mod source;
pub mod steps;


pub use assembly::{
    PipelineOptions, cmdline_pipeline, default_pipeline, search_pipeline, substitute_pipeline,
};
pub use candidate::{Candidate, Replacer, annotate, file_candidates, substitute_candidates};
pub use collect::{complete_blocking, into_candidates};
pub use jobs::{JobRunner, background};
pub use source::{CompletionSource, FsSource, StaticSource};
