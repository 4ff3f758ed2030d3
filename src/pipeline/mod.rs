//! Asynchronous completion pipelines
//!
//! A pipeline is an ordered list of steps. Starting a run threads a
//! [`RunContext`] and a [`Value`] through the steps one at a time:
//!
//! - a step returning `Flow::Continue(v)` hands `v` to the next step
//! - `Flow::Skip` ends the run silently, no callback fires
//! - `Flow::Done(b)` ends the run with `Bool(b)` right away
//! - a step error ends the run through the error callback
//!
//! Steps backed by slow producers [`RunContext::defer`] the run and resolve it
//! later. Combinators ([`branch`], [`map`], [`check`]) build steps out of
//! nested pipelines.
//!
//! # Examples
//!
//! ```no_run
//! use wildline::pipeline::{Engine, Flow, RunContext, StepSpec, Value, step};
//!
//! let mut engine = Engine::new();
//! engine.set_pipeline(vec![StepSpec::Func(step(|_: &mut RunContext, v: Value| {
//!     Ok(Flow::Continue(v))
//! }))]);
//!
//! let ctx = RunContext::new(":e fo", 5, |_, v| println!("{v:?}"), |_, e| eprintln!("{e}"));
//! engine.start(ctx, Value::from(":e fo"));
//! ```

mod combinators;
mod context;
mod engine;
mod registry;
mod value;

#[cfg(test)]
mod tests;

pub use combinators::{always_false, always_true, branch, check, map, null};
pub use context::{Deferred, ErrorCallback, FinishCallback, RunContext};
pub use engine::{Engine, Outcome, PipelineFactory, StepSpec, StepTable};
pub use registry::{Handle, HostFunctions, Registry, Step, StepFn, StepRef, step};
pub use value::{Flow, StepResult, Value};
