//! Higher-order steps composing sub-pipelines
//!
//! Each sub-pipeline is compiled into its own step table when the combinator
//! is built, and runs through the same driver as a top-level pipeline, so
//! `Skip` and `Done` mean the same thing at any depth.

use super::context::RunContext;
use super::engine::{self, Outcome, StepSpec, StepTable};
use super::registry::{Step, StepFn, step};
use super::value::{Flow, StepResult, Value};

/// Gate a chain on a predicate
///
/// Passes the value through unchanged when `pred` holds, otherwise finishes
/// with `Done(false)` so an enclosing `branch` moves on to its next
/// alternative.
pub fn check<P>(pred: P) -> StepFn
where
    P: Fn(&RunContext, &Value) -> bool + Send + Sync + 'static,
{
    step(move |ctx: &mut RunContext, input: Value| {
        if pred(ctx, &input) {
            Ok(Flow::Continue(input))
        } else {
            Ok(Flow::Done(false))
        }
    })
}

/// Ordered choice between sub-pipelines
///
/// Alternatives are tried in order on the same input. The first one that
/// finishes with anything other than `false` provides the result; if none
/// does, the branch skips. A failing alternative fails the branch and later
/// alternatives are not tried.
pub fn branch(alternatives: Vec<Vec<StepSpec>>) -> StepFn {
    step(Branch {
        alternatives: compile(alternatives),
    })
}

/// Run every sub-pipeline on the same input and join the results in order
///
/// Yields `Value::List` with one entry per sub-pipeline. If any of them skips,
/// the whole map skips.
pub fn map(pipelines: Vec<Vec<StepSpec>>) -> StepFn {
    step(Map {
        pipelines: compile(pipelines),
    })
}

/// Step that always skips
pub fn null() -> StepFn {
    step(|_: &mut RunContext, _: Value| Ok(Flow::Skip))
}

/// Step that always finishes with `true`
pub fn always_true() -> StepFn {
    step(|_: &mut RunContext, _: Value| Ok(Flow::Done(true)))
}

/// Step that always finishes with `false`
pub fn always_false() -> StepFn {
    step(|_: &mut RunContext, _: Value| Ok(Flow::Done(false)))
}

fn compile(pipelines: Vec<Vec<StepSpec>>) -> Vec<StepTable> {
    pipelines
        .into_iter()
        .map(|specs| StepTable::build(specs, 0))
        .collect()
}

struct Branch {
    alternatives: Vec<StepTable>,
}

impl Step for Branch {
    fn call(&self, ctx: &mut RunContext, input: Value) -> StepResult {
        for alternative in &self.alternatives {
            match engine::run_nested(alternative, ctx, input.clone()) {
                Outcome::Skipped => continue,
                Outcome::Finished(value) if value.is_false() => continue,
                Outcome::Finished(value) => return Ok(Flow::Continue(value)),
                Outcome::Failed(fault) => return Err(fault),
            }
        }
        Ok(Flow::Skip)
    }
}

struct Map {
    pipelines: Vec<StepTable>,
}

impl Step for Map {
    fn call(&self, ctx: &mut RunContext, input: Value) -> StepResult {
        let mut results = Vec::with_capacity(self.pipelines.len());
        for pipeline in &self.pipelines {
            match engine::run_nested(pipeline, ctx, input.clone()) {
                Outcome::Skipped => return Ok(Flow::Skip),
                Outcome::Finished(value) => results.push(value),
                Outcome::Failed(fault) => return Err(fault),
            }
        }
        Ok(Flow::Continue(Value::List(results)))
    }
}
