//! Per-run state threaded through every step
//!
//! A [`RunContext`] is cloned whenever a combinator starts a nested chain, so
//! changes a step makes are seen only by the steps after it in its own chain.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use super::engine::{self, StepTable};
use super::registry::{HostFunctions, StepRef};
use super::value::{Flow, Value};
use crate::error::StepFault;

/// Called once with the final value of a run
pub type FinishCallback = Arc<dyn Fn(&RunContext, Value) + Send + Sync>;

/// Called once with the first fault of a run
pub type ErrorCallback = Arc<dyn Fn(&RunContext, StepFault) + Send + Sync>;

/// Counters shared between an engine and the runs it started
#[derive(Debug, Default)]
pub(crate) struct RunTracker {
    /// Bumped by every pipeline install
    pub(crate) generation: AtomicU64,
    /// Id of the most recently started run
    pub(crate) latest_run: AtomicU64,
}

/// State of a single pipeline run
#[derive(Clone)]
pub struct RunContext {
    /// Command line being completed
    pub line: String,
    /// Cursor position in `line` (byte offset)
    pub cursor_offset: usize,
    pub(crate) remaining: VecDeque<StepRef>,
    pub(crate) step_count: usize,
    pub(crate) started_at: Instant,
    pub(crate) deadline: Option<Duration>,
    pub(crate) run_id: u64,
    pub(crate) generation: u64,
    pub(crate) input: Value,
    pub(crate) nested: bool,
    /// Set once a step of this chain has handed the run to a [`Deferred`]
    pub(crate) deferred: bool,
    /// Shared by every copy of the run; the first delivery wins
    pub(crate) settled: Arc<AtomicBool>,
    pub(crate) host: Arc<HostFunctions>,
    pub(crate) table: Option<Arc<StepTable>>,
    pub(crate) tracker: Option<Arc<RunTracker>>,
    on_finish: FinishCallback,
    on_error: ErrorCallback,
}

impl RunContext {
    /// Create a context for completing `line` with the cursor at `cursor_offset`
    pub fn new<F, E>(line: impl Into<String>, cursor_offset: usize, on_finish: F, on_error: E) -> Self
    where
        F: Fn(&RunContext, Value) + Send + Sync + 'static,
        E: Fn(&RunContext, StepFault) + Send + Sync + 'static,
    {
        Self {
            line: line.into(),
            cursor_offset,
            remaining: VecDeque::new(),
            step_count: 0,
            started_at: Instant::now(),
            deadline: None,
            run_id: 0,
            generation: 0,
            input: Value::Null,
            nested: false,
            deferred: false,
            settled: Arc::new(AtomicBool::new(false)),
            host: Arc::new(HostFunctions::new()),
            table: None,
            tracker: None,
            on_finish: Arc::new(on_finish),
            on_error: Arc::new(on_error),
        }
    }

    /// Limit how long the run may take, overriding the engine default
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Number of steps invoked so far in this chain
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Number of steps still queued in this chain
    pub fn remaining_steps(&self) -> usize {
        self.remaining.len()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Value the run was started with
    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Whether this context belongs to a combinator's sub-pipeline
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Capture the rest of this run so it can be resumed later
    ///
    /// The run continues when the returned [`Deferred`] is resolved. Whatever
    /// the deferring step returns afterwards is discarded, and no later step
    /// of the current pass runs. Only top-level runs can be deferred.
    pub fn defer(&mut self) -> Result<Deferred, StepFault> {
        if self.nested {
            return Err(StepFault::step("cannot defer inside a nested pipeline"));
        }
        let (table, tracker) = match (&self.table, &self.tracker) {
            (Some(table), Some(tracker)) => (Arc::clone(table), Arc::clone(tracker)),
            _ => return Err(StepFault::step("cannot defer a run the engine did not start")),
        };
        self.deferred = true;

        let mut ctx = self.clone();
        ctx.deferred = false;
        Ok(Deferred { ctx, table, tracker })
    }

    /// Whether a step of this chain has deferred the run
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub(crate) fn deadline_fault(&self) -> Option<StepFault> {
        let deadline = self.deadline?;
        let elapsed = self.elapsed();
        (elapsed > deadline).then_some(StepFault::Timeout { elapsed })
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    pub(crate) fn finish(&self, value: Value) {
        if self.settled.swap(true, Ordering::SeqCst) {
            debug!(run_id = self.run_id, "run already delivered, dropping result");
            return;
        }
        (self.on_finish)(self, value);
    }

    pub(crate) fn fail(&self, fault: StepFault) {
        if self.settled.swap(true, Ordering::SeqCst) {
            debug!(run_id = self.run_id, "run already delivered, dropping fault: {}", fault);
            return;
        }
        (self.on_error)(self, fault);
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("line", &self.line)
            .field("cursor_offset", &self.cursor_offset)
            .field("remaining", &self.remaining)
            .field("step_count", &self.step_count)
            .field("run_id", &self.run_id)
            .field("nested", &self.nested)
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

/// Continuation of a deferred run
///
/// Resolving or rejecting consumes the handle, so a deferred run delivers at
/// most one result. Results for superseded runs are dropped.
pub struct Deferred {
    ctx: RunContext,
    table: Arc<StepTable>,
    tracker: Arc<RunTracker>,
}

impl Deferred {
    pub fn run_id(&self) -> u64 {
        self.ctx.run_id
    }

    /// Whether a newer run or pipeline has replaced this one, or the run has
    /// already delivered its result
    pub fn is_stale(&self) -> bool {
        self.tracker.latest_run.load(Ordering::SeqCst) != self.ctx.run_id
            || self.tracker.generation.load(Ordering::SeqCst) != self.ctx.generation
            || self.ctx.is_settled()
    }

    /// Continue the remaining steps with `value`
    pub fn resolve(self, value: Value) {
        self.resume(Flow::Continue(value));
    }

    /// Continue with a step outcome, sentinels included
    pub fn resume(self, flow: Flow) {
        if self.is_stale() {
            debug!(run_id = self.ctx.run_id, "dropping result of superseded run");
            return;
        }
        let mut ctx = self.ctx;
        if let Some(fault) = ctx.deadline_fault() {
            ctx.fail(fault);
            return;
        }
        let outcome = engine::drive(&self.table, &mut ctx, flow);
        engine::deliver(&ctx, outcome);
    }

    /// Fail the run with `fault`
    pub fn reject(self, fault: StepFault) {
        if self.is_stale() {
            debug!(run_id = self.ctx.run_id, "dropping fault of superseded run");
            return;
        }
        self.ctx.fail(fault);
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("run_id", &self.ctx.run_id)
            .field("remaining", &self.ctx.remaining.len())
            .finish()
    }
}
