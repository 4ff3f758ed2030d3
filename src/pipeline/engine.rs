//! Pipeline execution engine
//!
//! The engine owns the installed step list and drives runs over it. Driving is
//! an explicit loop that drains the run's queue of [`StepRef`]s, so pipeline
//! length never grows the call stack, and the queue survives a deferral
//! because it lives in the [`RunContext`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use super::context::{RunContext, RunTracker};
use super::registry::{Handle, HostFunctions, Registry, StepFn, StepRef};
use super::value::{Flow, StepResult, Value};
use crate::error::{DispatchError, StepFault};

/// One entry of a pipeline declaration
#[derive(Clone)]
pub enum StepSpec {
    /// A step value; gets a registry handle when installed
    Func(StepFn),
    /// A host function looked up by name on every call
    Named(String),
}

impl StepSpec {
    pub fn named(name: impl Into<String>) -> Self {
        StepSpec::Named(name.into())
    }
}

impl From<StepFn> for StepSpec {
    fn from(f: StepFn) -> Self {
        StepSpec::Func(f)
    }
}

/// Builds the pipeline installed when a run starts with nothing installed
pub type PipelineFactory = Arc<dyn Fn() -> Vec<StepSpec> + Send + Sync>;

/// Installed steps plus the registry their handles point into
#[derive(Clone, Debug, Default)]
pub struct StepTable {
    registry: Registry,
    pipeline: Vec<StepRef>,
    generation: u64,
}

impl StepTable {
    /// Register every function of `specs` in declaration order
    pub(crate) fn build(specs: Vec<StepSpec>, generation: u64) -> Self {
        Self::build_into(Registry::new(), specs, generation)
    }

    /// Like [`StepTable::build`], keeping the functions already in `registry`
    fn build_into(mut registry: Registry, specs: Vec<StepSpec>, generation: u64) -> Self {
        let pipeline = specs
            .into_iter()
            .map(|spec| match spec {
                StepSpec::Func(f) => StepRef::Indexed(registry.register(f)),
                StepSpec::Named(name) => StepRef::Named(name),
            })
            .collect();
        Self {
            registry,
            pipeline,
            generation,
        }
    }

    pub fn pipeline(&self) -> &[StepRef] {
        &self.pipeline
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolve `step_ref` and invoke it
    pub(crate) fn call(&self, step_ref: &StepRef, ctx: &mut RunContext, value: Value) -> StepResult {
        let f = self.resolve(step_ref, &ctx.host)?;
        f.call(ctx, value)
    }

    fn resolve(&self, step_ref: &StepRef, host: &HostFunctions) -> Result<StepFn, DispatchError> {
        match step_ref {
            StepRef::Indexed(handle) => self
                .registry
                .get(*handle)
                .cloned()
                .ok_or(DispatchError::UnknownHandle(*handle)),
            StepRef::Named(name) => host
                .resolve(name)
                .cloned()
                .ok_or_else(|| DispatchError::UnresolvedName(name.clone())),
        }
    }
}

/// How a chain of steps ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A step returned `Skip`
    Skipped,
    /// The chain produced a final value (`Done(b)` finishes with `Bool(b)`)
    Finished(Value),
    /// A step failed
    Failed(StepFault),
}

/// Drain the context's queue, feeding each step the previous step's value
pub(crate) fn drive(table: &StepTable, ctx: &mut RunContext, mut flow: Flow) -> Outcome {
    loop {
        let value = match flow {
            Flow::Skip => return Outcome::Skipped,
            Flow::Done(b) => return Outcome::Finished(Value::Bool(b)),
            Flow::Continue(value) => value,
        };

        let Some(next) = ctx.remaining.pop_front() else {
            return Outcome::Finished(value);
        };

        if let Some(fault) = ctx.deadline_fault() {
            return Outcome::Failed(fault);
        }

        ctx.step_count += 1;
        trace!(step = ?next, count = ctx.step_count, nested = ctx.nested, "invoking step");

        flow = match table.call(&next, ctx, value) {
            Ok(_) if ctx.deferred => {
                trace!(run_id = ctx.run_id, step = ?next, "run deferred");
                return Outcome::Skipped;
            }
            Ok(flow) => flow,
            Err(fault) => {
                if let StepFault::Dispatch(e) = &fault {
                    error!("aborting pipeline: {}", e);
                }
                return Outcome::Failed(fault);
            }
        };
    }
}

/// Hand a top-level outcome to the run's callbacks
pub(crate) fn deliver(ctx: &RunContext, outcome: Outcome) {
    match outcome {
        Outcome::Skipped => {
            trace!(run_id = ctx.run_id, "run skipped");
        }
        Outcome::Finished(value) => {
            debug!(
                run_id = ctx.run_id,
                steps = ctx.step_count,
                elapsed_us = ctx.elapsed().as_micros() as u64,
                "run finished"
            );
            ctx.finish(value);
        }
        Outcome::Failed(fault) => {
            warn!(run_id = ctx.run_id, "run failed: {}", fault);
            ctx.fail(fault);
        }
    }
}

/// Run `table`'s pipeline as a sub-chain of `parent`
///
/// The sub-chain works on a copy of the parent context, so nothing it does is
/// visible to the parent or to sibling sub-chains.
pub(crate) fn run_nested(table: &StepTable, parent: &RunContext, input: Value) -> Outcome {
    let mut ctx = parent.clone();
    ctx.remaining = table.pipeline.iter().cloned().collect();
    ctx.step_count = 0;
    ctx.nested = true;
    ctx.deferred = false;
    drive(table, &mut ctx, Flow::Continue(input))
}

/// Pipeline engine
///
/// Owns the installed pipeline, the functions the host exposes by name and the
/// counters used to recognise superseded runs.
pub struct Engine {
    table: Option<Arc<StepTable>>,
    /// Whether a pipeline was installed, as opposed to a table created only
    /// to hold registered functions
    installed: bool,
    host: Arc<HostFunctions>,
    default: Option<PipelineFactory>,
    deadline: Option<Duration>,
    tracker: Arc<RunTracker>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with nothing installed
    pub fn new() -> Self {
        Self {
            table: None,
            installed: false,
            host: Arc::new(HostFunctions::new()),
            default: None,
            deadline: None,
            tracker: Arc::new(RunTracker::default()),
        }
    }

    /// Pipeline to install when a run starts with nothing installed
    pub fn with_default<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Vec<StepSpec> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(factory));
        self
    }

    /// Deadline applied to runs that don't set their own
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Expose `f` to `StepRef::Named` lookups
    pub fn expose(&mut self, name: impl Into<String>, f: StepFn) {
        Arc::make_mut(&mut self.host).expose(name, f);
    }

    pub fn host(&self) -> &HostFunctions {
        &self.host
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Step references of the active pipeline
    pub fn pipeline(&self) -> &[StepRef] {
        self.table.as_deref().map(StepTable::pipeline).unwrap_or(&[])
    }

    pub fn generation(&self) -> u64 {
        self.tracker.generation.load(Ordering::SeqCst)
    }

    /// Replace the whole step table with `steps`
    ///
    /// Handles are assigned afresh in declaration order. Runs deferred under
    /// the previous table are dropped when they try to resume.
    pub fn set_pipeline(&mut self, steps: Vec<StepSpec>) {
        let generation = self.tracker.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let table = StepTable::build(steps, generation);
        debug!(generation, steps = table.pipeline.len(), "pipeline installed");
        self.table = Some(Arc::new(table));
        self.installed = true;
    }

    fn install_default(&mut self) {
        let steps = self.default.as_ref().map(|f| f()).unwrap_or_default();
        let registry = self
            .table
            .take()
            .map(|table| Arc::unwrap_or_clone(table).registry)
            .unwrap_or_default();
        let generation = self.tracker.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let table = StepTable::build_into(registry, steps, generation);
        debug!(generation, steps = table.pipeline.len(), "default pipeline installed");
        self.table = Some(Arc::new(table));
        self.installed = true;
    }

    /// Register a function in the active table without touching the pipeline
    ///
    /// Registering does not count as installing. The default pipeline is
    /// still installed by the next `start`, next to the registered functions.
    pub fn register_func(&mut self, f: StepFn) -> Handle {
        let table = self.table.get_or_insert_with(|| {
            let generation = self.tracker.generation.fetch_add(1, Ordering::SeqCst) + 1;
            Arc::new(StepTable::build(Vec::new(), generation))
        });
        Arc::make_mut(table).registry.register(f)
    }

    /// Remove a registered function
    ///
    /// Handles the active pipeline still references are refused rather than
    /// left dangling.
    pub fn unregister_func(&mut self, handle: Handle) -> Result<StepFn, DispatchError> {
        let Some(table) = self.table.as_mut() else {
            return Err(DispatchError::UnknownHandle(handle));
        };
        if table.pipeline.contains(&StepRef::Indexed(handle)) {
            return Err(DispatchError::HandleInUse(handle));
        }
        if !table.registry.contains(handle) {
            return Err(DispatchError::UnknownHandle(handle));
        }
        Arc::make_mut(table)
            .registry
            .unregister(handle)
            .ok_or(DispatchError::UnknownHandle(handle))
    }

    /// Invoke a single step reference against the active table
    pub fn call(&self, step_ref: &StepRef, ctx: &mut RunContext, value: Value) -> StepResult {
        match &self.table {
            Some(table) => table.call(step_ref, ctx, value),
            None => StepTable::default().call(step_ref, ctx, value),
        }
    }

    /// Start a run over `input`
    ///
    /// The result is delivered only through the context's callbacks. If a step
    /// defers, delivery happens when its continuation resolves.
    pub fn start(&mut self, mut ctx: RunContext, input: Value) {
        if !self.installed {
            self.install_default();
        }
        let Some(table) = self.table.clone() else {
            return;
        };

        ctx.run_id = self.tracker.latest_run.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.generation = table.generation;
        ctx.remaining = table.pipeline.iter().cloned().collect();
        ctx.step_count = 0;
        ctx.started_at = Instant::now();
        ctx.deadline = ctx.deadline.or(self.deadline);
        ctx.input = input.clone();
        ctx.nested = false;
        ctx.deferred = false;
        ctx.settled = Arc::new(AtomicBool::new(false));
        ctx.host = Arc::clone(&self.host);
        ctx.table = Some(Arc::clone(&table));
        ctx.tracker = Some(Arc::clone(&self.tracker));

        trace!(run_id = ctx.run_id, line = %ctx.line, "run started");
        let outcome = drive(&table, &mut ctx, Flow::Continue(input));
        deliver(&ctx, outcome);
    }
}
