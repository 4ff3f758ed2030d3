//! Step registry and step references
//!
//! Steps are stored behind opaque [`Handle`]s handed out by a [`Registry`].
//! A [`StepRef`] names a step either by handle or by the name of a function
//! the host exposes through [`HostFunctions`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::context::RunContext;
use super::value::{StepResult, Value};

/// A single unit of a pipeline
pub trait Step: Send + Sync {
    /// Transform the running value or answer with a sentinel
    fn call(&self, ctx: &mut RunContext, input: Value) -> StepResult;
}

impl<F> Step for F
where
    F: Fn(&mut RunContext, Value) -> StepResult + Send + Sync,
{
    fn call(&self, ctx: &mut RunContext, input: Value) -> StepResult {
        self(ctx, input)
    }
}

/// Shared, type-erased step
pub type StepFn = Arc<dyn Step>;

/// Wrap a closure or [`Step`] implementation into a [`StepFn`]
pub fn step<S: Step + 'static>(s: S) -> StepFn {
    Arc::new(s)
}

/// Opaque key of a registered step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a step, resolved when the step is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRef {
    /// Function exposed by the host under this name
    Named(String),
    /// Closure registered in the pipeline's registry
    Indexed(Handle),
}

/// Handle → step table
///
/// Handles come from a counter that only grows, so a handle is never reused
/// within one registry.
#[derive(Clone, Default)]
pub struct Registry {
    next: u64,
    funcs: HashMap<Handle, StepFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a step and return its fresh handle
    pub fn register(&mut self, f: StepFn) -> Handle {
        self.next += 1;
        let handle = Handle(self.next);
        self.funcs.insert(handle, f);
        handle
    }

    /// Remove a step, returning it if it was registered
    pub fn unregister(&mut self, handle: Handle) -> Option<StepFn> {
        self.funcs.remove(&handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&StepFn> {
        self.funcs.get(&handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.funcs.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handles: Vec<_> = self.funcs.keys().copied().collect();
        handles.sort();
        f.debug_struct("Registry")
            .field("next", &self.next)
            .field("handles", &handles)
            .finish()
    }
}

/// Functions the host exposes for late binding by name
#[derive(Clone, Default)]
pub struct HostFunctions {
    funcs: HashMap<String, StepFn>,
}

impl HostFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a step under `name`, replacing any previous one
    pub fn expose(&mut self, name: impl Into<String>, f: StepFn) {
        self.funcs.insert(name.into(), f);
    }

    pub fn resolve(&self, name: &str) -> Option<&StepFn> {
        self.funcs.get(name)
    }

    /// Exposed names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for HostFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunctions")
            .field("names", &self.names())
            .finish()
    }
}
