//! Background producers
//!
//! Slow completion sources run on the tokio blocking pool. A step hands its
//! run's [`Deferred`] to the [`JobRunner`] and returns `Flow::Skip`; the job
//! resolves the run when it finishes. Starting a job cancels the one before
//! it, so only the newest input ever repaints the menu.

use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StepFault;
use crate::pipeline::{Deferred, Flow, RunContext, StepFn, Value, step};

/// Work done off the UI thread, polled for cancellation
pub type Job = Box<dyn FnOnce(&CancellationToken) -> Result<Value, StepFault> + Send>;

/// Runs jobs on the blocking pool of a tokio runtime
#[derive(Debug)]
pub struct JobRunner {
    handle: Handle,
    current: Mutex<Option<CancellationToken>>,
}

impl JobRunner {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            current: Mutex::new(None),
        }
    }

    /// Runner on the runtime the caller is in, if any
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Run `job` in the background and settle `deferred` with its result
    ///
    /// Cancels the previously submitted job. A cancelled job never settles
    /// its run.
    pub fn submit(&self, deferred: Deferred, job: Job) {
        let token = CancellationToken::new();
        if let Some(previous) = self.replace_current(token.clone()) {
            previous.cancel();
        }

        let run_id = deferred.run_id();
        debug!(run_id, "submitting background job");

        self.handle.spawn_blocking(move || {
            if token.is_cancelled() {
                return;
            }
            let result = job(&token);
            if token.is_cancelled() {
                debug!(run_id, "background job cancelled");
                return;
            }
            match result {
                Ok(value) => deferred.resolve(value),
                Err(fault) => deferred.reject(fault),
            }
        });
    }

    /// Cancel whatever job is in flight
    pub fn cancel(&self) {
        if let Some(token) = self.take_current() {
            token.cancel();
        }
    }

    fn replace_current(&self, token: CancellationToken) -> Option<CancellationToken> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.replace(token)
    }

    fn take_current(&self) -> Option<CancellationToken> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.take()
    }
}

/// Step running `work` on `runner` and continuing the run with its result
///
/// Must sit at the top level of a pipeline, since only top-level runs can be
/// deferred.
pub fn background<F>(runner: Arc<JobRunner>, work: F) -> StepFn
where
    F: Fn(&RunContext, Value, &CancellationToken) -> Result<Value, StepFault>
        + Send
        + Sync
        + 'static,
{
    let work = Arc::new(work);
    step(move |ctx: &mut RunContext, input: Value| {
        let deferred = ctx.defer()?;
        let snapshot = ctx.clone();
        let work = Arc::clone(&work);
        runner.submit(
            deferred,
            Box::new(move |cancel: &CancellationToken| work(&snapshot, input, cancel)),
        );
        Ok(Flow::Skip)
    })
}
