//! Waiting for a run from synchronous callers
//!
//! Line editors ask for completions synchronously. [`complete_blocking`]
//! starts a run and waits, for a bounded time, for whichever callback fires.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use super::candidate::{Candidate, Replacer};
use crate::error::{PipelineError, Result, StepFault};
use crate::pipeline::{Engine, RunContext, Value};

/// Complete `line` with the cursor at its end
///
/// Returns `PipelineError::NoResult` when the run skips or does not settle
/// within `wait`, and `PipelineError::Failed` when it faults.
pub fn complete_blocking(engine: &mut Engine, line: &str, wait: Duration) -> Result<Vec<Candidate>> {
    let (tx, rx) = mpsc::channel::<std::result::Result<Value, StepFault>>();
    let err_tx = tx.clone();
    let ctx = RunContext::new(
        line,
        line.len(),
        move |_, value| {
            let _ = tx.send(Ok(value));
        },
        move |_, fault| {
            let _ = err_tx.send(Err(fault));
        },
    );
    engine.start(ctx, Value::from(line));

    let received = match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| rx.recv_timeout(wait))
        }
        _ => rx.recv_timeout(wait),
    };

    match received {
        Ok(Ok(value)) => Ok(into_candidates(value)),
        Ok(Err(fault)) => Err(PipelineError::Failed(fault).into()),
        Err(RecvTimeoutError::Timeout) => {
            debug!(line, "completion did not settle in time");
            Err(PipelineError::NoResult.into())
        }
        // every sender dropped: the run skipped
        Err(RecvTimeoutError::Disconnected) => Err(PipelineError::NoResult.into()),
    }
}

/// Candidates from the final value of a run
///
/// Plain string lists (from a custom pipeline) are spliced in as command
/// arguments; anything else yields no candidates.
pub fn into_candidates(value: Value) -> Vec<Candidate> {
    match value {
        Value::Candidates(candidates) => candidates,
        other => other
            .into_strings()
            .unwrap_or_default()
            .into_iter()
            .map(|s| Candidate::new(s, Replacer::cmdline()))
            .collect(),
    }
}
