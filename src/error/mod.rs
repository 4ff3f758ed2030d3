//! Error handling for wildline.
//!
//! Two layers of failure exist:
//! - [`WildError`] for the crate's fallible operations (configuration, I/O,
//!   registry maintenance)
//! - [`StepFault`] for failures raised inside a pipeline run, delivered to the
//!   run's error callback instead of being returned

pub mod kinds;

// Re-export commonly used types
pub use kinds::{ConfigError, DispatchError, PipelineError, Result, StepFault, WildError};
