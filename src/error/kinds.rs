use std::time::Duration;
use std::{fmt, io};

use crate::pipeline::Handle;

/// Crate-wide `Result` type using [`WildError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, WildError>;

/// Top-level error type for wildline operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum WildError {
    /// Pipeline installation or registry errors.
    Pipeline(PipelineError),

    /// Step dispatch errors.
    Dispatch(DispatchError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Errors surfaced when a caller waits for a run to settle.
#[derive(Debug)]
pub enum PipelineError {
    /// The run ended through its error callback.
    Failed(StepFault),

    /// The run skipped or did not settle in time.
    NoResult,
}

/// Errors raised while resolving a step reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No function is registered under this handle.
    UnknownHandle(Handle),

    /// No host function is exposed under this name.
    UnresolvedName(String),

    /// The handle is referenced by the active pipeline and cannot be removed.
    HandleInUse(Handle),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Any other configuration problem.
    Generic(String),
}

/// Failure value delivered to a run's error callback.
///
/// The first fault raised inside a chain aborts the rest of that chain and is
/// delivered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum StepFault {
    /// A step reported a failure.
    Step(String),

    /// A step reference could not be resolved.
    Dispatch(DispatchError),

    /// The run outlived its deadline.
    Timeout { elapsed: Duration },
}

impl StepFault {
    /// Build a step failure from any displayable message.
    pub fn step(msg: impl fmt::Display) -> Self {
        StepFault::Step(msg.to_string())
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for WildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WildError::Pipeline(e) => write!(f, "Pipeline error: {e}"),
            WildError::Dispatch(e) => write!(f, "Dispatch error: {e}"),
            WildError::Config(e) => write!(f, "Configuration error: {e}"),
            WildError::Io(e) => write!(f, "I/O error: {e}"),
            WildError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Failed(fault) => write!(f, "{fault}"),
            PipelineError::NoResult => write!(f, "no completions"),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnknownHandle(h) => write!(f, "no function registered for {h}"),
            DispatchError::UnresolvedName(name) => {
                write!(f, "no host function named '{name}'")
            }
            DispatchError::HandleInUse(h) => {
                write!(f, "{h} is referenced by the active pipeline")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for StepFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFault::Step(msg) => write!(f, "{msg}"),
            StepFault::Dispatch(e) => write!(f, "{e}"),
            StepFault::Timeout { elapsed } => {
                write!(f, "pipeline timed out after {}ms", elapsed.as_millis())
            }
        }
    }
}

impl std::error::Error for WildError {}
impl std::error::Error for PipelineError {}
impl std::error::Error for DispatchError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StepFault {}

/* ========================= Conversions ========================= */

impl From<io::Error> for WildError {
    fn from(err: io::Error) -> Self {
        WildError::Io(err)
    }
}

impl From<PipelineError> for WildError {
    fn from(err: PipelineError) -> Self {
        WildError::Pipeline(err)
    }
}

impl From<StepFault> for WildError {
    fn from(fault: StepFault) -> Self {
        WildError::Pipeline(PipelineError::Failed(fault))
    }
}

impl From<DispatchError> for WildError {
    fn from(err: DispatchError) -> Self {
        WildError::Dispatch(err)
    }
}

impl From<ConfigError> for WildError {
    fn from(err: ConfigError) -> Self {
        WildError::Config(err)
    }
}

impl From<String> for WildError {
    fn from(msg: String) -> Self {
        WildError::Generic(msg)
    }
}

impl From<&str> for WildError {
    fn from(msg: &str) -> Self {
        WildError::Generic(msg.to_owned())
    }
}

impl From<toml::de::Error> for WildError {
    fn from(err: toml::de::Error) -> Self {
        WildError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}

impl From<toml::ser::Error> for WildError {
    fn from(err: toml::ser::Error) -> Self {
        WildError::Config(ConfigError::InvalidFormat(err.to_string()))
    }
}

impl From<DispatchError> for StepFault {
    fn from(err: DispatchError) -> Self {
        StepFault::Dispatch(err)
    }
}

impl From<regex::Error> for StepFault {
    fn from(err: regex::Error) -> Self {
        StepFault::Step(err.to_string())
    }
}

impl From<io::Error> for StepFault {
    fn from(err: io::Error) -> Self {
        StepFault::Step(err.to_string())
    }
}
