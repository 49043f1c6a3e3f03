//! Error types surfaced to test code.
//!
//! Staging internals use `anyhow` with path context; everything a caller
//! may want to match on is one of the enums below.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::State;

/// Invalid configuration, rejected before any filesystem side effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("{0} is required but was not set")]
    Missing(&'static str),

    #[error("builder can only be used once")]
    BuilderConsumed,

    #[error(
        "the working directory has to be named {expected}, but was: {}",
        actual.display()
    )]
    WrongWorkingDirectory {
        expected: &'static str,
        actual: PathBuf,
    },

    #[error("invalid config file '{}': {message}", path.display())]
    InvalidFile { path: PathBuf, message: String },
}

/// An operation was requested in a state that does not permit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot transition from {from} to {to}")]
pub struct TransitionError {
    pub from: State,
    pub to: State,
}

/// Problems with the runtime archive or its extracted contents.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("no \"{prefix}*\" directory found in '{}'", root.display())]
    NoRuntimeRoot { prefix: &'static str, root: PathBuf },

    #[error(
        "multiple \"{prefix}*\" directories found in '{}': {}",
        root.display(),
        found.join(", ")
    )]
    MultipleRuntimeRoots {
        prefix: &'static str,
        root: PathBuf,
        found: Vec<String>,
    },

    #[error("unsupported archive format: '{}'", path.display())]
    UnsupportedArchive { path: PathBuf },

    #[error("archive entry '{entry}' would be extracted outside '{}'", dest.display())]
    UnsafeEntry { entry: String, dest: PathBuf },
}

/// A flow definition edit could not locate its target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("processor '{processor}' not found in flow definition")]
    ProcessorNotFound { processor: String },

    #[error("processor name '{processor}' is used {count} times; it must be unique")]
    AmbiguousProcessor { processor: String, count: usize },

    #[error("processor '{processor}' has no property '{property}' with a value element")]
    PropertyNotFound { processor: String, property: String },

    #[error("processor '{processor}' has no class element")]
    ClassNotFound { processor: String },
}

/// A step of an edit pipeline failed; later steps did not run.
#[derive(Debug, Error)]
#[error("flow edit step {step} ({description}) failed: {source}")]
pub struct PipelineError {
    /// Zero-based position of the failing step.
    pub step: usize,
    pub description: String,
    #[source]
    pub source: anyhow::Error,
}

/// Failure of a lifecycle operation on a test instance.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("installation failed: {0}")]
    Install(#[source] anyhow::Error),

    #[error("startup failed: {0}")]
    Start(#[source] anyhow::Error),

    #[error("stop and cleanup failed: {0}")]
    Stop(#[source] anyhow::Error),
}

impl InstanceError {
    /// The underlying cause of an install, start or stop failure.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Transition(_) => None,
            Self::Install(e) | Self::Start(e) | Self::Stop(e) => Some(e),
        }
    }
}
