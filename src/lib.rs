//! Execution adapter for test steps and lifecycle hooks.
//!
//! A [`MethodExecutor`] runs units of test code through an
//! [`ExecutionContext`], times them, drains the diagnostic messages they
//! emit and turns every outcome, including panics and wrapped failures, into
//! an [`ExecutionResult`] for the orchestrator.

pub mod config;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod runtime;

pub use config::{ExecutorConfig, ScreenshotSetting};
pub use registry::{HookContext, HookKind, TagAggregation, UnitRegistry};
pub use runtime::{
    ExecutionContext, ExecutionResult, Failure, Invocation, MethodExecutor, Sandbox, Unit,
    UnitError,
};

use thiserror::Error;

/// Errors raised by the crate's own plumbing.
///
/// Failures of user code never show up here; they are reported through
/// [`ExecutionResult`].
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Duplicate step implementation: {0}")]
    DuplicateStep(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
