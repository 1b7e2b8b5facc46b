//! Runtime execution sub-system.
//!
//! Sub-modules:
//! - [`executor`] — Public façade; runs units and hook sequences.
//! - [`context`]  — The execution context capability trait.
//! - [`invoker`]  — In-process context with panic isolation.
//! - [`unit`]     — Units, signatures and the invocation view.
//! - [`failure`]  — Failure classification and unwrapping.
//! - [`capture`]  — Screenshot capability chain.
//! - [`result`]   — The execution result record.

pub mod capture;
pub mod context;
pub mod executor;
pub mod failure;
pub mod invoker;
pub mod result;
pub mod unit;

pub use capture::{CaptureError, DisplayCapture, NoDisplay, ScreenshotChain};
pub use context::ExecutionContext;
pub use executor::MethodExecutor;
pub use failure::{Failure, Origin};
pub use invoker::Sandbox;
pub use result::ExecutionResult;
pub use unit::{Invocation, Param, Signature, Unit, UnitError, UnitResult};
