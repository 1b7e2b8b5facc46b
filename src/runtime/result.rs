//! The record handed back for every invocation or hook sequence.

use crate::runtime::failure::Origin;
use std::time::Instant;

/// Outcome of one invocation (or one hook sequence).
///
/// Error fields are only populated when `failed` is set, and always with the
/// original failure's data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub failed: bool,
    pub execution_time_ms: u64,
    pub messages: Vec<String>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    /// PNG bytes; empty when capture was disabled or failed.
    pub screenshot: Option<Vec<u8>>,
    pub recoverable_error: bool,
}

impl ExecutionResult {
    pub fn success(execution_time_ms: u64, messages: Vec<String>) -> Self {
        Self {
            failed: false,
            execution_time_ms,
            messages,
            ..Self::default()
        }
    }

    pub fn failure(
        origin: Origin,
        execution_time_ms: u64,
        messages: Vec<String>,
        screenshot: Vec<u8>,
    ) -> Self {
        Self {
            failed: true,
            execution_time_ms,
            messages,
            error_message: Some(origin.message),
            stack_trace: Some(origin.trace),
            screenshot: Some(screenshot),
            recoverable_error: false,
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
