//! Failure classification for invoked units.
//!
//! The invocation mechanism may wrap the failure raised by user code in a
//! generic "invocation failed" layer. Only the innermost failure carries the
//! message and stack trace the user needs, so reporting always goes through
//! [`Failure::into_origin`].

use std::fmt;

/// A failure produced while invoking a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Raised by the unit itself.
    UserCode { message: String, trace: String },
    /// Added by the invocation mechanism around another failure.
    Wrapped { context: String, inner: Box<Failure> },
}

/// Message and stack trace of the failure that started it all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub message: String,
    pub trace: String,
}

impl Failure {
    pub fn user_code(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Failure::UserCode {
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// Wrap `self` the way an invocation layer would.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Failure::Wrapped {
            context: context.into(),
            inner: Box::new(self),
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, Failure::Wrapped { .. })
    }

    /// Peel off every wrapper and return the original failure's data.
    pub fn into_origin(self) -> Origin {
        let mut current = self;
        loop {
            match current {
                Failure::UserCode { message, trace } => return Origin { message, trace },
                Failure::Wrapped { inner, .. } => current = *inner,
            }
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::UserCode { message, .. } => write!(f, "{}", message),
            Failure::Wrapped { context, inner } => write!(f, "{}: {}", context, inner),
        }
    }
}

impl std::error::Error for Failure {}
