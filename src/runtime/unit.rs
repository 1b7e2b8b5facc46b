//! Invocable units of test code and their declared signatures.
//!
//! A [`Unit`] carries an explicit [`Signature`] so callers can decide how to
//! invoke it by comparing declared parameter types with the runtime types of
//! the values they hold, without any reflection.

use std::any::{type_name, Any, TypeId};
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::fmt;

pub type UnitResult = std::result::Result<(), UnitError>;

type Body = Box<dyn Fn(&mut Invocation<'_>) -> UnitResult + Send + Sync>;

/// Error returned by a unit body.
///
/// The stack trace is captured where the error is created, which is the
/// closest thing to "where the user code failed".
pub struct UnitError {
    message: String,
    trace: String,
}

impl UnitError {
    pub fn msg(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            trace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }

    pub(crate) fn into_parts(self) -> (String, String) {
        (self.message, self.trace)
    }
}

impl<E> From<E> for UnitError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        Self {
            message,
            trace: Backtrace::force_capture().to_string(),
        }
    }
}

impl fmt::Debug for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitError")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    type_id: TypeId,
    type_name: &'static str,
}

impl Param {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Ordered parameter list of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param<T: Any>(mut self) -> Self {
        self.params.push(Param::of::<T>());
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Same parameter count, and every declared type is exactly the runtime
    /// type of the value supplied in that position.
    pub fn accepts(&self, args: &[&dyn Any]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.type_id == (**arg).type_id())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.params.iter().map(|p| p.type_name).collect();
        write!(f, "({})", names.join(", "))
    }
}

/// A named, invocable piece of test code.
pub struct Unit {
    name: String,
    signature: Signature,
    body: Body,
}

impl Unit {
    /// A unit that takes no arguments.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> UnitResult + Send + Sync + 'static,
    {
        Self::with_signature(name, Signature::new(), body)
    }

    /// A unit that takes a single argument of type `T`.
    pub fn with_arg<T, F>(name: impl Into<String>, body: F) -> Self
    where
        T: Any,
        F: Fn(&T, &mut Invocation<'_>) -> UnitResult + Send + Sync + 'static,
    {
        Self::with_signature(name, Signature::new().param::<T>(), move |inv| {
            let arg = inv.arg::<T>(0)?;
            body(arg, inv)
        })
    }

    /// A unit with an arbitrary signature. The body reads its arguments
    /// through [`Invocation::arg`].
    pub fn with_signature<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> UnitResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn call(&self, invocation: &mut Invocation<'_>) -> UnitResult {
        (self.body)(invocation)
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Per-type instances kept alive between invocations.
#[derive(Default)]
pub struct ObjectCache {
    entries: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl ObjectCache {
    pub fn get_or_default<T: Any + Default + Send>(&mut self) -> &mut T {
        let slot = self
            .entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        if !slot.is::<T>() {
            *slot = Box::new(T::default());
        }
        match slot.downcast_mut::<T>() {
            Some(instance) => instance,
            None => unreachable!("cache slot for {} holds another type", type_name::<T>()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// What a unit body sees while it runs.
pub struct Invocation<'a> {
    args: &'a [&'a dyn Any],
    messages: &'a mut Vec<String>,
    cache: &'a mut ObjectCache,
}

impl<'a> Invocation<'a> {
    pub fn new(
        args: &'a [&'a dyn Any],
        messages: &'a mut Vec<String>,
        cache: &'a mut ObjectCache,
    ) -> Self {
        Self {
            args,
            messages,
            cache,
        }
    }

    /// Argument at `index`, downcast to `T`.
    pub fn arg<T: Any>(&self, index: usize) -> Result<&'a T, UnitError> {
        let args: &'a [&'a dyn Any] = self.args;
        args.get(index)
            .and_then(|arg| arg.downcast_ref::<T>())
            .ok_or_else(|| {
                UnitError::msg(format!(
                    "argument {} is missing or is not a {}",
                    index,
                    type_name::<T>()
                ))
            })
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Buffer a diagnostic message for the orchestrator.
    pub fn write_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Instance of `T` shared by every invocation until the cache is cleared.
    pub fn instance<T: Any + Default + Send>(&mut self) -> &mut T {
        self.cache.get_or_default::<T>()
    }
}
