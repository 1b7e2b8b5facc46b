//! Capability surface of the environment that actually runs units.

use crate::runtime::failure::Failure;
use crate::runtime::unit::Unit;
use std::any::Any;

/// Isolated environment in which units are invoked.
///
/// Implementations buffer diagnostic output produced by a unit until
/// [`pending_messages`](ExecutionContext::pending_messages) drains it.
pub trait ExecutionContext {
    /// Run `unit` with `args`. The returned failure may be wrapped by the
    /// invocation mechanism.
    fn execute_method(&mut self, unit: &Unit, args: &[&dyn Any]) -> Result<(), Failure>;

    /// Drain every message buffered since the previous drain, in emission order.
    fn pending_messages(&mut self) -> Vec<String>;

    /// Drop cached unit state so the next invocation starts fresh.
    fn clear_object_cache(&mut self);

    /// Native screen capture, if this environment has one. `None` means
    /// unavailable or failed.
    fn try_screen_capture(&mut self) -> Option<Vec<u8>>;
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Box<C> {
    fn execute_method(&mut self, unit: &Unit, args: &[&dyn Any]) -> Result<(), Failure> {
        (**self).execute_method(unit, args)
    }

    fn pending_messages(&mut self) -> Vec<String> {
        (**self).pending_messages()
    }

    fn clear_object_cache(&mut self) {
        (**self).clear_object_cache()
    }

    fn try_screen_capture(&mut self) -> Option<Vec<u8>> {
        (**self).try_screen_capture()
    }
}
