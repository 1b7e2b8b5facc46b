//! In-process execution context with panic isolation.
//!
//! This module contains the hot path for actually *calling* a unit. It wires
//! together:
//! - A process-wide panic hook that records the message and backtrace of a
//!   panic raised on a thread that is currently invoking a unit.
//! - [`std::panic::catch_unwind`] around the unit body.
//! - The message buffer and object cache the unit sees through
//!   [`Invocation`].

use crate::runtime::context::ExecutionContext;
use crate::runtime::failure::Failure;
use crate::runtime::unit::{Invocation, ObjectCache, Unit};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::debug;

type NativeCapture = Box<dyn FnMut() -> Option<Vec<u8>> + Send>;

/// Runs units in the current process, turning errors and panics into
/// wrapped [`Failure`]s.
#[derive(Default)]
pub struct Sandbox {
    messages: Vec<String>,
    cache: ObjectCache,
    native_capture: Option<NativeCapture>,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `capture` as this context's native screen capture.
    pub fn with_native_capture<F>(mut self, capture: F) -> Self
    where
        F: FnMut() -> Option<Vec<u8>> + Send + 'static,
    {
        self.native_capture = Some(Box::new(capture));
        self
    }

    /// Number of cached unit instances.
    pub fn cached_instances(&self) -> usize {
        self.cache.len()
    }
}

impl ExecutionContext for Sandbox {
    fn execute_method(&mut self, unit: &Unit, args: &[&dyn Any]) -> Result<(), Failure> {
        if !unit.signature().accepts(args) {
            return Err(Failure::user_code(
                format!(
                    "`{}` expects arguments {} but was given {}",
                    unit.name(),
                    unit.signature(),
                    args.len()
                ),
                Backtrace::force_capture().to_string(),
            ));
        }

        debug!(unit = unit.name(), args = args.len(), "Invoking unit");
        let mut invocation = Invocation::new(args, &mut self.messages, &mut self.cache);
        let wrapper = || format!("invocation of `{}` failed", unit.name());

        match catch_panic(|| unit.call(&mut invocation)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                let (message, trace) = err.into_parts();
                Err(Failure::user_code(message, trace).wrap(wrapper()))
            }
            Err(panic) => Err(Failure::from(panic).wrap(wrapper())),
        }
    }

    fn pending_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    fn clear_object_cache(&mut self) {
        self.cache.clear();
    }

    fn try_screen_capture(&mut self) -> Option<Vec<u8>> {
        self.native_capture.as_mut().and_then(|capture| capture())
    }
}

/// Message and backtrace of a caught panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPanic {
    pub message: String,
    pub trace: String,
}

impl From<CapturedPanic> for Failure {
    fn from(panic: CapturedPanic) -> Self {
        Failure::user_code(panic.message, panic.trace)
    }
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !CAPTURING.with(Cell::get) {
                previous(info);
                return;
            }
            let mut trace = String::new();
            if let Some(location) = info.location() {
                trace.push_str(&format!(
                    "at {}:{}:{}\n",
                    location.file(),
                    location.line(),
                    location.column()
                ));
            }
            trace.push_str(&Backtrace::force_capture().to_string());
            let captured = CapturedPanic {
                message: payload_message(info.payload()),
                trace,
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(captured));
        }));
    });
}

/// Run `f`, converting a panic into a [`CapturedPanic`]. The default panic
/// output is suppressed for panics caught here.
///
/// The hook's record is only trusted when it describes the payload that
/// actually unwound out of `f`. Panics caught inside `f`, or payloads raised
/// with [`panic::resume_unwind`] (which skips the hook), fall back to the
/// payload itself.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, CapturedPanic> {
    install_hook();
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let was_capturing = CAPTURING.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|flag| flag.set(was_capturing));
    let recorded = LAST_PANIC.with(|slot| slot.borrow_mut().take());

    outcome.map_err(|payload| {
        let message = payload_message(payload.as_ref());
        match recorded {
            Some(captured) if captured.message == message => captured,
            _ => CapturedPanic {
                message,
                trace: String::new(),
            },
        }
    })
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::unit::UnitError;

    #[derive(Default)]
    struct Counter(u32);

    #[test]
    fn successful_unit_buffers_messages() {
        let mut sandbox = Sandbox::new();
        let unit = Unit::new("greet", |inv| {
            inv.write_message("hello");
            inv.write_message("world");
            Ok(())
        });

        sandbox.execute_method(&unit, &[]).unwrap();
        assert_eq!(sandbox.pending_messages(), vec!["hello", "world"]);
        assert!(sandbox.pending_messages().is_empty());
    }

    #[test]
    fn unit_error_is_wrapped_by_invocation() {
        let mut sandbox = Sandbox::new();
        let unit = Unit::new("fails", |_| Err(UnitError::msg("expected 3, got 4")));

        let failure = sandbox.execute_method(&unit, &[]).unwrap_err();
        assert!(failure.is_wrapped());
        assert!(failure.to_string().starts_with("invocation of `fails` failed"));
        assert_eq!(failure.into_origin().message, "expected 3, got 4");
    }

    #[test]
    fn panic_is_caught_with_location() {
        let mut sandbox = Sandbox::new();
        let unit = Unit::new("panics", |_| panic!("assertion blew up"));

        let origin = sandbox.execute_method(&unit, &[]).unwrap_err().into_origin();
        assert_eq!(origin.message, "assertion blew up");
        assert!(origin.trace.contains("invoker.rs"), "{}", origin.trace);
    }

    #[test]
    fn messages_written_before_panic_survive() {
        let mut sandbox = Sandbox::new();
        let unit = Unit::new("partial", |inv| {
            inv.write_message("step 1 done");
            panic!("step 2 broke");
        });

        assert!(sandbox.execute_method(&unit, &[]).is_err());
        assert_eq!(sandbox.pending_messages(), vec!["step 1 done"]);
    }

    #[test]
    fn signature_mismatch_is_reported_unwrapped() {
        let mut sandbox = Sandbox::new();
        let unit = Unit::with_arg::<u32, _>("typed", |_, _| Ok(()));

        let failure = sandbox.execute_method(&unit, &[&"wrong"]).unwrap_err();
        assert!(!failure.is_wrapped());
        assert!(failure.to_string().contains("`typed` expects arguments"));
    }

    #[test]
    fn cached_instances_persist_until_cleared() {
        let mut sandbox = Sandbox::new();
        let unit = Unit::new("count", |inv| {
            let counter = inv.instance::<Counter>();
            counter.0 += 1;
            let value = counter.0;
            inv.write_message(value.to_string());
            Ok(())
        });

        sandbox.execute_method(&unit, &[]).unwrap();
        sandbox.execute_method(&unit, &[]).unwrap();
        assert_eq!(sandbox.cached_instances(), 1);
        sandbox.clear_object_cache();
        sandbox.clear_object_cache();
        assert_eq!(sandbox.cached_instances(), 0);
        sandbox.execute_method(&unit, &[]).unwrap();

        assert_eq!(sandbox.pending_messages(), vec!["1", "2", "1"]);
    }

    #[test]
    fn native_capture_is_optional() {
        assert_eq!(Sandbox::new().try_screen_capture(), None);
        let mut sandbox = Sandbox::new().with_native_capture(|| Some(vec![1, 2, 3]));
        assert_eq!(sandbox.try_screen_capture(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn resumed_payload_is_not_confused_with_an_earlier_caught_panic() {
        let mut sandbox = Sandbox::new();
        let checks_panic = Unit::new("expects_panic", |inv| {
            let inner = panic::catch_unwind(|| panic!("deliberate inner panic"));
            inv.write_message(format!("inner panicked: {}", inner.is_err()));
            Ok(())
        });
        let resumes = Unit::new("resumes", |_| panic::resume_unwind(Box::new("real failure")));

        sandbox.execute_method(&checks_panic, &[]).unwrap();
        let origin = sandbox.execute_method(&resumes, &[]).unwrap_err().into_origin();
        assert_eq!(origin.message, "real failure");
        assert!(!origin.trace.contains("deliberate inner panic"));
        assert_eq!(sandbox.pending_messages(), vec!["inner panicked: true"]);
    }

    #[test]
    fn caught_then_resumed_within_one_unit_reports_resumed_payload() {
        let mut sandbox = Sandbox::new();
        let unit = Unit::new("both", |_| {
            let _ = panic::catch_unwind(|| panic!("swallowed"));
            panic::resume_unwind(Box::new(String::from("surfaced")))
        });

        let origin = sandbox.execute_method(&unit, &[]).unwrap_err().into_origin();
        assert_eq!(origin.message, "surfaced");
        assert!(origin.trace.is_empty());
    }

    #[test]
    fn catch_panic_passes_values_through() {
        assert_eq!(catch_panic(|| 42), Ok(42));
        let caught = catch_panic(|| -> u8 { panic!("{} apples", 3) }).unwrap_err();
        assert_eq!(caught.message, "3 apples");
    }
}
