//! Method executor: single invocations, hook sequences and cache resets.

use crate::config::ExecutorConfig;
use crate::runtime::capture::{DisplayCapture, ScreenshotChain};
use crate::runtime::context::ExecutionContext;
use crate::runtime::failure::Failure;
use crate::runtime::invoker::catch_panic;
use crate::runtime::result::{elapsed_ms, ExecutionResult};
use crate::runtime::unit::Unit;
use std::any::Any;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs units against an [`ExecutionContext`] and reports every outcome as an
/// [`ExecutionResult`].
///
/// Nothing raised by a unit, or by the context while running it, escapes
/// [`execute`](Self::execute) or [`execute_hooks`](Self::execute_hooks).
pub struct MethodExecutor<C> {
    context: C,
    screenshots: ScreenshotChain,
}

impl<C: ExecutionContext> MethodExecutor<C> {
    pub fn new(context: C, config: &ExecutorConfig) -> Self {
        Self {
            context,
            screenshots: ScreenshotChain::new(config.screenshot.clone()),
        }
    }

    /// Replace the display capture used when the context has no native one.
    pub fn with_display_capture(mut self, display: Box<dyn DisplayCapture>) -> Self {
        let setting = self.screenshots.setting().clone();
        self.screenshots = ScreenshotChain::with_fallback(setting, display);
        self
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// Execute a single unit with `args`.
    ///
    /// On failure `execution_time_ms` is measured when the result is built,
    /// after the screenshot attempt, so it includes capture time.
    #[tracing::instrument(skip_all, fields(unit = unit.name()))]
    pub fn execute(&mut self, unit: &Unit, args: &[&dyn Any]) -> ExecutionResult {
        let started = Instant::now();

        let context = &mut self.context;
        let attempt = catch_panic(|| context.execute_method(unit, args))
            .map_err(Failure::from)
            .and_then(|outcome| outcome);
        // Drained exactly once, whatever the attempt did.
        let drained = catch_panic(|| context.pending_messages()).map_err(Failure::from);

        let (failure, messages) = match (attempt, drained) {
            (Ok(()), Ok(messages)) => {
                debug!(messages = messages.len(), "Unit succeeded");
                return ExecutionResult::success(elapsed_ms(started), messages);
            }
            (Err(failure), Ok(messages)) => (failure, messages),
            (Ok(()), Err(drain_failure)) => (drain_failure, Vec::new()),
            (Err(failure), Err(drain_failure)) => {
                warn!(error = %drain_failure, "Draining messages failed");
                (failure, Vec::new())
            }
        };

        let origin = failure.into_origin();
        warn!(error = %origin.message, "Unit failed");
        let screenshot = self.screenshots.capture(&mut self.context);

        ExecutionResult::failure(origin, elapsed_ms(started), messages, screenshot)
    }

    /// Execute `hooks` in order, stopping at the first failure.
    ///
    /// A hook receives `context` when its signature is exactly one parameter
    /// of type `T`; every other hook is invoked without arguments.
    pub fn execute_hooks<'u, T, I>(&mut self, hooks: I, context: &T) -> ExecutionResult
    where
        T: Any,
        I: IntoIterator<Item = &'u Unit>,
    {
        let started = Instant::now();
        let context: &dyn Any = context;
        let with_context = std::slice::from_ref(&context);

        let mut executed = 0usize;
        for hook in hooks {
            let args: &[&dyn Any] = if hook.signature().accepts(with_context) {
                with_context
            } else {
                &[]
            };
            debug!(hook = hook.name(), with_context = !args.is_empty(), "Executing hook");

            let result = self.execute(hook, args);
            executed += 1;
            if result.failed {
                warn!(hook = hook.name(), executed, "Hook failed, skipping the rest");
                return ExecutionResult {
                    execution_time_ms: elapsed_ms(started),
                    ..result
                };
            }
        }

        info!(executed, "Hooks completed");
        ExecutionResult::success(elapsed_ms(started), Vec::new())
    }

    /// Reset cached unit state in the context.
    pub fn clear_cache(&mut self) {
        debug!("Clearing object cache");
        self.context.clear_object_cache();
    }
}
