//! Wire messages exchanged with the orchestrator, and a JSON-lines session.

use crate::registry::{HookContext, HookKind, UnitRegistry};
use crate::runtime::{ExecutionContext, ExecutionResult, MethodExecutor};
use crate::ExecutorError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Wire form of [`ExecutionResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtoExecutionResult {
    pub failed: bool,
    pub execution_time: u64,
    #[serde(default)]
    pub message: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub screen_shot: Option<Vec<u8>>,
    pub recoverable_error: bool,
}

impl From<ExecutionResult> for ProtoExecutionResult {
    fn from(result: ExecutionResult) -> Self {
        Self {
            failed: result.failed,
            execution_time: result.execution_time_ms,
            message: result.messages,
            error_message: result.error_message,
            stack_trace: result.stack_trace,
            screen_shot: result.screenshot,
            recoverable_error: result.recoverable_error,
        }
    }
}

impl From<ProtoExecutionResult> for ExecutionResult {
    fn from(proto: ProtoExecutionResult) -> Self {
        Self {
            failed: proto.failed,
            execution_time_ms: proto.execution_time,
            messages: proto.message,
            error_message: proto.error_message,
            stack_trace: proto.stack_trace,
            screenshot: proto.screen_shot,
            recoverable_error: proto.recoverable_error,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|encoded| STANDARD.decode(encoded).map_err(D::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutorRequest {
    ExecuteStep {
        step: String,
        #[serde(default)]
        args: Vec<String>,
    },
    ExecuteHooks {
        kind: HookKind,
        #[serde(default)]
        context: HookContext,
    },
    ClearCache,
    Kill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutorResponse {
    ExecutionStatus(ProtoExecutionResult),
    Ok,
    Error { message: String },
}

/// Dispatches requests to a [`MethodExecutor`] using a [`UnitRegistry`].
pub struct Session<C> {
    executor: MethodExecutor<C>,
    registry: UnitRegistry,
}

impl<C: ExecutionContext> Session<C> {
    pub fn new(executor: MethodExecutor<C>, registry: UnitRegistry) -> Self {
        Self { executor, registry }
    }

    pub fn executor(&self) -> &MethodExecutor<C> {
        &self.executor
    }

    pub fn handle(&mut self, request: ExecutorRequest) -> ExecutorResponse {
        match request {
            ExecutorRequest::ExecuteStep { step, args } => {
                let Some(unit) = self.registry.step(&step) else {
                    warn!(step = %step, "No implementation for step");
                    return ExecutorResponse::Error {
                        message: ExecutorError::UnknownStep(step).to_string(),
                    };
                };
                let args: Vec<&dyn Any> = args.iter().map(|arg| arg as &dyn Any).collect();
                ExecutorResponse::ExecutionStatus(self.executor.execute(unit, &args).into())
            }
            ExecutorRequest::ExecuteHooks { kind, context } => {
                let hooks = self.registry.hooks_for(kind, &context);
                info!(%kind, hooks = hooks.len(), "Executing hooks");
                ExecutorResponse::ExecutionStatus(
                    self.executor.execute_hooks(hooks, &context).into(),
                )
            }
            ExecutorRequest::ClearCache => {
                self.executor.clear_cache();
                ExecutorResponse::Ok
            }
            ExecutorRequest::Kill => ExecutorResponse::Ok,
        }
    }
}

/// Serve JSON-lines requests from `reader` until EOF or a `kill` request,
/// writing one response line per request.
pub fn serve<C, R, W>(session: &mut Session<C>, reader: R, mut writer: W) -> anyhow::Result<()>
where
    C: ExecutionContext,
    R: BufRead,
    W: Write,
{
    for line in reader.lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let (response, stop) = match serde_json::from_str::<ExecutorRequest>(&line) {
            Ok(ExecutorRequest::Kill) => {
                info!("Kill request received");
                (ExecutorResponse::Ok, true)
            }
            Ok(request) => (session.handle(request), false),
            Err(e) => {
                warn!(error = %e, "Malformed request");
                let message = ExecutorError::Protocol(e.to_string()).to_string();
                (ExecutorResponse::Error { message }, false)
            }
        };

        serde_json::to_writer(&mut writer, &response).context("failed to encode response")?;
        writeln!(writer).context("failed to write response")?;
        writer.flush().context("failed to flush response")?;

        if stop {
            break;
        }
    }
    Ok(())
}
