#![no_main]

use libfuzzer_sys::fuzz_target;
use step_executor::protocol::{ExecutorRequest, ProtoExecutionResult};

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<ExecutorRequest>(data);
    let _ = serde_json::from_slice::<ProtoExecutionResult>(data);
});
