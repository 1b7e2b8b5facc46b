#![no_main]

use libfuzzer_sys::fuzz_target;
use step_executor::registry::normalize_step_text;

fuzz_target!(|text: &str| {
    let once = normalize_step_text(text);
    assert_eq!(normalize_step_text(&once), once);
});
