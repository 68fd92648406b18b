#![no_main]

use libfuzzer_sys::fuzz_target;
use tessel_lower::{KernelRequest, RuleTable};

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // Parsing and lowering arbitrary requests should never panic.
        if let Ok(request) = KernelRequest::from_json(source) {
            let _ = request.lower(&RuleTable::with_builtins());
        }
    }
});
