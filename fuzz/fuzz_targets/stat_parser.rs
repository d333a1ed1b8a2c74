#![no_main]

use libfuzzer_sys::fuzz_target;
use percore::accounting::{parse_stat_line, parse_uptime};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Neither parser may panic on arbitrary input
        let _ = parse_stat_line(input, 1);
        if let Ok(uptime) = parse_uptime(input) {
            assert!(uptime.is_finite() && uptime >= 0.0);
        }
    }
});
