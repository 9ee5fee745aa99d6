//! Fuzz the NMEA sentence parser with arbitrary receiver output.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = core::str::from_utf8(data) {
        let _ = fieldtracker::gnss::nmea::parse(line);
    }
});
