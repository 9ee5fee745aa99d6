//! Fuzz the Location and Speed payload decoder.
//!
//! The decoder consumes raw GATT values straight off the radio, so it
//! must never panic, whatever the peer sends.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(fix) = fieldtracker::ble::loc_speed::decode(data) {
        // Presence flags gate every field; a decoded fix with the
        // location flag clear must leave the coordinates untouched.
        if !fix.location_present {
            assert_eq!(fix.latitude, 0);
            assert_eq!(fix.longitude, 0);
        }
    }
});
