//! Fuzz the MQTT-SN gateway frame decoder with arbitrary datagrams.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = fieldtracker::adapters::gateway::decode_frame(data);
});
