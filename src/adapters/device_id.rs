//! Device identity source.
//!
//! The EUI-64 comes from, in order of preference:
//! 1. a commissioned value stored in NVS,
//! 2. the factory eFuse MAC, expanded to EUI-64 with the `ff:fe` infix.
//!
//! The host simulation uses a fixed EUI so tests get stable topic and
//! client-id strings.

use log::info;

use crate::adapters::nvs::NvsAdapter;
use crate::identity::DeviceEui;

/// EUI used by the host simulation.
#[cfg(not(target_os = "espidf"))]
const SIM_EUI: DeviceEui = DeviceEui([0xF4, 0xCE, 0x36, 0xFF, 0xFE, 0x00, 0x00, 0x01]);

/// Resolve this node's EUI-64.
pub fn device_eui(nvs: &NvsAdapter) -> DeviceEui {
    if let Some(eui) = nvs.load_eui() {
        info!("Device EUI (commissioned): {eui}");
        return eui;
    }

    let eui = factory_eui();
    info!("Device EUI (factory): {eui}");
    eui
}

#[cfg(target_os = "espidf")]
fn factory_eui() -> DeviceEui {
    let mut mac = [0u8; 6];
    // SAFETY: esp_efuse_mac_get_default writes exactly 6 bytes.
    let ret = unsafe { esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) };
    if ret != esp_idf_svc::sys::ESP_OK {
        // A node without a readable MAC still needs a stable-ish id.
        return DeviceEui([0, 0, 0, 0xFF, 0xFE, 0, 0, 0]);
    }
    DeviceEui([
        mac[0], mac[1], mac[2], 0xFF, 0xFE, mac[3], mac[4], mac[5],
    ])
}

#[cfg(not(target_os = "espidf"))]
fn factory_eui() -> DeviceEui {
    SIM_EUI
}
