//! Node configuration parameters
//!
//! All tunable parameters for the tracker node.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- BLE / LNS ---
    /// Peer scan window (milliseconds)
    pub ble_scan_window_ms: u16,
    /// Peer scan interval (milliseconds)
    pub ble_scan_interval_ms: u16,
    /// Location and Speed poll interval for servers without
    /// notification support (milliseconds)
    pub lns_read_interval_ms: u32,

    // --- Telemetry ---
    /// Status report publish interval (seconds)
    pub publish_interval_secs: u32,
    /// Gateway session keepalive (seconds)
    pub keepalive_secs: u16,
    /// Gateway request retransmission count
    pub retransmit_count: u8,
    /// Gateway request retransmission timeout (seconds)
    pub retransmit_timeout_secs: u16,

    // --- GNSS ---
    /// GNSS receiver UART baud rate
    pub gnss_baud: u32,

    // --- Timing ---
    /// Main loop tick interval (milliseconds)
    pub tick_interval_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // BLE
            ble_scan_window_ms: 30,
            ble_scan_interval_ms: 60,
            lns_read_interval_ms: 30_000,

            // Telemetry
            publish_interval_secs: 10,
            keepalive_secs: 30,
            retransmit_count: 3,
            retransmit_timeout_secs: 10,

            // GNSS
            gnss_baud: 9600,

            // Timing
            tick_interval_ms: 100,
        }
    }
}

impl NodeConfig {
    /// Range-check every field.  Returns the offending field name on
    /// failure so storage adapters can reject bad blobs before persisting.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.ble_scan_window_ms == 0 || self.ble_scan_window_ms > self.ble_scan_interval_ms {
            return Err("ble_scan_window_ms must be 1..=scan_interval");
        }
        if self.lns_read_interval_ms == 0 {
            return Err("lns_read_interval_ms must be positive");
        }
        if self.publish_interval_secs == 0 {
            return Err("publish_interval_secs must be positive");
        }
        if self.keepalive_secs == 0 {
            return Err("keepalive_secs must be positive");
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be positive");
        }
        Ok(())
    }
}
