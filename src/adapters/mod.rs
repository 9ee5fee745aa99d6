//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements      | Connects to                    |
//! |---------------|-----------------|--------------------------------|
//! | `ble_central` | GattPort        | BLE central / LNS peripheral   |
//! | `gateway`     | PublishPort     | MQTT-SN gateway over UDP       |
//! | `gnss_uart`   | (feeds GNSS)    | GNSS receiver UART             |
//! | `log_sink`    | EventSink       | Serial log output              |
//! | `nvs`         | ConfigPort      | NVS / in-memory store          |
//! |               | StoragePort     |                                |
//! | `device_id`   | —               | eFuse MAC / stored EUI         |
//! | `time`        | —               | ESP32 system timer             |

pub mod ble_central;
pub mod device_id;
pub mod gateway;
pub mod gnss_uart;
pub mod log_sink;
pub mod nvs;
pub mod time;
