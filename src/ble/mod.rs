//! Bluetooth LE central-side logic.
//!
//! The node acts as a GATT client for a remote Location and Navigation
//! Service (LNS) peripheral — typically a GNSS puck worn by the asset
//! being tracked.  Scanning, connecting and service discovery are done
//! by the BLE adapter; everything downstream of a completed discovery
//! (handle resolution, delivery-mode selection, payload decoding) lives
//! here and runs unchanged on the host.

pub mod discovery;
pub mod lns;
pub mod loc_speed;

pub use discovery::{ConnId, DiscoveredCharacteristic, DiscoveredDescriptor, DiscoveredService};
pub use lns::{LnsClient, LnsError};
pub use loc_speed::LocationFix;
