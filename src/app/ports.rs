//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (BLE central, mesh networking, storage, event sinks)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! and the LNS client consume them via generics, so the domain core never
//! touches a radio or flash directly.
//!
//! All port operations that talk to a radio are asynchronous requests:
//! `Ok(())` means the request was queued, and the outcome arrives later
//! as an event or a completion method call.

use crate::ble::discovery::ConnId;
use crate::config::NodeConfig;

// ───────────────────────────────────────────────────────────────
// GATT client port (driven adapter: domain → BLE central)
// ───────────────────────────────────────────────────────────────

/// Parameters for a notification subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Handle of the characteristic value to receive notifications for.
    pub value_handle: u16,
    /// Handle of the CCC descriptor to write.
    pub ccc_handle: u16,
    /// When true the subscription is not persisted across reconnects;
    /// the peer forgets it on disconnect and so do we.
    pub volatile: bool,
}

/// Outbound GATT client requests.
///
/// Value notifications and read completions flow back through
/// [`LnsClient::handle_notification`](crate::ble::lns::LnsClient::handle_notification)
/// and [`LnsClient::handle_read_complete`](crate::ble::lns::LnsClient::handle_read_complete).
pub trait GattPort {
    /// Enable value notifications by writing the CCC descriptor.
    fn subscribe(&mut self, conn: ConnId, req: &SubscribeRequest) -> Result<(), GattError>;

    /// Disable value notifications.
    fn unsubscribe(&mut self, conn: ConnId, value_handle: u16) -> Result<(), GattError>;

    /// Issue an attribute read.  At most one read is in flight per
    /// connection; the LNS client enforces this.
    fn read(&mut self, conn: ConnId, handle: u16) -> Result<(), GattError>;
}

/// Errors from [`GattPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattError {
    /// The connection id no longer refers to a live connection.
    ConnectionLost,
    /// The stack rejected the request (bad handle, busy, out of buffers).
    RequestRejected,
    /// The peer answered with an ATT error.
    AttError(u8),
}

impl core::fmt::Display for GattError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::RequestRejected => write!(f, "request rejected by stack"),
            Self::AttError(code) => write!(f, "ATT error 0x{code:02X}"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Publish port (driven adapter: domain → mesh gateway)
// ───────────────────────────────────────────────────────────────

/// Outbound gateway requests for the telemetry publisher.
///
/// The publisher state machine in [`crate::publish`] drives these in
/// sequence (search, connect, register, publish) and advances on the
/// completion events the adapter feeds back.
pub trait PublishPort {
    /// Broadcast a gateway search on the mesh multicast address.
    fn search_gateway(&mut self) -> Result<(), PublishError>;

    /// Open a session with the found gateway.
    fn connect(&mut self, client_id: &str, keepalive_secs: u16) -> Result<(), PublishError>;

    /// Register a topic name, obtaining a short topic id asynchronously.
    fn register_topic(&mut self, topic: &str) -> Result<(), PublishError>;

    /// Publish a payload to a registered topic id.
    fn publish(&mut self, topic_id: u16, payload: &[u8]) -> Result<(), PublishError>;

    /// Tear the session down.
    fn disconnect(&mut self) -> Result<(), PublishError>;
}

/// Errors from [`PublishPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The mesh interface is down or has no route.
    NoNetwork,
    /// The gateway session is not in a state that allows the request.
    BadState,
    /// Payload exceeds the maximum message size.
    TooLarge,
    /// Generic transport failure.
    IoError,
}

impl core::fmt::Display for PublishError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoNetwork => write!(f, "no network"),
            Self::BadState => write!(f, "bad session state"),
            Self::TooLarge => write!(f, "payload too large"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, mesh
/// uplink, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for commissioning parameters and
/// counters (device EUI, join credentials, DevNonce).
///
/// Keys are namespaced to prevent collisions between subsystems, and
/// writes are atomic — the ESP-IDF NVS API guarantees this natively,
/// the in-memory simulation trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
