//! Unified error types for the tracker firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the top-level loop's error handling uniform.  All variants are `Copy`
//! so they can be cheaply carried through callbacks without allocation.

use core::fmt;

use crate::app::ports::{GattError, PublishError};
use crate::ble::lns::LnsError;
use crate::gnss::nmea::NmeaError;
use crate::identity::IdentityError;

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// LNS client operation failed.
    Lns(LnsError),
    /// Raw GATT transport failure.
    Gatt(GattError),
    /// Gateway session or publish failure.
    Publish(PublishError),
    /// GNSS sentence could not be parsed.
    Gnss(NmeaError),
    /// Commissioning value could not be parsed.
    Identity(IdentityError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lns(e) => write!(f, "lns: {e}"),
            Self::Gatt(e) => write!(f, "gatt: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Gnss(e) => write!(f, "gnss: {e}"),
            Self::Identity(e) => write!(f, "identity: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl From<LnsError> for Error {
    fn from(e: LnsError) -> Self {
        Self::Lns(e)
    }
}

impl From<GattError> for Error {
    fn from(e: GattError) -> Self {
        Self::Gatt(e)
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

impl From<NmeaError> for Error {
    fn from(e: NmeaError) -> Self {
        Self::Gnss(e)
    }
}

impl From<IdentityError> for Error {
    fn from(e: IdentityError) -> Self {
        Self::Identity(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
