//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, count in a test
//! recorder, mirror onto a diagnostics topic.

use crate::mesh::Role;
use crate::publish::SessionState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service finished startup.
    Started,

    /// Handle resolution succeeded and a delivery mode was chosen for
    /// the tracked peer.
    DeliveryModeSelected { notifications: bool },

    /// Handle resolution failed; the peer stays unusable until the
    /// next discovery.
    PeerUnusable,

    /// A Location and Speed value was delivered.
    FixReceived(FixSummary),

    /// The peer delivered the aborted outcome.
    FixAborted,

    /// The tracked peer disconnected.
    PeerDisconnected,

    /// The mesh role changed.
    RoleChanged(Role),

    /// The gateway session moved to a new state.
    SessionChanged(SessionState),
}

/// The fields of a fix worth surfacing, pre-filtered by presence.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixSummary {
    /// 1e-7 degrees; `None` when the location flag was clear.
    pub latitude: Option<i32>,
    /// 1e-7 degrees; `None` when the location flag was clear.
    pub longitude: Option<i32>,
    /// 1/10 m/s; `None` when the speed flag was clear.
    pub speed: Option<u16>,
}

impl From<&crate::ble::loc_speed::LocationFix> for FixSummary {
    fn from(fix: &crate::ble::loc_speed::LocationFix) -> Self {
        Self {
            latitude: fix.location_present.then_some(fix.latitude),
            longitude: fix.location_present.then_some(fix.longitude),
            speed: fix.instant_speed_present.then_some(fix.instant_speed),
        }
    }
}
