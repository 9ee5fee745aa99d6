//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the LNS client, the telemetry publisher, and the
//! GNSS snapshot.  It exposes a clean, hardware-agnostic API; all I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!   GattPort ◀── ┌────────────────────────┐ ──▶ EventSink
//!                │       AppService        │
//! PublishPort ◀──│  LNS · Publisher · GNSS │
//!                └────────────────────────┘
//! ```

use log::{error, info};

use crate::ble::discovery::DiscoveredService;
use crate::ble::lns::{FixCallback, LnsClient};
use crate::ble::loc_speed::LocationFix;
use crate::config::NodeConfig;
use crate::events::{push_event, Event};
use crate::gnss::nmea::{GgaData, RmcData};
use crate::gnss::GnssDelegate;
use crate::identity::DeviceEui;
use crate::mesh::Role;
use crate::publish::Publisher;

use super::events::{AppEvent, FixSummary};
use super::ports::{EventSink, GattPort, PublishPort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: NodeConfig,
    lns: LnsClient,
    publisher: Publisher,
    role: Role,
    /// Altitude from the last GGA frame with a fix, metres.
    gnss_altitude_m: f32,
    /// Last RMC frame, kept for diagnostics.
    last_gnss: Option<RmcData>,
}

impl AppService {
    pub fn new(config: NodeConfig, eui: DeviceEui) -> Self {
        let publisher = Publisher::new(eui, &config);
        Self {
            config,
            lns: LnsClient::new(),
            publisher,
            role: Role::Detached,
            gnss_altitude_m: 0.0,
            last_gnss: None,
        }
    }

    /// Announce startup.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started);
        info!("Tracker service started");
    }

    // ── Discovery and delivery-mode selection ─────────────────

    /// Consume a completed discovery and arm exactly one delivery path.
    ///
    /// Notifications win when the server supports them; otherwise the
    /// Location and Speed value is polled at the configured interval.
    pub fn on_discovery_complete(
        &mut self,
        svc: &DiscoveredService,
        now_ms: u64,
        gatt: &mut impl GattPort,
        sink: &mut impl EventSink,
    ) {
        if let Err(e) = self.lns.assign_handles(svc) {
            error!("Handle resolution failed: {e}");
            sink.emit(&AppEvent::PeerUnusable);
            return;
        }

        let notifications = self.lns.notify_supported();
        let armed = if notifications {
            self.lns.subscribe(gatt, delivery_callback())
        } else {
            info!(
                "Server has no notification support; polling every {} ms",
                self.config.lns_read_interval_ms
            );
            self.lns
                .start_periodic_read(now_ms, self.config.lns_read_interval_ms, delivery_callback())
        };

        match armed {
            Ok(()) => sink.emit(&AppEvent::DeliveryModeSelected { notifications }),
            Err(e) => {
                error!("Could not arm fix delivery: {e}");
                sink.emit(&AppEvent::PeerUnusable);
            }
        }
    }

    /// Peer disconnected; invalidate the client eagerly.
    pub fn on_peer_disconnected(&mut self, sink: &mut impl EventSink) {
        self.lns.handle_disconnect();
        sink.emit(&AppEvent::PeerDisconnected);
    }

    // ── Pass-through into the LNS client ──────────────────────

    /// Value notification from the BLE adapter.
    pub fn on_notification(&mut self, data: &[u8]) {
        self.lns.handle_notification(data);
    }

    /// Read completion from the BLE adapter.
    pub fn on_read_complete(
        &mut self,
        now_ms: u64,
        result: Result<&[u8], super::ports::GattError>,
    ) {
        self.lns.handle_read_complete(now_ms, result);
    }

    /// Main loop tick; drives the poll scheduler.
    pub fn poll_tick(&mut self, now_ms: u64, gatt: &mut impl GattPort) {
        self.lns.poll_tick(now_ms, gatt);
    }

    // ── Telemetry ─────────────────────────────────────────────

    /// Publish timer fired: drive the gateway session.
    pub fn publish_tick(
        &mut self,
        port: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) -> crate::error::Result<()> {
        let before = self.publisher.state();
        let fix = self.lns.last_fix();
        let outcome = self.publisher.publish_tick(port, &fix, self.gnss_altitude_m);
        let after = self.publisher.state();
        if after != before {
            sink.emit(&AppEvent::SessionChanged(after));
        }
        outcome.map_err(crate::error::Error::from)
    }

    /// Gateway search answered.
    pub fn on_gateway_found(&mut self, port: &mut impl PublishPort, sink: &mut impl EventSink) {
        let before = self.publisher.state();
        self.publisher.on_gateway_found(port);
        self.emit_session_change(before, sink);
    }

    /// Gateway CONNECT acknowledged or rejected.
    pub fn on_connect_ack(
        &mut self,
        accepted: bool,
        port: &mut impl PublishPort,
        sink: &mut impl EventSink,
    ) {
        let before = self.publisher.state();
        self.publisher.on_connect_ack(accepted, port);
        self.emit_session_change(before, sink);
    }

    /// Topic REGISTER acknowledged or rejected.
    pub fn on_register_ack(&mut self, accepted: bool, topic_id: u16, sink: &mut impl EventSink) {
        let before = self.publisher.state();
        self.publisher.on_register_ack(accepted, topic_id);
        self.emit_session_change(before, sink);
    }

    /// PUBLISH acknowledged.  A rejection means the gateway dropped our
    /// registration, so the session restarts.
    pub fn on_publish_ack(&mut self, accepted: bool, sink: &mut impl EventSink) {
        if accepted {
            self.publisher.on_published();
        } else {
            self.on_session_lost(sink);
        }
    }

    /// Gateway session dropped.
    pub fn on_session_lost(&mut self, sink: &mut impl EventSink) {
        let before = self.publisher.state();
        self.publisher.on_session_lost();
        self.emit_session_change(before, sink);
    }

    fn emit_session_change(&self, before: crate::publish::SessionState, sink: &mut impl EventSink) {
        let after = self.publisher.state();
        if after != before {
            sink.emit(&AppEvent::SessionChanged(after));
        }
    }

    // ── Mesh role ─────────────────────────────────────────────

    /// Role change from the mesh stack.  Returns the decoded role so
    /// the caller can update the LED indicator.
    pub fn on_role_changed(&mut self, raw: u8, sink: &mut impl EventSink) -> Role {
        let role = Role::from_raw(raw);
        if role != self.role {
            info!("Mesh role: {role}");
            let was_attached = self.role.attached();
            self.role = role;
            sink.emit(&AppEvent::RoleChanged(role));
            if role.attached() && !was_attached {
                // Just joined the mesh: look for a gateway right away
                // instead of waiting out the publish interval.
                push_event(Event::PublishTick);
            }
        }
        role
    }

    // ── Queries ───────────────────────────────────────────────

    /// Presence-filtered view of the last fix.
    pub fn fix_summary(&self) -> FixSummary {
        FixSummary::from(&self.lns.last_fix())
    }

    /// Last decoded fix from the tracked peer.
    pub fn last_fix(&self) -> LocationFix {
        self.lns.last_fix()
    }

    /// Last RMC frame from the on-board receiver, if any arrived yet.
    pub fn last_gnss(&self) -> Option<RmcData> {
        self.last_gnss
    }

    /// Current mesh role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> NodeConfig {
        self.config.clone()
    }
}

impl GnssDelegate for AppService {
    fn on_rmc(&mut self, frame: &RmcData) {
        self.last_gnss = Some(*frame);
    }

    fn on_gga(&mut self, frame: &GgaData) {
        // Altitude from a receiver without a fix is noise.
        if frame.fix_quality > 0 {
            self.gnss_altitude_m = frame.altitude_m;
        }
    }
}

/// Delivery callback shared by the notification and polling paths.
///
/// Runs in the BLE stack's callback context, so it only logs and posts
/// to the event queue; the main loop does the rest.
fn delivery_callback() -> FixCallback {
    Box::new(|fix| match fix {
        Some(fix) => {
            let summary = FixSummary::from(fix);
            info!(
                "Fix: speed {:?}, lat {:?}, lon {:?}",
                summary.speed, summary.latitude, summary.longitude
            );
            push_event(Event::FixUpdated);
        }
        None => {
            info!("Fix delivery aborted by server");
            push_event(Event::FixAborted);
        }
    })
}
