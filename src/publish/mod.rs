//! Telemetry publisher.
//!
//! Maintains a session with an MQTT-SN style mesh gateway and pushes a
//! JSON status report on every publish tick.  The session advances
//! through a fixed sequence driven entirely by adapter callbacks:
//!
//! ```text
//! Disconnected ─search─▶ Searching ─found─▶ Connecting ─ack─▶ Registering ─ack─▶ Active
//!       ▲                                                                          │
//!       └───────────────────────── lost / rejected ─────────────────────◀──────────┘
//! ```
//!
//! A lost or rejected session falls back to `Lost`; the next publish
//! tick re-starts the gateway search instead of publishing.

use heapless::String;
use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::{PublishError, PublishPort};
use crate::ble::loc_speed::LocationFix;
use crate::config::NodeConfig;
use crate::identity::{DeviceEui, MAX_NAME_LEN};

/// Client id prefix; the device EUI is appended.
pub const CLIENT_PREFIX: &str = "tracker";
/// Topic prefix; the device EUI is appended.
pub const TOPIC_PREFIX: &str = "sensors";

/// Placeholder until battery gauging is wired up.
const BATTERY_PERCENT: u8 = 100;
/// Placeholder until the on-board thermometer is wired up.
const TEMPERATURE_C: f32 = 24.0;
/// Default triage classification reported by a healthy node.
const TRIAGE_STATE: &str = "P1";

/// Gateway session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session and no search in flight.
    Disconnected,
    /// SEARCHGW multicast sent, waiting for a gateway advert.
    Searching,
    /// CONNECT sent, waiting for the ack.
    Connecting,
    /// REGISTER sent, waiting for the topic id.
    Registering,
    /// Session established, topic registered; publishing is possible.
    Active,
    /// Session dropped by the gateway or by a communication error.
    Lost,
}

/// One status report, serialised to JSON for the gateway.
///
/// Field order is the wire order.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Device EUI-64 as lowercase hex.
    pub id: String<16>,
    /// Monotonic report counter, reset on boot.
    pub count: u32,
    /// Triage classification.
    pub status: &'static str,
    /// Battery charge, percent.
    pub batt: u8,
    /// Latitude, 1e-7 degrees, from the tracked peer; `null` when the
    /// fix carried no location.
    pub lat: Option<i32>,
    /// Longitude, 1e-7 degrees, from the tracked peer; `null` when the
    /// fix carried no location.
    pub lon: Option<i32>,
    /// Elevation in metres, from the on-board GNSS receiver.
    pub ele: i32,
    /// Board temperature, Celsius.
    pub temp: f32,
}

/// Gateway session and report generation state.
pub struct Publisher {
    state: SessionState,
    client_id: String<MAX_NAME_LEN>,
    topic: String<MAX_NAME_LEN>,
    id_hex: String<16>,
    keepalive_secs: u16,
    topic_id: Option<u16>,
    count: u32,
}

impl Publisher {
    pub fn new(eui: DeviceEui, config: &NodeConfig) -> Self {
        let mut id_hex = String::new();
        // 16 hex chars always fit.
        let _ = core::fmt::write(&mut id_hex, format_args!("{eui}"));
        Self {
            state: SessionState::Disconnected,
            client_id: eui.client_id(CLIENT_PREFIX),
            topic: eui.topic(TOPIC_PREFIX),
            id_hex,
            keepalive_secs: config.keepalive_secs,
            topic_id: None,
            count: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    // ── Publish tick ──────────────────────────────────────────

    /// Periodic driver.  Re-searches when the session is down,
    /// publishes a report when it is up, and waits otherwise.
    pub fn publish_tick(
        &mut self,
        port: &mut impl PublishPort,
        fix: &LocationFix,
        elevation_m: f32,
    ) -> Result<(), PublishError> {
        match self.state {
            SessionState::Disconnected | SessionState::Lost => {
                warn!("Gateway session down ({:?}); searching", self.state);
                port.search_gateway()?;
                self.state = SessionState::Searching;
                Ok(())
            }
            SessionState::Searching | SessionState::Connecting | SessionState::Registering => {
                // Handshake in flight; try again next tick.
                debug!("Gateway handshake in progress ({:?})", self.state);
                Ok(())
            }
            SessionState::Active => {
                let Some(topic_id) = self.topic_id else {
                    warn!("Active session without a topic id");
                    return Err(PublishError::BadState);
                };
                let report = self.make_report(fix, elevation_m);
                let payload =
                    serde_json::to_vec(&report).map_err(|_| PublishError::TooLarge)?;
                info!("Publishing {} bytes", payload.len());
                port.publish(topic_id, &payload)
            }
        }
    }

    fn make_report(&mut self, fix: &LocationFix, elevation_m: f32) -> StatusReport {
        let count = self.count;
        self.count += 1;
        StatusReport {
            id: self.id_hex.clone(),
            count,
            status: TRIAGE_STATE,
            batt: BATTERY_PERCENT,
            // The coordinate fields are meaningful only when the fix
            // carried the location flag.
            lat: fix.location_present.then_some(fix.latitude),
            lon: fix.location_present.then_some(fix.longitude),
            ele: elevation_m as i32,
            temp: TEMPERATURE_C,
        }
    }

    // ── Session callbacks (from the gateway adapter) ──────────

    /// SEARCHGW answered; connect to the advertised gateway.
    pub fn on_gateway_found(&mut self, port: &mut impl PublishPort) {
        debug!("Got search gateway response");
        if let Err(e) = port.connect(self.client_id.as_str(), self.keepalive_secs) {
            warn!("Gateway connect error: {e}");
            self.state = SessionState::Lost;
            return;
        }
        self.state = SessionState::Connecting;
    }

    /// CONNECT acknowledged (or rejected).
    pub fn on_connect_ack(&mut self, accepted: bool, port: &mut impl PublishPort) {
        if !accepted {
            warn!("Gateway connect rejected");
            self.state = SessionState::Lost;
            return;
        }
        debug!("Registering topic: {}", self.topic.as_str());
        if let Err(e) = port.register_topic(self.topic.as_str()) {
            warn!("Topic register error: {e}");
            self.state = SessionState::Lost;
            return;
        }
        self.state = SessionState::Registering;
    }

    /// REGISTER acknowledged with a short topic id (or rejected).
    pub fn on_register_ack(&mut self, accepted: bool, topic_id: u16) {
        if !accepted {
            warn!("Topic register rejected");
            self.state = SessionState::Lost;
            return;
        }
        self.topic_id = Some(topic_id);
        self.state = SessionState::Active;
        info!("Gateway session active, topic id {topic_id}");
    }

    /// PUBLISH acknowledged.
    pub fn on_published(&mut self) {
        debug!("Published");
    }

    /// Session dropped by the gateway or by a keepalive timeout.
    pub fn on_session_lost(&mut self) {
        warn!("Gateway session lost");
        self.state = SessionState::Lost;
        self.topic_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::PublishError;

    #[derive(Debug, Clone, PartialEq)]
    enum PortCall {
        Search,
        Connect(std::string::String, u16),
        Register(std::string::String),
        Publish(u16, std::vec::Vec<u8>),
        Disconnect,
    }

    #[derive(Default)]
    struct MockPort {
        calls: Vec<PortCall>,
        fail_search: bool,
    }

    impl PublishPort for MockPort {
        fn search_gateway(&mut self) -> Result<(), PublishError> {
            self.calls.push(PortCall::Search);
            if self.fail_search {
                Err(PublishError::NoNetwork)
            } else {
                Ok(())
            }
        }
        fn connect(&mut self, client_id: &str, keepalive_secs: u16) -> Result<(), PublishError> {
            self.calls
                .push(PortCall::Connect(client_id.into(), keepalive_secs));
            Ok(())
        }
        fn register_topic(&mut self, topic: &str) -> Result<(), PublishError> {
            self.calls.push(PortCall::Register(topic.into()));
            Ok(())
        }
        fn publish(&mut self, topic_id: u16, payload: &[u8]) -> Result<(), PublishError> {
            self.calls.push(PortCall::Publish(topic_id, payload.into()));
            Ok(())
        }
        fn disconnect(&mut self) -> Result<(), PublishError> {
            self.calls.push(PortCall::Disconnect);
            Ok(())
        }
    }

    fn publisher() -> Publisher {
        let eui = DeviceEui::from_hex("f4:ce:36:00:00:00:00:01").unwrap();
        Publisher::new(eui, &NodeConfig::default())
    }

    fn fix(lat: i32, lon: i32) -> LocationFix {
        LocationFix {
            location_present: true,
            latitude: lat,
            longitude: lon,
            ..LocationFix::default()
        }
    }

    #[test]
    fn full_session_handshake_reaches_active() {
        let mut p = publisher();
        let mut port = MockPort::default();

        p.publish_tick(&mut port, &fix(1, 2), 0.0).unwrap();
        assert_eq!(p.state(), SessionState::Searching);

        p.on_gateway_found(&mut port);
        assert_eq!(p.state(), SessionState::Connecting);
        p.on_connect_ack(true, &mut port);
        assert_eq!(p.state(), SessionState::Registering);
        p.on_register_ack(true, 42);
        assert_eq!(p.state(), SessionState::Active);

        assert_eq!(
            port.calls[..3],
            [
                PortCall::Search,
                PortCall::Connect("tracker-f4ce360000000001".into(), 30),
                PortCall::Register("sensors/f4ce360000000001".into()),
            ]
        );
    }

    #[test]
    fn active_session_publishes_json_report() {
        let mut p = publisher();
        let mut port = MockPort::default();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        p.on_gateway_found(&mut port);
        p.on_connect_ack(true, &mut port);
        p.on_register_ack(true, 7);

        p.publish_tick(&mut port, &fix(634_123_456, -105_987_654), 545.6)
            .unwrap();

        let PortCall::Publish(topic_id, payload) = port.calls.last().unwrap() else {
            panic!("expected a publish");
        };
        assert_eq!(*topic_id, 7);
        let v: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(v["id"], "f4ce360000000001");
        assert_eq!(v["count"], 0);
        assert_eq!(v["status"], "P1");
        assert_eq!(v["batt"], 100);
        assert_eq!(v["lat"], 634_123_456);
        assert_eq!(v["lon"], -105_987_654);
        assert_eq!(v["ele"], 545);
        assert_eq!(v["temp"], 24.0);
    }

    #[test]
    fn unflagged_location_is_published_as_null() {
        let mut p = publisher();
        let mut port = MockPort::default();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        p.on_gateway_found(&mut port);
        p.on_connect_ack(true, &mut port);
        p.on_register_ack(true, 7);

        // Stale coordinate bytes without the location flag must not
        // leak into the report.
        let stale = LocationFix {
            location_present: false,
            latitude: 123_456_789,
            longitude: -23_456_789,
            ..LocationFix::default()
        };
        p.publish_tick(&mut port, &stale, 0.0).unwrap();

        let PortCall::Publish(_, payload) = port.calls.last().unwrap() else {
            panic!("expected a publish");
        };
        let v: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert!(v["lat"].is_null());
        assert!(v["lon"].is_null());
    }

    #[test]
    fn report_counter_increments_per_publish() {
        let mut p = publisher();
        let mut port = MockPort::default();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        p.on_gateway_found(&mut port);
        p.on_connect_ack(true, &mut port);
        p.on_register_ack(true, 7);

        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();

        let counts: Vec<u64> = port
            .calls
            .iter()
            .filter_map(|c| match c {
                PortCall::Publish(_, payload) => {
                    let v: serde_json::Value = serde_json::from_slice(payload).unwrap();
                    v["count"].as_u64()
                }
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![0, 1]);
    }

    #[test]
    fn lost_session_triggers_research_not_publish() {
        let mut p = publisher();
        let mut port = MockPort::default();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        p.on_gateway_found(&mut port);
        p.on_connect_ack(true, &mut port);
        p.on_register_ack(true, 7);

        p.on_session_lost();
        assert_eq!(p.state(), SessionState::Lost);

        port.calls.clear();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        assert_eq!(port.calls, vec![PortCall::Search]);
        assert_eq!(p.state(), SessionState::Searching);
    }

    #[test]
    fn handshake_in_flight_ticks_are_noops() {
        let mut p = publisher();
        let mut port = MockPort::default();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();

        port.calls.clear();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        assert!(port.calls.is_empty(), "no duplicate search while waiting");
    }

    #[test]
    fn rejected_connect_falls_back_to_lost() {
        let mut p = publisher();
        let mut port = MockPort::default();
        p.publish_tick(&mut port, &fix(0, 0), 0.0).unwrap();
        p.on_gateway_found(&mut port);
        p.on_connect_ack(false, &mut port);
        assert_eq!(p.state(), SessionState::Lost);
    }

    #[test]
    fn failed_search_leaves_session_down() {
        let mut p = publisher();
        let mut port = MockPort {
            fail_search: true,
            ..MockPort::default()
        };
        assert!(p.publish_tick(&mut port, &fix(0, 0), 0.0).is_err());
        assert_eq!(p.state(), SessionState::Disconnected);
    }
}
