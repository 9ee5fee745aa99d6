//! Gateway session flow through the application service.
//!
//! Drives the publisher with a mock gateway and checks that session
//! transitions surface as events and that the published report carries
//! the peer fix and the on-board GNSS altitude.

use fieldtracker::adapters::gnss_uart::SimGnssFeed;
use fieldtracker::app::ports::PublishError;
use fieldtracker::app::{AppEvent, AppService};
use fieldtracker::config::NodeConfig;
use fieldtracker::error::Error;
use fieldtracker::identity::DeviceEui;
use fieldtracker::publish::SessionState;

use crate::mock_ports::{
    lns_service, speed_location_payload, GatewayCall, MockGatt, MockGateway, RecordingSink,
};

fn service() -> AppService {
    let eui = DeviceEui::from_hex("f4ce360000000001").unwrap();
    AppService::new(NodeConfig::default(), eui)
}

fn session_states(sink: &RecordingSink) -> Vec<SessionState> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            AppEvent::SessionChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

/// Walk the full handshake; leaves the session Active with topic id 5.
fn establish(app: &mut AppService, gw: &mut MockGateway, sink: &mut RecordingSink) {
    app.publish_tick(gw, sink).unwrap();
    app.on_gateway_found(gw, sink);
    app.on_connect_ack(true, gw, sink);
    app.on_register_ack(true, 5, sink);
}

#[test]
fn handshake_emits_each_session_transition() {
    let mut app = service();
    let mut gw = MockGateway::new();
    let mut sink = RecordingSink::new();

    establish(&mut app, &mut gw, &mut sink);

    assert_eq!(
        session_states(&sink),
        vec![
            SessionState::Searching,
            SessionState::Connecting,
            SessionState::Registering,
            SessionState::Active,
        ]
    );
    assert_eq!(
        gw.calls,
        vec![
            GatewayCall::Search,
            GatewayCall::Connect("tracker-f4ce360000000001".into(), 30),
            GatewayCall::Register("sensors/f4ce360000000001".into()),
        ]
    );
}

#[test]
fn report_carries_peer_fix_and_gnss_altitude() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut gw = MockGateway::new();
    let mut sink = RecordingSink::new();

    // Fix from the tracked peer, over the polling path.
    app.on_discovery_complete(&lns_service(false), 0, &mut gatt, &mut sink);
    app.poll_tick(30_000, &mut gatt);
    let payload = speed_location_payload(42, 634_123_456, -105_987_654);
    app.on_read_complete(30_001, Ok(&payload));

    // Altitude from the on-board receiver.
    let mut gnss = SimGnssFeed::new();
    gnss.inject(
        b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n",
        &mut app,
    );

    establish(&mut app, &mut gw, &mut sink);
    app.publish_tick(&mut gw, &mut sink).unwrap();

    let (topic_id, payload) = gw.last_publish().expect("a report must go out");
    assert_eq!(topic_id, 5);
    let v: serde_json::Value = serde_json::from_slice(payload).unwrap();
    assert_eq!(v["id"], "f4ce360000000001");
    assert_eq!(v["lat"], 634_123_456);
    assert_eq!(v["lon"], -105_987_654);
    assert_eq!(v["ele"], 545);
    assert_eq!(v["status"], "P1");
}

#[test]
fn rejected_publish_restarts_session() {
    let mut app = service();
    let mut gw = MockGateway::new();
    let mut sink = RecordingSink::new();

    establish(&mut app, &mut gw, &mut sink);
    app.publish_tick(&mut gw, &mut sink).unwrap();

    app.on_publish_ack(false, &mut sink);
    assert_eq!(session_states(&sink).last(), Some(&SessionState::Lost));

    gw.calls.clear();
    app.publish_tick(&mut gw, &mut sink).unwrap();
    assert_eq!(gw.calls, vec![GatewayCall::Search]);
}

#[test]
fn failed_search_surfaces_as_publish_error() {
    let mut app = service();
    let mut gw = MockGateway {
        fail_search: true,
        ..MockGateway::default()
    };
    let mut sink = RecordingSink::new();

    let err = app.publish_tick(&mut gw, &mut sink).unwrap_err();
    assert_eq!(err, Error::Publish(PublishError::NoNetwork));
    assert_eq!(gw.calls, vec![GatewayCall::Search]);
    assert_eq!(session_states(&sink), vec![], "no transition on a dead radio");
}

#[test]
fn accepted_publish_keeps_session_active() {
    let mut app = service();
    let mut gw = MockGateway::new();
    let mut sink = RecordingSink::new();

    establish(&mut app, &mut gw, &mut sink);
    app.publish_tick(&mut gw, &mut sink).unwrap();
    app.on_publish_ack(true, &mut sink);

    gw.calls.clear();
    app.publish_tick(&mut gw, &mut sink).unwrap();
    assert!(
        matches!(gw.calls.as_slice(), [GatewayCall::Publish(5, _)]),
        "session stays up and keeps publishing"
    );
}
