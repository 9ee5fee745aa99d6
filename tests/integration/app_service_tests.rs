//! End-to-end delivery-mode selection against mock adapters.
//!
//! Covers the two fix delivery paths (notification subscription and
//! periodic polling), the poll scheduler's re-arm discipline, and the
//! disconnect handling in between.

use fieldtracker::app::{AppEvent, AppService};
use fieldtracker::config::NodeConfig;
use fieldtracker::identity::DeviceEui;

use crate::mock_ports::{
    lns_service, speed_location_payload, GattCall, MockGatt, RecordingSink, CCC_HANDLE, CONN,
    VALUE_HANDLE,
};

const POLL_MS: u64 = 30_000; // NodeConfig::default().lns_read_interval_ms

fn service() -> AppService {
    let eui = DeviceEui::from_hex("f4ce360000000001").unwrap();
    AppService::new(NodeConfig::default(), eui)
}

#[test]
fn notify_peer_selects_subscription() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(true), 0, &mut gatt, &mut sink);

    assert_eq!(
        gatt.calls,
        vec![GattCall::Subscribe {
            conn: CONN,
            value_handle: VALUE_HANDLE,
            ccc_handle: CCC_HANDLE,
            volatile: true,
        }]
    );
    assert_eq!(
        sink.count_matching(
            |e| matches!(e, AppEvent::DeliveryModeSelected { notifications: true })
        ),
        1
    );

    // No polling armed alongside the subscription.
    app.poll_tick(10 * POLL_MS, &mut gatt);
    assert_eq!(gatt.reads(), 0);
}

#[test]
fn read_only_peer_selects_polling() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(false), 0, &mut gatt, &mut sink);

    assert_eq!(
        sink.count_matching(
            |e| matches!(e, AppEvent::DeliveryModeSelected { notifications: false })
        ),
        1
    );

    app.poll_tick(POLL_MS - 1, &mut gatt);
    assert_eq!(gatt.reads(), 0, "not due yet");

    app.poll_tick(POLL_MS, &mut gatt);
    assert_eq!(
        gatt.calls,
        vec![GattCall::Read {
            conn: CONN,
            handle: VALUE_HANDLE,
        }]
    );
}

#[test]
fn completion_delivers_fix_and_rearms_cycle() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(false), 0, &mut gatt, &mut sink);
    app.poll_tick(POLL_MS, &mut gatt);
    assert_eq!(gatt.reads(), 1);

    // In flight: further ticks issue nothing.
    app.poll_tick(POLL_MS + 1, &mut gatt);
    assert_eq!(gatt.reads(), 1);

    let payload = speed_location_payload(42, 634_123_456, -105_987_654);
    app.on_read_complete(POLL_MS + 100, Ok(&payload));

    let summary = app.fix_summary();
    assert_eq!(summary.speed, Some(42));
    assert_eq!(summary.latitude, Some(634_123_456));
    assert_eq!(summary.longitude, Some(-105_987_654));

    // Next cycle is due one interval after the completion.
    app.poll_tick(POLL_MS + 100 + POLL_MS - 1, &mut gatt);
    assert_eq!(gatt.reads(), 1);
    app.poll_tick(POLL_MS + 100 + POLL_MS, &mut gatt);
    assert_eq!(gatt.reads(), 2);
}

#[test]
fn aborted_read_leaves_snapshot_empty() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(false), 0, &mut gatt, &mut sink);
    app.poll_tick(POLL_MS, &mut gatt);

    // All-flags-clear sentinel: the measurement was aborted.
    app.on_read_complete(POLL_MS + 1, Ok(&[0x00, 0x00]));

    let summary = app.fix_summary();
    assert_eq!(summary.speed, None);
    assert_eq!(summary.latitude, None);
    assert_eq!(summary.longitude, None);
}

#[test]
fn notification_updates_snapshot() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(true), 0, &mut gatt, &mut sink);
    app.on_notification(&speed_location_payload(9, 100, -200));

    let summary = app.fix_summary();
    assert_eq!(summary.speed, Some(9));
    assert_eq!(summary.latitude, Some(100));
    assert_eq!(summary.longitude, Some(-200));
}

#[test]
fn wrong_service_flags_peer_unusable() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    let mut svc = lns_service(true);
    svc.uuid = 0x1800;
    app.on_discovery_complete(&svc, 0, &mut gatt, &mut sink);

    assert!(gatt.calls.is_empty());
    assert_eq!(sink.count_matching(|e| matches!(e, AppEvent::PeerUnusable)), 1);
}

#[test]
fn failed_subscribe_flags_peer_unusable() {
    let mut app = service();
    let mut gatt = MockGatt {
        fail_subscribe: true,
        ..MockGatt::default()
    };
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(true), 0, &mut gatt, &mut sink);
    assert_eq!(sink.count_matching(|e| matches!(e, AppEvent::PeerUnusable)), 1);
}

#[test]
fn disconnect_stops_polling() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(false), 0, &mut gatt, &mut sink);
    app.on_peer_disconnected(&mut sink);

    assert_eq!(
        sink.count_matching(|e| matches!(e, AppEvent::PeerDisconnected)),
        1
    );

    app.poll_tick(POLL_MS, &mut gatt);
    assert_eq!(gatt.reads(), 0, "no reads against a dead connection");
}

#[test]
fn rediscovery_after_disconnect_rearms_delivery() {
    let mut app = service();
    let mut gatt = MockGatt::new();
    let mut sink = RecordingSink::new();

    app.on_discovery_complete(&lns_service(false), 0, &mut gatt, &mut sink);
    app.on_peer_disconnected(&mut sink);

    // The peer comes back supporting notifications this time.
    app.on_discovery_complete(&lns_service(true), 1_000, &mut gatt, &mut sink);
    assert_eq!(
        sink.count_matching(
            |e| matches!(e, AppEvent::DeliveryModeSelected { notifications: true })
        ),
        1
    );
    app.poll_tick(1_000 + 10 * POLL_MS, &mut gatt);
    assert_eq!(gatt.reads(), 0, "old polling schedule must not survive");
}
