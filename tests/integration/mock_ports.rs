//! Mock port adapters for integration tests.
//!
//! Every request crossing a port boundary is recorded so tests can
//! assert on the full request history without touching a radio.

use fieldtracker::app::ports::{EventSink, GattError, GattPort, PublishError, PublishPort, SubscribeRequest};
use fieldtracker::app::AppEvent;
use fieldtracker::ble::discovery::{
    ConnId, DiscoveredCharacteristic, DiscoveredDescriptor, DiscoveredService, PROP_NOTIFY,
    PROP_READ, UUID_GATT_CCC, UUID_LNS, UUID_LOCATION_AND_SPEED,
};

pub const VALUE_HANDLE: u16 = 0x0021;
pub const CCC_HANDLE: u16 = 0x0022;
pub const CONN: ConnId = ConnId(7);

// ── GATT transport record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattCall {
    Subscribe {
        conn: ConnId,
        value_handle: u16,
        ccc_handle: u16,
        volatile: bool,
    },
    Unsubscribe {
        conn: ConnId,
        value_handle: u16,
    },
    Read {
        conn: ConnId,
        handle: u16,
    },
}

#[derive(Default)]
pub struct MockGatt {
    pub calls: Vec<GattCall>,
    pub fail_subscribe: bool,
    pub fail_read: bool,
}

#[allow(dead_code)]
impl MockGatt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GattCall::Read { .. }))
            .count()
    }
}

impl GattPort for MockGatt {
    fn subscribe(&mut self, conn: ConnId, req: &SubscribeRequest) -> Result<(), GattError> {
        self.calls.push(GattCall::Subscribe {
            conn,
            value_handle: req.value_handle,
            ccc_handle: req.ccc_handle,
            volatile: req.volatile,
        });
        if self.fail_subscribe {
            Err(GattError::RequestRejected)
        } else {
            Ok(())
        }
    }

    fn unsubscribe(&mut self, conn: ConnId, value_handle: u16) -> Result<(), GattError> {
        self.calls.push(GattCall::Unsubscribe { conn, value_handle });
        Ok(())
    }

    fn read(&mut self, conn: ConnId, handle: u16) -> Result<(), GattError> {
        self.calls.push(GattCall::Read { conn, handle });
        if self.fail_read {
            Err(GattError::RequestRejected)
        } else {
            Ok(())
        }
    }
}

// ── Gateway transport record ──────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Search,
    Connect(String, u16),
    Register(String),
    Publish(u16, Vec<u8>),
    Disconnect,
}

#[derive(Default)]
pub struct MockGateway {
    pub calls: Vec<GatewayCall>,
    pub fail_search: bool,
}

#[allow(dead_code)]
impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_publish(&self) -> Option<(u16, &[u8])> {
        self.calls.iter().rev().find_map(|c| match c {
            GatewayCall::Publish(topic_id, payload) => Some((*topic_id, payload.as_slice())),
            _ => None,
        })
    }
}

impl PublishPort for MockGateway {
    fn search_gateway(&mut self) -> Result<(), PublishError> {
        self.calls.push(GatewayCall::Search);
        if self.fail_search {
            Err(PublishError::NoNetwork)
        } else {
            Ok(())
        }
    }

    fn connect(&mut self, client_id: &str, keepalive_secs: u16) -> Result<(), PublishError> {
        self.calls
            .push(GatewayCall::Connect(client_id.into(), keepalive_secs));
        Ok(())
    }

    fn register_topic(&mut self, topic: &str) -> Result<(), PublishError> {
        self.calls.push(GatewayCall::Register(topic.into()));
        Ok(())
    }

    fn publish(&mut self, topic_id: u16, payload: &[u8]) -> Result<(), PublishError> {
        self.calls.push(GatewayCall::Publish(topic_id, payload.into()));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        self.calls.push(GatewayCall::Disconnect);
        Ok(())
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_matching(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Discovery builder ─────────────────────────────────────────

/// A discovered Location and Navigation service.  With `with_ccc` the
/// peer supports notifications; without it only reads are possible.
pub fn lns_service(with_ccc: bool) -> DiscoveredService {
    let mut chrc = DiscoveredCharacteristic {
        uuid: UUID_LOCATION_AND_SPEED,
        properties: if with_ccc {
            PROP_READ | PROP_NOTIFY
        } else {
            PROP_READ
        },
        descriptors: heapless::Vec::new(),
    };
    chrc.descriptors
        .push(DiscoveredDescriptor {
            uuid: UUID_LOCATION_AND_SPEED,
            handle: VALUE_HANDLE,
        })
        .unwrap();
    if with_ccc {
        chrc.descriptors
            .push(DiscoveredDescriptor {
                uuid: UUID_GATT_CCC,
                handle: CCC_HANDLE,
            })
            .unwrap();
    }

    let mut svc = DiscoveredService {
        conn: CONN,
        uuid: UUID_LNS,
        characteristics: heapless::Vec::new(),
    };
    svc.characteristics.push(chrc).unwrap();
    svc
}

/// Location and Speed payload carrying instantaneous speed and location.
pub fn speed_location_payload(speed: u16, lat: i32, lon: i32) -> Vec<u8> {
    let mut data = vec![0x05, 0x00];
    data.extend_from_slice(&speed.to_le_bytes());
    data.extend_from_slice(&lat.to_le_bytes());
    data.extend_from_slice(&lon.to_le_bytes());
    data
}
