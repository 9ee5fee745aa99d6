//! MQTT-SN gateway adapter.
//!
//! Implements [`PublishPort`] over a UDP socket using the MQTT-SN 1.2
//! wire format.  The gateway is discovered with a SEARCHGW multicast on
//! the mesh-local scope; everything after that is unicast to the
//! address the GWINFO answer came from.
//!
//! Frame encoding and decoding are pure functions so the wire format is
//! testable without a socket.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use log::{debug, info, warn};

use crate::app::ports::{PublishError, PublishPort};

/// Mesh-local all-nodes multicast used for gateway discovery.
pub const GATEWAY_MULTICAST_ADDRESS: &str = "ff03::1";
/// Gateway UDP port.
pub const GATEWAY_PORT: u16 = 10_000;
/// Multicast hop limit for SEARCHGW.
pub const SEARCH_RADIUS: u8 = 8;

// MQTT-SN message types.
const MSG_SEARCHGW: u8 = 0x01;
const MSG_GWINFO: u8 = 0x02;
const MSG_CONNECT: u8 = 0x04;
const MSG_CONNACK: u8 = 0x05;
const MSG_REGISTER: u8 = 0x0A;
const MSG_REGACK: u8 = 0x0B;
const MSG_PUBLISH: u8 = 0x0C;
const MSG_PUBACK: u8 = 0x0D;
const MSG_DISCONNECT: u8 = 0x18;

const FLAG_CLEAN_SESSION: u8 = 0x04;
const FLAG_QOS_1: u8 = 0x20;
const PROTOCOL_ID: u8 = 0x01;
const RC_ACCEPTED: u8 = 0x00;

// ───────────────────────────────────────────────────────────────
// Wire format
// ───────────────────────────────────────────────────────────────

/// Inbound gateway frames the publisher cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayFrame {
    /// GWINFO: answer to a SEARCHGW.
    GatewayInfo { gateway_id: u8 },
    /// CONNACK.
    ConnectAck { accepted: bool },
    /// REGACK with the assigned short topic id.
    RegisterAck { topic_id: u16, accepted: bool },
    /// PUBACK.
    PublishAck { accepted: bool },
    /// Gateway-initiated DISCONNECT.
    Disconnect,
}

fn push_header(buf: &mut Vec<u8>, msg_type: u8, body_len: usize) {
    // 1-octet length covers every frame this client sends except large
    // publishes, which use the 3-octet form.
    let total = body_len + 2;
    if total <= 0xFF {
        buf.push(total as u8);
    } else {
        let total = body_len + 4;
        buf.push(0x01);
        buf.extend_from_slice(&(total as u16).to_be_bytes());
    }
    buf.push(msg_type);
}

fn encode_searchgw(radius: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3);
    push_header(&mut buf, MSG_SEARCHGW, 1);
    buf.push(radius);
    buf
}

fn encode_connect(client_id: &str, keepalive_secs: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(6 + client_id.len());
    push_header(&mut buf, MSG_CONNECT, 4 + client_id.len());
    buf.push(FLAG_CLEAN_SESSION);
    buf.push(PROTOCOL_ID);
    buf.extend_from_slice(&keepalive_secs.to_be_bytes());
    buf.extend_from_slice(client_id.as_bytes());
    buf
}

fn encode_register(msg_id: u16, topic: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(6 + topic.len());
    push_header(&mut buf, MSG_REGISTER, 4 + topic.len());
    buf.extend_from_slice(&0u16.to_be_bytes()); // topic id assigned by gateway
    buf.extend_from_slice(&msg_id.to_be_bytes());
    buf.extend_from_slice(topic.as_bytes());
    buf
}

fn encode_publish(msg_id: u16, topic_id: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(7 + payload.len());
    push_header(&mut buf, MSG_PUBLISH, 5 + payload.len());
    buf.push(FLAG_QOS_1);
    buf.extend_from_slice(&topic_id.to_be_bytes());
    buf.extend_from_slice(&msg_id.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn encode_disconnect() -> Vec<u8> {
    let mut buf = Vec::with_capacity(2);
    push_header(&mut buf, MSG_DISCONNECT, 0);
    buf
}

/// Decode one inbound datagram.  Unknown or malformed frames decode to
/// `None` and are skipped.
pub fn decode_frame(data: &[u8]) -> Option<GatewayFrame> {
    let (msg_type, body) = match data {
        [0x01, _, _, msg_type, body @ ..] => (*msg_type, body),
        [_, msg_type, body @ ..] => (*msg_type, body),
        _ => return None,
    };

    match msg_type {
        MSG_GWINFO => Some(GatewayFrame::GatewayInfo {
            gateway_id: *body.first()?,
        }),
        MSG_CONNACK => Some(GatewayFrame::ConnectAck {
            accepted: *body.first()? == RC_ACCEPTED,
        }),
        MSG_REGACK => {
            // topic id (2), msg id (2), return code (1)
            if body.len() < 5 {
                return None;
            }
            Some(GatewayFrame::RegisterAck {
                topic_id: u16::from_be_bytes([body[0], body[1]]),
                accepted: body[4] == RC_ACCEPTED,
            })
        }
        MSG_PUBACK => {
            if body.len() < 5 {
                return None;
            }
            Some(GatewayFrame::PublishAck {
                accepted: body[4] == RC_ACCEPTED,
            })
        }
        MSG_DISCONNECT => Some(GatewayFrame::Disconnect),
        _ => None,
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

/// UDP transport state for the gateway session.
pub struct GatewayAdapter {
    socket: UdpSocket,
    /// Unicast address learned from the GWINFO answer.
    gateway: Option<SocketAddr>,
    next_msg_id: u16,
}

impl GatewayAdapter {
    /// Bind the client socket.  Non-blocking so the main loop can poll.
    pub fn new() -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("::", 0))?;
        socket.set_nonblocking(true)?;
        info!("Gateway adapter bound to {:?}", socket.local_addr()?);
        Ok(Self {
            socket,
            gateway: None,
            next_msg_id: 1,
        })
    }

    fn msg_id(&mut self) -> u16 {
        let id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1).max(1);
        id
    }

    fn send_to_gateway(&self, frame: &[u8]) -> Result<(), PublishError> {
        let addr = self.gateway.ok_or(PublishError::BadState)?;
        self.socket
            .send_to(frame, addr)
            .map_err(|_| PublishError::IoError)?;
        Ok(())
    }

    /// Poll for one inbound frame.  Remembers the sender address of a
    /// GWINFO answer as the gateway unicast address.
    pub fn poll(&mut self) -> Option<GatewayFrame> {
        let mut buf = [0u8; 512];
        let (len, from) = match self.socket.recv_from(&mut buf) {
            Ok(x) => x,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                warn!("Gateway socket error: {e}");
                return None;
            }
        };
        let frame = decode_frame(&buf[..len])?;
        if let GatewayFrame::GatewayInfo { gateway_id } = frame {
            debug!("Gateway {gateway_id} at {from}");
            self.gateway = Some(from);
        }
        Some(frame)
    }
}

impl PublishPort for GatewayAdapter {
    fn search_gateway(&mut self) -> Result<(), PublishError> {
        debug!("Searching for gateway on {GATEWAY_MULTICAST_ADDRESS}");
        let frame = encode_searchgw(SEARCH_RADIUS);
        self.socket
            .send_to(&frame, (GATEWAY_MULTICAST_ADDRESS, GATEWAY_PORT))
            .map_err(|_| PublishError::NoNetwork)?;
        Ok(())
    }

    fn connect(&mut self, client_id: &str, keepalive_secs: u16) -> Result<(), PublishError> {
        let frame = encode_connect(client_id, keepalive_secs);
        self.send_to_gateway(&frame)
    }

    fn register_topic(&mut self, topic: &str) -> Result<(), PublishError> {
        let id = self.msg_id();
        let frame = encode_register(id, topic);
        self.send_to_gateway(&frame)
    }

    fn publish(&mut self, topic_id: u16, payload: &[u8]) -> Result<(), PublishError> {
        if payload.len() > 480 {
            return Err(PublishError::TooLarge);
        }
        let id = self.msg_id();
        let frame = encode_publish(id, topic_id, payload);
        self.send_to_gateway(&frame)
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        let frame = encode_disconnect();
        let result = self.send_to_gateway(&frame);
        self.gateway = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searchgw_frame_layout() {
        assert_eq!(encode_searchgw(8), vec![0x03, MSG_SEARCHGW, 8]);
    }

    #[test]
    fn connect_frame_carries_client_id_and_keepalive() {
        let frame = encode_connect("tracker-aa", 30);
        assert_eq!(frame[0] as usize, frame.len());
        assert_eq!(frame[1], MSG_CONNECT);
        assert_eq!(frame[2], FLAG_CLEAN_SESSION);
        assert_eq!(frame[3], PROTOCOL_ID);
        assert_eq!(u16::from_be_bytes([frame[4], frame[5]]), 30);
        assert_eq!(&frame[6..], b"tracker-aa");
    }

    #[test]
    fn register_frame_has_zero_topic_id() {
        let frame = encode_register(7, "sensors/aa");
        assert_eq!(frame[1], MSG_REGISTER);
        assert_eq!(&frame[2..4], &[0, 0]);
        assert_eq!(u16::from_be_bytes([frame[4], frame[5]]), 7);
        assert_eq!(&frame[6..], b"sensors/aa");
    }

    #[test]
    fn publish_frame_is_qos1() {
        let frame = encode_publish(3, 42, b"{}");
        assert_eq!(frame[1], MSG_PUBLISH);
        assert_eq!(frame[2], FLAG_QOS_1);
        assert_eq!(u16::from_be_bytes([frame[3], frame[4]]), 42);
        assert_eq!(u16::from_be_bytes([frame[5], frame[6]]), 3);
        assert_eq!(&frame[7..], b"{}");
    }

    #[test]
    fn long_publish_uses_extended_length() {
        let payload = vec![b'x'; 300];
        let frame = encode_publish(1, 1, &payload);
        assert_eq!(frame[0], 0x01);
        let total = u16::from_be_bytes([frame[1], frame[2]]) as usize;
        assert_eq!(total, frame.len());
        assert_eq!(frame[3], MSG_PUBLISH);
    }

    #[test]
    fn decode_roundtrip_for_acks() {
        assert_eq!(
            decode_frame(&[0x03, MSG_GWINFO, 5]),
            Some(GatewayFrame::GatewayInfo { gateway_id: 5 })
        );
        assert_eq!(
            decode_frame(&[0x03, MSG_CONNACK, 0x00]),
            Some(GatewayFrame::ConnectAck { accepted: true })
        );
        assert_eq!(
            decode_frame(&[0x03, MSG_CONNACK, 0x03]),
            Some(GatewayFrame::ConnectAck { accepted: false })
        );
        assert_eq!(
            decode_frame(&[0x07, MSG_REGACK, 0x00, 0x2A, 0x00, 0x01, 0x00]),
            Some(GatewayFrame::RegisterAck {
                topic_id: 42,
                accepted: true
            })
        );
        assert_eq!(
            decode_frame(&[0x07, MSG_PUBACK, 0x00, 0x2A, 0x00, 0x01, 0x00]),
            Some(GatewayFrame::PublishAck { accepted: true })
        );
        assert_eq!(
            decode_frame(&[0x02, MSG_DISCONNECT]),
            Some(GatewayFrame::Disconnect)
        );
    }

    #[test]
    fn malformed_frames_decode_to_none() {
        assert_eq!(decode_frame(&[]), None);
        assert_eq!(decode_frame(&[0x01]), None);
        assert_eq!(decode_frame(&[0x04, MSG_REGACK, 0x00]), None);
        assert_eq!(decode_frame(&[0x05, 0x77, 1, 2, 3]), None);
    }
}
