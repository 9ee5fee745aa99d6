//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A diagnostics-topic adapter would implement the same trait.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => {
                info!("START | tracker service up");
            }
            AppEvent::DeliveryModeSelected { notifications } => {
                info!(
                    "LNS   | delivery mode: {}",
                    if *notifications { "notifications" } else { "periodic read" }
                );
            }
            AppEvent::PeerUnusable => {
                info!("LNS   | peer unusable until next discovery");
            }
            AppEvent::FixReceived(s) => {
                info!(
                    "FIX   | speed={:?} lat={:?} lon={:?}",
                    s.speed, s.latitude, s.longitude
                );
            }
            AppEvent::FixAborted => {
                info!("FIX   | aborted");
            }
            AppEvent::PeerDisconnected => {
                info!("LNS   | peer disconnected");
            }
            AppEvent::RoleChanged(role) => {
                info!("MESH  | role={role}");
            }
            AppEvent::SessionChanged(state) => {
                info!("GW    | session={state:?}");
            }
        }
    }
}
