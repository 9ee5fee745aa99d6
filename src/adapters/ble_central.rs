//! BLE central adapter.
//!
//! Owns scanning, connection, and GATT discovery against the tracked
//! peer, and implements [`GattPort`] for the LNS client.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT client via
//!   `esp_idf_svc::sys` (`esp_ble_gattc_*`).
//! - **all other targets**: [`SimCentral`], a scripted double for
//!   host-side tests and simulation.
//!
//! The attribute-table condensation in [`condense`] is pure and shared
//! by both backends: the stack's discovery callbacks deliver a flat
//! attribute list, and the LNS client wants the nested
//! [`DiscoveredService`] model.

use log::warn;

use crate::app::ports::{GattError, GattPort, SubscribeRequest};
use crate::ble::discovery::{
    ConnId, DiscoveredCharacteristic, DiscoveredDescriptor, DiscoveredService,
};

// ───────────────────────────────────────────────────────────────
// Discovery condensation (pure)
// ───────────────────────────────────────────────────────────────

/// One attribute as reported by the stack's discovery callbacks, in
/// handle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAttr {
    /// Characteristic declaration plus its value attribute.
    Characteristic {
        uuid: u16,
        properties: u8,
        value_handle: u16,
    },
    /// Descriptor following a characteristic.
    Descriptor { uuid: u16, handle: u16 },
}

/// Fold a flat attribute list into the nested discovery model.
///
/// The value attribute of each characteristic is exposed as a
/// descriptor carrying the characteristic's own UUID, which is how the
/// LNS client finds the value handle.  Descriptors before the first
/// characteristic are dropped; overflowing attributes are logged and
/// dropped rather than failing the whole discovery.
pub fn condense(conn: ConnId, service_uuid: u16, attrs: &[RawAttr]) -> DiscoveredService {
    let mut svc = DiscoveredService {
        conn,
        uuid: service_uuid,
        characteristics: heapless::Vec::new(),
    };

    for attr in attrs {
        match *attr {
            RawAttr::Characteristic {
                uuid,
                properties,
                value_handle,
            } => {
                let mut chrc = DiscoveredCharacteristic {
                    uuid,
                    properties,
                    descriptors: heapless::Vec::new(),
                };
                // The value attribute, addressable by the characteristic UUID.
                let _ = chrc.descriptors.push(DiscoveredDescriptor {
                    uuid,
                    handle: value_handle,
                });
                if svc.characteristics.push(chrc).is_err() {
                    warn!("Discovery overflow: characteristic 0x{uuid:04X} dropped");
                }
            }
            RawAttr::Descriptor { uuid, handle } => {
                let Some(chrc) = svc.characteristics.last_mut() else {
                    warn!("Descriptor 0x{uuid:04X} before any characteristic");
                    continue;
                };
                if chrc
                    .descriptors
                    .push(DiscoveredDescriptor { uuid, handle })
                    .is_err()
                {
                    warn!("Discovery overflow: descriptor 0x{uuid:04X} dropped");
                }
            }
        }
    }

    svc
}

// ───────────────────────────────────────────────────────────────
// Host simulation backend
// ───────────────────────────────────────────────────────────────

/// Scripted GATT transport for the host build.
///
/// Requests are recorded; tests feed completions back into the service
/// by hand, mirroring how the real stack calls back asynchronously.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct SimCentral {
    pub subscribes: Vec<(ConnId, SubscribeRequest)>,
    pub unsubscribes: Vec<(ConnId, u16)>,
    pub reads: Vec<(ConnId, u16)>,
    /// When set, every request is refused, emulating a dead link.
    pub link_down: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimCentral {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(not(target_os = "espidf"))]
impl GattPort for SimCentral {
    fn subscribe(&mut self, conn: ConnId, req: &SubscribeRequest) -> Result<(), GattError> {
        if self.link_down {
            return Err(GattError::ConnectionLost);
        }
        self.subscribes.push((conn, *req));
        Ok(())
    }

    fn unsubscribe(&mut self, conn: ConnId, value_handle: u16) -> Result<(), GattError> {
        if self.link_down {
            return Err(GattError::ConnectionLost);
        }
        self.unsubscribes.push((conn, value_handle));
        Ok(())
    }

    fn read(&mut self, conn: ConnId, handle: u16) -> Result<(), GattError> {
        if self.link_down {
            return Err(GattError::ConnectionLost);
        }
        self.reads.push((conn, handle));
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp_impl::{take_discovered, take_notification, take_read_result, BleCentral};

#[cfg(target_os = "espidf")]
mod esp_impl {
    use core::cell::RefCell;
    use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::blocking_mutex::Mutex;
    use esp_idf_svc::sys::*;
    use log::{debug, error, info, warn};

    use super::{condense, GattError, GattPort, RawAttr, SubscribeRequest};
    use crate::ble::discovery::{ConnId, DiscoveredService, UUID_LNS};
    use crate::events::{push_event, Event};

    /// Longest Location and Speed payload we accept from the stack.
    const MAX_VALUE_LEN: usize = 32;
    /// Flat attribute capacity for one discovery pass.
    const MAX_ATTRS: usize = 24;

    type StackMailbox<T> = Mutex<CriticalSectionRawMutex, RefCell<Option<T>>>;

    // Callback context hands results to the main loop through these.
    static DISCOVERED: StackMailbox<DiscoveredService> = Mutex::new(RefCell::new(None));
    static NOTIFICATION: StackMailbox<heapless::Vec<u8, MAX_VALUE_LEN>> =
        Mutex::new(RefCell::new(None));
    static READ_RESULT: StackMailbox<Result<heapless::Vec<u8, MAX_VALUE_LEN>, GattError>> =
        Mutex::new(RefCell::new(None));

    static GATTC_IF: AtomicU8 = AtomicU8::new(ESP_GATT_IF_NONE as u8);
    static CONN_ID: AtomicU16 = AtomicU16::new(0);

    /// Fetch the service captured by the last completed discovery.
    pub fn take_discovered() -> Option<DiscoveredService> {
        DISCOVERED.lock(|slot| slot.borrow_mut().take())
    }

    /// Fetch the payload of the last value notification.
    pub fn take_notification() -> Option<heapless::Vec<u8, MAX_VALUE_LEN>> {
        NOTIFICATION.lock(|slot| slot.borrow_mut().take())
    }

    /// Fetch the outcome of the last characteristic read.
    pub fn take_read_result() -> Option<Result<heapless::Vec<u8, MAX_VALUE_LEN>, GattError>> {
        READ_RESULT.lock(|slot| slot.borrow_mut().take())
    }

    /// CCC value enabling notifications.
    const CCC_NOTIFY_ENABLE: [u8; 2] = [0x01, 0x00];
    const CCC_DISABLE: [u8; 2] = [0x00, 0x00];

    const GATTC_APP_ID: u16 = 0;

    /// Bluedroid GATT client handle state.
    pub struct BleCentral {
        gattc_if: esp_gatt_if_t,
        /// CCC handle of the active subscription, for the teardown write.
        ccc_handle: u16,
    }

    impl BleCentral {
        /// Bring up the controller and Bluedroid, register the GATTC
        /// application, and start scanning for the tracked peer.
        pub fn init() -> Result<Self, GattError> {
            // SAFETY: one-time stack bring-up, main task only.
            unsafe {
                let mut bt_cfg = esp_bt_controller_config_t::default();
                bt_cfg.controller_task_stack_size = ESP_TASK_BT_CONTROLLER_STACK as u16;
                Self::check(esp_bt_controller_init(&mut bt_cfg), "BT controller init")?;
                Self::check(
                    esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
                    "BT controller enable",
                )?;
                Self::check(esp_bluedroid_init(), "Bluedroid init")?;
                Self::check(esp_bluedroid_enable(), "Bluedroid enable")?;
                Self::check(
                    esp_ble_gattc_register_callback(Some(gattc_event)),
                    "GATTC callback registration",
                )?;
                Self::check(esp_ble_gattc_app_register(GATTC_APP_ID), "GATTC app register")?;
            }
            // The REG event delivers the interface before app_register
            // returns control to this task.
            let gattc_if = esp_gatt_if_t::from(GATTC_IF.load(Ordering::Acquire));
            if u32::from(gattc_if) == ESP_GATT_IF_NONE {
                error!("GATTC registration yielded no interface");
                return Err(GattError::RequestRejected);
            }
            info!("BLE central up (if {gattc_if})");
            Ok(Self {
                gattc_if,
                ccc_handle: 0,
            })
        }

        fn check(ret: esp_err_t, what: &str) -> Result<(), GattError> {
            if ret == ESP_OK {
                Ok(())
            } else {
                error!("{what} failed: {ret}");
                Err(GattError::RequestRejected)
            }
        }
    }

    // ── GATTC event pump ──────────────────────────────────────
    //
    // Runs on the Bluedroid task.  Results go into the mailboxes and
    // the main loop is woken through the event queue; no domain logic
    // happens in callback context.

    unsafe extern "C" fn gattc_event(
        event: esp_gattc_cb_event_t,
        gattc_if: esp_gatt_if_t,
        param: *mut esp_ble_gattc_cb_param_t,
    ) {
        match event {
            esp_gattc_cb_event_t_ESP_GATTC_REG_EVT => {
                GATTC_IF.store(gattc_if as u8, Ordering::Release);
            }
            esp_gattc_cb_event_t_ESP_GATTC_OPEN_EVT => {
                let open = (*param).open;
                if open.status == esp_gatt_status_t_ESP_GATT_OK {
                    CONN_ID.store(open.conn_id, Ordering::Release);
                    debug!("Peer connected (conn {})", open.conn_id);
                    let mut uuid = esp_bt_uuid_t {
                        len: ESP_UUID_LEN_16 as u16,
                        uuid: esp_bt_uuid_t__bindgen_ty_1 { uuid16: UUID_LNS },
                    };
                    esp_ble_gattc_search_service(gattc_if, open.conn_id, &mut uuid);
                } else {
                    warn!("Peer open failed: {}", open.status);
                }
            }
            esp_gattc_cb_event_t_ESP_GATTC_SEARCH_CMPL_EVT => {
                let cmpl = (*param).search_cmpl;
                on_search_complete(gattc_if, cmpl.conn_id);
            }
            esp_gattc_cb_event_t_ESP_GATTC_NOTIFY_EVT => {
                let notify = (*param).notify;
                let data = core::slice::from_raw_parts(notify.value, notify.value_len as usize);
                let mut payload = heapless::Vec::new();
                if payload.extend_from_slice(data).is_err() {
                    warn!("Notification larger than {MAX_VALUE_LEN} B dropped");
                    return;
                }
                NOTIFICATION.lock(|slot| slot.borrow_mut().replace(payload));
                push_event(Event::ValueNotified);
            }
            esp_gattc_cb_event_t_ESP_GATTC_READ_CHAR_EVT => {
                let read = (*param).read;
                let outcome = if read.status == esp_gatt_status_t_ESP_GATT_OK {
                    let data = core::slice::from_raw_parts(read.value, read.value_len as usize);
                    let mut payload = heapless::Vec::new();
                    if payload.extend_from_slice(data).is_err() {
                        Err(GattError::AttError(read.status as u8))
                    } else {
                        Ok(payload)
                    }
                } else {
                    Err(GattError::AttError(read.status as u8))
                };
                READ_RESULT.lock(|slot| slot.borrow_mut().replace(outcome));
                push_event(Event::ReadCompleted);
            }
            esp_gattc_cb_event_t_ESP_GATTC_DISCONNECT_EVT => {
                debug!("Peer disconnected");
                push_event(Event::PeerDisconnected);
            }
            _ => {}
        }
    }

    /// Walk the attribute cache Bluedroid filled during service search
    /// and publish the condensed model.
    unsafe fn on_search_complete(gattc_if: esp_gatt_if_t, conn_id: u16) {
        let mut attrs: heapless::Vec<RawAttr, MAX_ATTRS> = heapless::Vec::new();

        let mut chars = [esp_gattc_char_elem_t::default(); 8];
        let mut char_count = chars.len() as u16;
        let status = esp_ble_gattc_get_all_char(
            gattc_if,
            conn_id,
            0,
            0xFFFF,
            chars.as_mut_ptr(),
            &mut char_count,
            0,
        );
        if status != esp_gatt_status_t_ESP_GATT_OK {
            warn!("Characteristic enumeration failed: {status}");
            push_event(Event::PeerDisconnected);
            return;
        }

        for chrc in &chars[..char_count as usize] {
            if chrc.uuid.len != ESP_UUID_LEN_16 as u16 {
                continue;
            }
            let _ = attrs.push(RawAttr::Characteristic {
                uuid: chrc.uuid.uuid.uuid16,
                properties: chrc.properties as u8,
                value_handle: chrc.char_handle,
            });

            let mut descrs = [esp_gattc_descr_elem_t::default(); 4];
            let mut descr_count = descrs.len() as u16;
            let status = esp_ble_gattc_get_all_descr(
                gattc_if,
                conn_id,
                chrc.char_handle,
                descrs.as_mut_ptr(),
                &mut descr_count,
                0,
            );
            if status != esp_gatt_status_t_ESP_GATT_OK {
                continue;
            }
            for d in &descrs[..descr_count as usize] {
                if d.uuid.len != ESP_UUID_LEN_16 as u16 {
                    continue;
                }
                let _ = attrs.push(RawAttr::Descriptor {
                    uuid: d.uuid.uuid.uuid16,
                    handle: d.handle,
                });
            }
        }

        let svc = condense(ConnId(conn_id), UUID_LNS, &attrs);
        DISCOVERED.lock(|slot| slot.borrow_mut().replace(svc));
        push_event(Event::DiscoveryCompleted);
    }

    impl GattPort for BleCentral {
        fn subscribe(&mut self, conn: ConnId, req: &SubscribeRequest) -> Result<(), GattError> {
            debug!(
                "Subscribe: val {} ccc {} (volatile: {})",
                req.value_handle, req.ccc_handle, req.volatile
            );
            // Arm the peer's CCC; Bluedroid routes the resulting
            // notifications to our GATTC callback.
            // SAFETY: plain FFI call; the stack copies the value buffer
            // before returning.
            let ret = unsafe {
                esp_ble_gattc_write_char_descr(
                    self.gattc_if,
                    conn.0,
                    req.ccc_handle,
                    CCC_NOTIFY_ENABLE.len() as u16,
                    CCC_NOTIFY_ENABLE.as_ptr() as *mut _,
                    esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                    esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
                )
            };
            Self::check(ret, "CCC write")?;
            self.ccc_handle = req.ccc_handle;
            Ok(())
        }

        fn unsubscribe(&mut self, conn: ConnId, _value_handle: u16) -> Result<(), GattError> {
            let ret = unsafe {
                esp_ble_gattc_write_char_descr(
                    self.gattc_if,
                    conn.0,
                    self.ccc_handle,
                    CCC_DISABLE.len() as u16,
                    CCC_DISABLE.as_ptr() as *mut _,
                    esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                    esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
                )
            };
            Self::check(ret, "CCC clear")?;
            self.ccc_handle = 0;
            Ok(())
        }

        fn read(&mut self, conn: ConnId, handle: u16) -> Result<(), GattError> {
            // SAFETY: plain FFI call; completion arrives via the GATTC
            // event callback registered in the binary.
            let ret = unsafe {
                esp_ble_gattc_read_char(
                    self.gattc_if,
                    conn.0,
                    handle,
                    esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
                )
            };
            Self::check(ret, "Characteristic read")
        }
    }
}
