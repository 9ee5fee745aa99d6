//! Location and Navigation Service client.
//!
//! One [`LnsClient`] per tracked peer connection.  The BLE adapter feeds
//! it a completed discovery result; the client resolves attribute
//! handles, picks a delivery mode (notification subscription when the
//! server supports it, periodic polling otherwise) and decodes every
//! incoming Location and Speed payload, keeping the last good fix
//! available for the publisher.
//!
//! ```text
//!  discovery ──▶ assign_handles ──▶ subscribe ──▶ handle_notification ─┐
//!                      │                                               ├─▶ last_fix
//!                      └──────────▶ start_periodic_read ─▶ poll_tick ──┘
//!                                        ▲                    │
//!                                        └─ handle_read_complete
//! ```
//!
//! The client itself never blocks: subscribe and read are asynchronous
//! requests on [`GattPort`] whose completions arrive later as method
//! calls from the adapter's event context.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::{debug, error, info, warn};

use crate::app::ports::{GattError, GattPort, SubscribeRequest};

use super::discovery::{
    ConnId, DiscoveredService, PROP_NOTIFY, UUID_GATT_CCC, UUID_LNS, UUID_LOCATION_AND_SPEED,
};
use super::loc_speed::{decode, LocationFix};

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

/// Errors from LNS client operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LnsError {
    /// A required argument is missing or out of range (e.g. zero poll
    /// interval).
    InvalidInput,
    /// No live connection is associated with the client.
    NoConnection,
    /// The discovered service is not LNS, or the server lacks the
    /// capability the operation needs (notify for subscribe, no-notify
    /// for polling).
    NotSupported,
    /// The Location and Speed characteristic or its value descriptor
    /// was not found during handle resolution.
    NotFound,
    /// A delivery callback is already registered.
    AlreadyActive,
    /// Unsubscribe was called with no active subscription.
    NothingSubscribed,
    /// A one-shot read is already pending.
    Busy,
    /// The transport rejected the request.
    Transport(GattError),
}

impl core::fmt::Display for LnsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid input"),
            Self::NoConnection => write!(f, "no connection"),
            Self::NotSupported => write!(f, "not supported by server"),
            Self::NotFound => write!(f, "characteristic not found"),
            Self::AlreadyActive => write!(f, "delivery already active"),
            Self::NothingSubscribed => write!(f, "nothing to unsubscribe"),
            Self::Busy => write!(f, "read already pending"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl From<GattError> for LnsError {
    fn from(e: GattError) -> Self {
        Self::Transport(e)
    }
}

// ───────────────────────────────────────────────────────────────
// Callback types
// ───────────────────────────────────────────────────────────────

/// Fix delivery callback.  `None` marks an aborted delivery: the server
/// sent an empty value or the invalid flags sentinel.
pub type FixCallback = Box<dyn FnMut(Option<&LocationFix>) + Send>;

/// One-shot read callback: decoded outcome plus the transport error, if
/// any.
pub type ReadCallback = Box<dyn FnMut(Option<&LocationFix>, Option<GattError>) + Send>;

/// Which request the next read completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingRead {
    None,
    OneShot,
    Periodic,
}

// ───────────────────────────────────────────────────────────────
// Periodic read state
// ───────────────────────────────────────────────────────────────

/// Poll timing for servers without a CCC descriptor.
///
/// The interval is atomic so that disabling can race a firing from a
/// different execution context: the completion path re-reads the
/// interval before re-arming and exits if it went to zero.  The state
/// itself lives for the whole process; reconnects cancel and reuse it
/// rather than recreating it.
struct PeriodicRead {
    /// Read interval in milliseconds.  Zero means polling is disabled.
    interval_ms: AtomicU32,
    /// Uptime deadline of the next firing, if armed.
    deadline_ms: Option<u64>,
}

impl PeriodicRead {
    const fn new() -> Self {
        Self {
            interval_ms: AtomicU32::new(0),
            deadline_ms: None,
        }
    }

    fn cancel(&mut self) {
        self.interval_ms.store(0, Ordering::Release);
        self.deadline_ms = None;
    }
}

// ───────────────────────────────────────────────────────────────
// LnsClient
// ───────────────────────────────────────────────────────────────

/// Client state for one Location and Navigation Service peer.
pub struct LnsClient {
    /// Non-owning connection id; the BLE adapter owns the connection.
    conn: Option<ConnId>,
    /// Value handle of the Location and Speed characteristic.
    /// Zero until handle resolution succeeds.
    val_handle: u16,
    /// Handle of the CCC descriptor, zero when the server has none.
    ccc_handle: u16,
    /// Property bitmask copied from the characteristic declaration.
    properties: u8,
    /// True once a CCC descriptor was found during resolution.
    notify: bool,
    /// The active delivery callback — at most one, shared by the
    /// notification and polling paths.
    callback: Option<FixCallback>,
    /// Pending one-shot read callback.
    read_cb: Option<ReadCallback>,
    pending_read: PendingRead,
    periodic: PeriodicRead,
    /// Last decoded fix.  Written from the delivery context, read from
    /// the publisher; the lock is held only for the copy.
    fix: Mutex<CriticalSectionRawMutex, Cell<LocationFix>>,
}

impl LnsClient {
    pub fn new() -> Self {
        Self {
            conn: None,
            val_handle: 0,
            ccc_handle: 0,
            properties: 0,
            notify: false,
            callback: None,
            read_cb: None,
            pending_read: PendingRead::None,
            periodic: PeriodicRead::new(),
            fix: Mutex::new(Cell::new(LocationFix::default())),
        }
    }

    // ── Handle resolution ─────────────────────────────────────

    /// Consume a completed discovery result and resolve the attribute
    /// handles this client needs.
    ///
    /// Call once per successful discovery, i.e. once per connection.
    /// The record is reset unconditionally before new handles are
    /// stored, so reusing the same client across reconnects is safe
    /// even without an intervening disconnect event.
    pub fn assign_handles(&mut self, svc: &DiscoveredService) -> Result<(), LnsError> {
        if svc.uuid != UUID_LNS {
            // Wrong service — leave the record untouched.
            return Err(LnsError::NotSupported);
        }
        debug!("Resolving handles from Location and Navigation service");

        // If a connection is established again, cancel the previous
        // read cycle; the periodic-read state is reused, not replaced.
        self.periodic.cancel();
        self.reinit();

        let chrc = svc
            .characteristic(UUID_LOCATION_AND_SPEED)
            .ok_or_else(|| {
                error!("No Location and Speed characteristic found");
                LnsError::NotFound
            })?;
        self.properties = chrc.properties;

        let value_desc = chrc.descriptor(UUID_LOCATION_AND_SPEED).ok_or_else(|| {
            error!("No Location and Speed characteristic value found");
            LnsError::NotFound
        })?;
        self.val_handle = value_desc.handle;

        match chrc.descriptor(UUID_GATT_CCC) {
            Some(ccc) => {
                self.notify = true;
                self.ccc_handle = ccc.handle;
            }
            None => {
                info!("No CCC descriptor found; server does not support notifications");
            }
        }

        // Finally, keep the connection id.
        self.conn = Some(svc.conn);
        Ok(())
    }

    /// Reset everything except the periodic-read timer resource.
    fn reinit(&mut self) {
        self.val_handle = 0;
        self.ccc_handle = 0;
        self.properties = 0;
        self.notify = false;
        self.callback = None;
        self.read_cb = None;
        self.pending_read = PendingRead::None;
        self.conn = None;
        self.fix.lock(|f| f.set(LocationFix::default()));
    }

    // ── Delivery mode: notifications ──────────────────────────

    /// Subscribe to Location and Speed change notifications.
    ///
    /// The callback registration and the subscribe request succeed or
    /// fail together: a rejected subscribe leaves no callback behind.
    pub fn subscribe(
        &mut self,
        gatt: &mut impl GattPort,
        callback: FixCallback,
    ) -> Result<(), LnsError> {
        let conn = self.conn.ok_or(LnsError::NoConnection)?;
        if self.properties & PROP_NOTIFY == 0 {
            return Err(LnsError::NotSupported);
        }
        if self.callback.is_some() {
            return Err(LnsError::AlreadyActive);
        }

        self.callback = Some(callback);

        let req = SubscribeRequest {
            value_handle: self.val_handle,
            ccc_handle: self.ccc_handle,
            // Do not persist the subscription across power cycles.
            volatile: true,
        };
        debug!(
            "Subscribe: val: {}, ccc: {}",
            req.value_handle, req.ccc_handle
        );
        if let Err(e) = gatt.subscribe(conn, &req) {
            error!("Notification subscribe error: {e}");
            self.callback = None;
            return Err(e.into());
        }
        debug!("Location and Speed subscribed");
        Ok(())
    }

    /// Remove the notification subscription.
    pub fn unsubscribe(&mut self, gatt: &mut impl GattPort) -> Result<(), LnsError> {
        if self.callback.is_none() {
            return Err(LnsError::NothingSubscribed);
        }
        let result = match self.conn {
            Some(conn) => gatt.unsubscribe(conn, self.val_handle).map_err(Into::into),
            None => Err(LnsError::NoConnection),
        };
        // The registration is cleared even when the transport call
        // fails; the link is going away anyway in that case.
        self.callback = None;
        result
    }

    /// Process a value notification from the subscribed characteristic.
    ///
    /// An empty buffer is the server's signal that it stopped sending
    /// data; the callback is invoked with the aborted outcome rather
    /// than the notification being dropped.
    pub fn handle_notification(&mut self, data: &[u8]) {
        if data.is_empty() {
            info!("Notifications disabled by server");
            if let Some(cb) = self.callback.as_mut() {
                cb(None);
            }
            return;
        }

        match decode(data) {
            Some(fix) => {
                self.fix.lock(|f| f.set(fix));
                if let Some(cb) = self.callback.as_mut() {
                    cb(Some(&fix));
                }
            }
            None => {
                error!("Unexpected notification value");
                if let Some(cb) = self.callback.as_mut() {
                    cb(None);
                }
            }
        }
    }

    // ── Delivery mode: periodic polling ───────────────────────

    /// Start periodic reads of the Location and Speed value.
    ///
    /// Used when the server has no CCC descriptor.  `interval_ms` must
    /// be positive; the first read fires once it elapses.
    pub fn start_periodic_read(
        &mut self,
        now_ms: u64,
        interval_ms: u32,
        callback: FixCallback,
    ) -> Result<(), LnsError> {
        if interval_ms == 0 {
            return Err(LnsError::InvalidInput);
        }
        if self.notify_supported() {
            return Err(LnsError::NotSupported);
        }
        if self.callback.is_some() {
            return Err(LnsError::AlreadyActive);
        }

        self.callback = Some(callback);
        self.periodic.interval_ms.store(interval_ms, Ordering::Release);
        self.periodic.deadline_ms = Some(now_ms + u64::from(interval_ms));
        info!("Periodic Location and Speed read every {interval_ms} ms");
        Ok(())
    }

    /// Stop periodic reads.  Idempotent and safe to call while a read
    /// cycle is in flight: the completion path re-reads the zeroed
    /// interval and stops instead of re-arming.
    pub fn stop_periodic_read(&mut self) {
        // Zero the interval first so a concurrently completing read
        // cannot trigger a new cycle, then drop the pending firing.
        self.periodic.cancel();
    }

    /// Drive the poll timer.  The main loop calls this with monotonic
    /// uptime; a due deadline issues one read request.
    pub fn poll_tick(&mut self, now_ms: u64, gatt: &mut impl GattPort) {
        let due = matches!(self.periodic.deadline_ms, Some(d) if now_ms >= d);
        if !due {
            return;
        }
        self.periodic.deadline_ms = None;

        if self.periodic.interval_ms.load(Ordering::Acquire) == 0 {
            // Disabled between arming and firing.
            return;
        }
        let Some(conn) = self.conn else {
            // Expected during a disconnect race; the cycle just ends.
            debug!("Poll fired without a connection; stopping cycle");
            return;
        };

        self.pending_read = PendingRead::Periodic;
        if let Err(e) = gatt.read(conn, self.val_handle) {
            // Reading after a disconnection is not an error worth
            // rescheduling for; the next discovery re-arms polling.
            error!("Periodic Location and Speed read error: {e}");
            self.pending_read = PendingRead::None;
        }
    }

    // ── One-shot read ─────────────────────────────────────────

    /// Read the Location and Speed value once.
    pub fn read_location_and_speed(
        &mut self,
        gatt: &mut impl GattPort,
        callback: ReadCallback,
    ) -> Result<(), LnsError> {
        let conn = self.conn.ok_or(LnsError::NoConnection)?;
        if self.read_cb.is_some() {
            return Err(LnsError::Busy);
        }
        self.read_cb = Some(callback);
        self.pending_read = PendingRead::OneShot;
        if let Err(e) = gatt.read(conn, self.val_handle) {
            self.read_cb = None;
            self.pending_read = PendingRead::None;
            return Err(e.into());
        }
        Ok(())
    }

    // ── Read completion ───────────────────────────────────────

    /// Process a read completion from the transport.
    ///
    /// For the periodic path this is the **only** place the next firing
    /// is armed, which bounds the system to one in-flight read and makes
    /// `stop_periodic_read` effective mid-cycle.
    pub fn handle_read_complete(&mut self, now_ms: u64, result: Result<&[u8], GattError>) {
        let pending = core::mem::replace(&mut self.pending_read, PendingRead::None);
        match pending {
            PendingRead::None => {
                warn!("Unexpected read completion");
            }
            PendingRead::OneShot => {
                let Some(mut cb) = self.read_cb.take() else {
                    error!("No read callback present");
                    return;
                };
                match result {
                    Ok(data) => match decode(data) {
                        Some(fix) => {
                            self.fix.lock(|f| f.set(fix));
                            cb(Some(&fix), None);
                        }
                        None => cb(None, None),
                    },
                    Err(e) => {
                        error!("Read value error: {e}");
                        cb(None, Some(e));
                    }
                }
            }
            PendingRead::Periodic => {
                match result {
                    Ok(data) => match decode(data) {
                        Some(fix) => {
                            self.fix.lock(|f| f.set(fix));
                            if let Some(cb) = self.callback.as_mut() {
                                cb(Some(&fix));
                            }
                        }
                        None => {
                            if let Some(cb) = self.callback.as_mut() {
                                cb(None);
                            }
                        }
                    },
                    Err(e) => {
                        error!("Periodic read value error: {e}");
                    }
                }

                // Sole re-arm path.  A concurrent stop_periodic_read
                // zeroed the interval and we fall through to idle.
                let interval = self.periodic.interval_ms.load(Ordering::Acquire);
                if interval != 0 {
                    self.periodic.deadline_ms = Some(now_ms + u64::from(interval));
                }
            }
        }
    }

    // ── Disconnect ────────────────────────────────────────────

    /// Invalidate the connection eagerly on a disconnect event.
    ///
    /// Handles stay numerically assigned but every operation checks the
    /// connection first, so nothing can act on them; the next discovery
    /// resets the record fully.
    pub fn handle_disconnect(&mut self) {
        self.conn = None;
        self.callback = None;
        self.read_cb = None;
        self.pending_read = PendingRead::None;
        self.periodic.cancel();
    }

    // ── Accessors ─────────────────────────────────────────────

    /// Last known fix, as updated by either delivery path.  Check the
    /// presence flags before trusting any field.
    pub fn last_fix(&self) -> LocationFix {
        self.fix.lock(Cell::get)
    }

    /// Whether the server supports change notifications.
    pub fn notify_supported(&self) -> bool {
        self.notify
    }

    /// Connection id the client is bound to, if any.
    pub fn conn(&self) -> Option<ConnId> {
        self.conn
    }

    /// Whether periodic polling is currently enabled.
    pub fn polling_enabled(&self) -> bool {
        self.periodic.interval_ms.load(Ordering::Acquire) != 0
    }
}

impl Default for LnsClient {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
