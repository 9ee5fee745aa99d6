//! Interrupt-driven event system.
//!
//! Events are produced by:
//! - BLE stack callbacks (discovery, notifications, disconnects)
//! - Mesh role and gateway session callbacks
//! - Timer callbacks (poll ticks, publish ticks)
//! - GNSS UART line assembly
//!
//! Events are consumed by the main loop, which processes them one at a
//! time in FIFO order.
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ BLE callbacks │────▶│              │     │              │
//! │ Mesh callbacks│────▶│  Event Queue │────▶│  Main Loop   │
//! │ Timers        │────▶│  (lock-free) │     │  (consumer)  │
//! │ GNSS UART     │────▶│              │     │              │
//! └───────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types, ordered by rough priority.
/// Lower discriminant = higher priority when multiple events
/// are pending simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Connectivity (highest priority) ───────────────────
    /// The tracked peer disconnected.
    PeerDisconnected   = 0,
    /// GATT discovery on the peer completed.
    DiscoveryCompleted = 1,
    /// Mesh device role changed (leader/router/child/detached).
    RoleChanged        = 2,
    /// A Location and Speed value notification arrived.
    ValueNotified      = 3,
    /// A pending characteristic read finished (either way).
    ReadCompleted      = 4,

    // ── Location data ─────────────────────────────────────
    /// A Location and Speed value was decoded and stored.
    FixUpdated         = 10,
    /// The peer delivered the aborted outcome (empty value or
    /// invalid flags sentinel).
    FixAborted         = 11,
    /// A complete NMEA sentence is ready for parsing.
    GnssSentence       = 12,

    // ── Timers ────────────────────────────────────────────
    /// Main loop tick; drives the LNS poll scheduler.
    PollTick           = 20,
    /// Status report publish timer fired.
    PublishTick        = 21,

    // ── Gateway session ───────────────────────────────────
    /// Gateway session state advanced (found/connected/registered).
    SessionAdvanced    = 30,
    /// Gateway session lost; the publisher must re-search.
    SessionLost        = 31,

    // ── Housekeeping ──────────────────────────────────────
    /// Watchdog heartbeat.
    WatchdogTick       = 50,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Stack callbacks write (produce), main loop reads (consume).
// Uses atomic head/tail indices.  The buffer is intentionally
// kept in a static so callbacks registered with C stacks can
// reach it without captured state.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: producer (push_event) runs in stack-callback / timer context,
// consumer (pop_event / drain_events) in the main-loop task.  One
// writer, one reader; the atomic head/tail indices enforce the SPSC
// discipline, so no concurrent mutable access to a slot is possible.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from callback context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    // SAFETY: single producer; the slot at `head` is not visible to the
    // consumer until the Release store below.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Check if the event queue is empty.
pub fn queue_is_empty() -> bool {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);
    tail == head
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0  => Some(Event::PeerDisconnected),
        1  => Some(Event::DiscoveryCompleted),
        2  => Some(Event::RoleChanged),
        3  => Some(Event::ValueNotified),
        4  => Some(Event::ReadCompleted),
        10 => Some(Event::FixUpdated),
        11 => Some(Event::FixAborted),
        12 => Some(Event::GnssSentence),
        20 => Some(Event::PollTick),
        21 => Some(Event::PublishTick),
        30 => Some(Event::SessionAdvanced),
        31 => Some(Event::SessionLost),
        50 => Some(Event::WatchdogTick),
        _  => None,
    }
}
