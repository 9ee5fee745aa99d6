//! GNSS UART adapter.
//!
//! Pulls raw bytes from the receiver's serial port and pushes them
//! through the line assembler into the NMEA parser.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: wraps `esp_idf_hal::uart::UartDriver`
//!   with a short read timeout so the main loop stays responsive.
//! - **all other targets**: [`SimGnssFeed`], which replays canned byte
//!   streams for tests.

use crate::gnss::{process_line, GnssDelegate, LineAssembler};

/// Feeds a byte slice through the assembler, dispatching every
/// completed sentence.  Shared by both backends.
pub fn feed_bytes(asm: &mut LineAssembler, bytes: &[u8], delegate: &mut impl GnssDelegate) {
    for &b in bytes {
        if let Some(line) = asm.push(b) {
            process_line(&line, delegate);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation backend
// ───────────────────────────────────────────────────────────────

/// Replays scripted receiver output on the host.
#[cfg(not(target_os = "espidf"))]
pub struct SimGnssFeed {
    asm: LineAssembler,
}

#[cfg(not(target_os = "espidf"))]
impl SimGnssFeed {
    pub fn new() -> Self {
        Self {
            asm: LineAssembler::new(),
        }
    }

    /// Inject bytes as if they arrived on the wire.
    pub fn inject(&mut self, bytes: &[u8], delegate: &mut impl GnssDelegate) {
        feed_bytes(&mut self.asm, bytes, delegate);
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimGnssFeed {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp_impl::GnssUart;

#[cfg(target_os = "espidf")]
mod esp_impl {
    use super::feed_bytes;
    use crate::gnss::{GnssDelegate, LineAssembler};
    use esp_idf_hal::uart::UartDriver;
    use log::warn;

    /// Chunk size for one UART drain pass.
    const READ_CHUNK: usize = 64;

    /// UART-backed GNSS byte source.
    pub struct GnssUart<'d> {
        uart: UartDriver<'d>,
        asm: LineAssembler,
    }

    impl<'d> GnssUart<'d> {
        /// The driver must already be configured at the receiver's baud
        /// rate (9600 by default, see `NodeConfig::gnss_baud`).
        pub fn new(uart: UartDriver<'d>) -> Self {
            Self {
                uart,
                asm: LineAssembler::new(),
            }
        }

        /// Drain whatever the receiver has sent since the last pass.
        /// Non-blocking: returns as soon as the FIFO is empty.
        pub fn service(&mut self, delegate: &mut impl GnssDelegate) {
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                match self.uart.read(&mut chunk, 0) {
                    Ok(0) => break,
                    Ok(n) => feed_bytes(&mut self.asm, &chunk[..n], delegate),
                    Err(e) => {
                        warn!("GNSS UART read failed: {e}");
                        break;
                    }
                }
            }
        }
    }
}
