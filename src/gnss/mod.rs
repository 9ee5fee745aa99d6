//! On-board GNSS receiver support.
//!
//! The receiver streams NMEA 0183 sentences over UART.  The adapter
//! feeds raw bytes into [`LineAssembler`]; completed lines go through
//! [`nmea::parse`] and the decoded frames reach the application via
//! [`GnssDelegate`].

pub mod nmea;

use log::{debug, warn};

use nmea::{GgaData, RmcData, Sentence};

/// Longest permitted sentence, per NMEA 0183 ("$" through checksum).
pub const MAX_SENTENCE_LEN: usize = 82;

/// Callbacks for decoded GNSS frames.
///
/// The main loop implements this by updating the telemetry snapshot;
/// the parser itself knows nothing about where the data goes.
pub trait GnssDelegate {
    /// A position/speed frame arrived.  `valid` is the receiver's own
    /// data-valid flag; coordinates are decimal degrees.
    fn on_rmc(&mut self, frame: &RmcData);

    /// A fix frame arrived; `altitude_m` is metres above mean sea level.
    fn on_gga(&mut self, frame: &GgaData);
}

/// Assembles UART bytes into NMEA lines.
///
/// CR and LF both terminate a line; empty lines (the LF after a CR) are
/// swallowed.  Oversized lines are dropped up to the next terminator.
pub struct LineAssembler {
    buf: heapless::Vec<u8, MAX_SENTENCE_LEN>,
    overflow: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            overflow: false,
        }
    }

    /// Feed one received byte.  Returns a completed line, without its
    /// terminator, when one just ended.
    pub fn push(&mut self, byte: u8) -> Option<heapless::Vec<u8, MAX_SENTENCE_LEN>> {
        if byte == b'\r' || byte == b'\n' {
            let overflowed = core::mem::take(&mut self.overflow);
            let line = core::mem::take(&mut self.buf);
            if overflowed {
                warn!("Oversized NMEA line dropped");
                return None;
            }
            if line.is_empty() {
                return None;
            }
            return Some(line);
        }
        if self.buf.push(byte).is_err() {
            self.overflow = true;
        }
        None
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one assembled line and dispatch it to the delegate.
pub fn process_line(line: &[u8], delegate: &mut impl GnssDelegate) {
    let Ok(text) = core::str::from_utf8(line) else {
        warn!("Non-ASCII NMEA line dropped");
        return;
    };
    debug!("Rx: >{text}<");
    match nmea::parse(text) {
        Ok(Sentence::Rmc(frame)) => delegate.on_rmc(&frame),
        Ok(Sentence::Gga(frame)) => delegate.on_gga(&frame),
        Ok(Sentence::Unsupported) => {}
        Err(e) => warn!("NMEA sentence is not parsed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        rmc: Vec<RmcData>,
        gga: Vec<GgaData>,
    }

    impl GnssDelegate for Recorder {
        fn on_rmc(&mut self, frame: &RmcData) {
            self.rmc.push(frame.clone());
        }
        fn on_gga(&mut self, frame: &GgaData) {
            self.gga.push(frame.clone());
        }
    }

    #[test]
    fn assembles_crlf_terminated_lines() {
        let mut asm = LineAssembler::new();
        let mut lines = Vec::new();
        for b in b"$GPGGA,1\r\n$GPRMC,2\r\n" {
            if let Some(line) = asm.push(*b) {
                lines.push(line);
            }
        }
        assert_eq!(lines.len(), 2, "LF after CR must not yield an empty line");
        assert_eq!(&lines[0][..], b"$GPGGA,1");
        assert_eq!(&lines[1][..], b"$GPRMC,2");
    }

    #[test]
    fn oversized_line_is_dropped_then_recovery() {
        let mut asm = LineAssembler::new();
        for _ in 0..200 {
            assert!(asm.push(b'x').is_none());
        }
        assert!(asm.push(b'\n').is_none(), "overflowed line discarded");
        assert!(asm.push(b'a').is_none());
        let line = asm.push(b'\r').unwrap();
        assert_eq!(&line[..], b"a");
    }

    #[test]
    fn dispatches_rmc_and_gga() {
        let mut rec = Recorder::default();
        process_line(
            b"$GPRMC,081836,A,3751.65,S,14507.36,E,000.0,360.0,130998,011.3,E*62",
            &mut rec,
        );
        process_line(
            b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
            &mut rec,
        );
        assert_eq!(rec.rmc.len(), 1);
        assert_eq!(rec.gga.len(), 1);
        assert!(rec.rmc[0].valid);
        assert!((rec.gga[0].altitude_m - 545.4).abs() < 0.01);
    }

    #[test]
    fn garbage_is_ignored() {
        let mut rec = Recorder::default();
        process_line(b"$GPRMC,bogus*00", &mut rec);
        process_line(&[0xFF, 0xFE], &mut rec);
        assert!(rec.rmc.is_empty());
        assert!(rec.gga.is_empty());
    }
}
