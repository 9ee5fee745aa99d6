//! Device identity.
//!
//! Every node carries an EUI-64 that seeds its gateway client id and
//! its telemetry topic.  Commissioning values (EUI, join credentials)
//! arrive as colon-separated hex strings and are parsed here.

use core::fmt;

use heapless::String;

/// Maximum length of a derived client id or topic name.
pub const MAX_NAME_LEN: usize = 48;

/// Errors from hex identity parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    /// The digit count (colons excluded) is odd.
    OddLength,
    /// More bytes encoded than the output can hold.
    TooLong,
    /// A character is neither a hex digit nor a colon.
    BadDigit,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OddLength => write!(f, "odd number of hex digits"),
            Self::TooLong => write!(f, "value too long"),
            Self::BadDigit => write!(f, "invalid hex digit"),
        }
    }
}

/// Parse a hex string into `out`, ignoring colon separators.
///
/// Accepts both `00:11:22` and `001122` forms.  `out` is zero-filled
/// first; unparsed trailing bytes stay zero.  Returns the number of
/// bytes decoded.
pub fn parse_hex(s: &str, out: &mut [u8]) -> Result<usize, IdentityError> {
    let digits = s.bytes().filter(|&b| b != b':').count();
    if digits % 2 != 0 {
        return Err(IdentityError::OddLength);
    }
    if digits / 2 > out.len() {
        return Err(IdentityError::TooLong);
    }

    out.fill(0);
    let mut nibbles = 0usize;
    for b in s.bytes() {
        if b == b':' {
            continue;
        }
        let value = match b {
            b'0'..=b'9' => b - b'0',
            b'A'..=b'F' => 10 + (b - b'A'),
            b'a'..=b'f' => 10 + (b - b'a'),
            _ => return Err(IdentityError::BadDigit),
        };
        out[nibbles / 2] |= value << ((1 - nibbles % 2) * 4);
        nibbles += 1;
    }
    Ok(nibbles / 2)
}

/// EUI-64 device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceEui(pub [u8; 8]);

impl DeviceEui {
    /// Parse from a commissioning string, e.g. `"f4:ce:36:00:00:00:00:01"`.
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let mut bytes = [0u8; 8];
        let n = parse_hex(s, &mut bytes)?;
        if n != 8 {
            return Err(IdentityError::TooLong);
        }
        Ok(Self(bytes))
    }

    /// Gateway client id: `<prefix>-<eui hex>`.
    pub fn client_id(&self, prefix: &str) -> String<MAX_NAME_LEN> {
        self.derived_name(prefix, '-')
    }

    /// Telemetry topic name: `<prefix>/<eui hex>`.
    pub fn topic(&self, prefix: &str) -> String<MAX_NAME_LEN> {
        self.derived_name(prefix, '/')
    }

    fn derived_name(&self, prefix: &str, sep: char) -> String<MAX_NAME_LEN> {
        let mut name = String::new();
        // Truncation cannot happen for the configured prefixes; a
        // pathological prefix just yields a shortened name.
        let _ = name.push_str(prefix);
        let _ = name.push(sep);
        for b in self.0 {
            let _ = fmt::write(&mut name, format_args!("{b:02x}"));
        }
        name
    }
}

impl fmt::Display for DeviceEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
