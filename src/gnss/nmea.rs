//! NMEA 0183 sentence parser.
//!
//! Only the two sentences the tracker consumes are decoded: RMC
//! (position, speed, validity) and GGA (fix quality, altitude).  Other
//! sentence types parse as [`Sentence::Unsupported`] so callers can
//! ignore them without treating them as errors.
//!
//! A trailing `*hh` checksum is verified when present; receivers that
//! omit it are still accepted.

/// Position/speed frame ($xxRMC).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmcData {
    /// Receiver data-valid flag (status field `A`).
    pub valid: bool,
    /// Decimal degrees, south negative.
    pub latitude: f32,
    /// Decimal degrees, west negative.
    pub longitude: f32,
    /// Speed over ground, knots.
    pub speed_knots: f32,
}

/// Fix frame ($xxGGA).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GgaData {
    /// 0 = no fix, 1 = GPS fix, 2 = differential.
    pub fix_quality: u8,
    /// Antenna altitude above mean sea level, metres.
    pub altitude_m: f32,
}

/// One parsed sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentence {
    Rmc(RmcData),
    Gga(GgaData),
    /// Recognised framing but a sentence type we do not decode.
    Unsupported,
}

/// Parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmeaError {
    /// Line does not start with `$`.
    MissingStart,
    /// The `*hh` checksum does not match the payload.
    BadChecksum,
    /// Fewer fields than the sentence type requires.
    TooFewFields,
    /// A field failed numeric conversion.
    BadField(&'static str),
}

impl core::fmt::Display for NmeaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingStart => write!(f, "missing '$'"),
            Self::BadChecksum => write!(f, "checksum mismatch"),
            Self::TooFewFields => write!(f, "too few fields"),
            Self::BadField(name) => write!(f, "bad {name} field"),
        }
    }
}

/// Parse one complete sentence (no line terminator).
pub fn parse(line: &str) -> Result<Sentence, NmeaError> {
    let body = line.strip_prefix('$').ok_or(NmeaError::MissingStart)?;

    let payload = match body.rsplit_once('*') {
        Some((payload, given)) => {
            let sum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
            let given = u8::from_str_radix(given, 16).map_err(|_| NmeaError::BadChecksum)?;
            if sum != given {
                return Err(NmeaError::BadChecksum);
            }
            payload
        }
        None => body,
    };

    let mut fields = payload.split(',');
    let tag = fields.next().ok_or(NmeaError::TooFewFields)?;
    // Skip the two-letter talker id ("GP", "GN", ...).
    let kind = tag.get(2..).unwrap_or("");

    match kind {
        "RMC" => parse_rmc(fields).map(Sentence::Rmc),
        "GGA" => parse_gga(fields).map(Sentence::Gga),
        _ => Ok(Sentence::Unsupported),
    }
}

fn parse_rmc<'a>(mut f: impl Iterator<Item = &'a str>) -> Result<RmcData, NmeaError> {
    let _time = f.next().ok_or(NmeaError::TooFewFields)?;
    let status = f.next().ok_or(NmeaError::TooFewFields)?;
    let lat = f.next().ok_or(NmeaError::TooFewFields)?;
    let ns = f.next().ok_or(NmeaError::TooFewFields)?;
    let lon = f.next().ok_or(NmeaError::TooFewFields)?;
    let ew = f.next().ok_or(NmeaError::TooFewFields)?;
    let speed = f.next().ok_or(NmeaError::TooFewFields)?;

    Ok(RmcData {
        valid: status == "A",
        latitude: parse_coord(lat, ns, "latitude")?,
        longitude: parse_coord(lon, ew, "longitude")?,
        speed_knots: parse_float(speed, "speed")?,
    })
}

fn parse_gga<'a>(mut f: impl Iterator<Item = &'a str>) -> Result<GgaData, NmeaError> {
    let _time = f.next().ok_or(NmeaError::TooFewFields)?;
    let _lat = f.next().ok_or(NmeaError::TooFewFields)?;
    let _ns = f.next().ok_or(NmeaError::TooFewFields)?;
    let _lon = f.next().ok_or(NmeaError::TooFewFields)?;
    let _ew = f.next().ok_or(NmeaError::TooFewFields)?;
    let quality = f.next().ok_or(NmeaError::TooFewFields)?;
    let _sats = f.next().ok_or(NmeaError::TooFewFields)?;
    let _hdop = f.next().ok_or(NmeaError::TooFewFields)?;
    let altitude = f.next().ok_or(NmeaError::TooFewFields)?;

    let fix_quality = if quality.is_empty() {
        0
    } else {
        quality.parse().map_err(|_| NmeaError::BadField("quality"))?
    };
    Ok(GgaData {
        fix_quality,
        altitude_m: parse_float(altitude, "altitude")?,
    })
}

/// Convert an NMEA `ddmm.mmmm` coordinate to decimal degrees.
///
/// Empty fields (receiver without a fix) decode as 0.0.
fn parse_coord(field: &str, hemisphere: &str, name: &'static str) -> Result<f32, NmeaError> {
    if field.is_empty() {
        return Ok(0.0);
    }
    let dot = field.find('.').unwrap_or(field.len());
    if dot < 3 {
        return Err(NmeaError::BadField(name));
    }
    let degrees: f32 = field[..dot - 2]
        .parse()
        .map_err(|_| NmeaError::BadField(name))?;
    let minutes: f32 = field[dot - 2..]
        .parse()
        .map_err(|_| NmeaError::BadField(name))?;
    let value = degrees + minutes / 60.0;
    Ok(match hemisphere {
        "S" | "W" => -value,
        _ => value,
    })
}

fn parse_float(field: &str, name: &'static str) -> Result<f32, NmeaError> {
    if field.is_empty() {
        return Ok(0.0);
    }
    field.parse().map_err(|_| NmeaError::BadField(name))
}
