//! Location and Speed characteristic payload decoder.
//!
//! The characteristic value is a little-endian 16-bit flags word followed
//! by a packed sequence of optional fields.  Bit N of the flags word says
//! whether field N is present; present fields always appear in declaration
//! order, so the byte offset of any field depends on which earlier bits
//! are set.
//!
//! | bit | field               | width | stored |
//! |-----|---------------------|-------|--------|
//! | 0   | instantaneous speed | 2     | yes    |
//! | 1   | total distance      | 3     | no     |
//! | 2   | location (lat, lon) | 4 + 4 | yes    |
//! | 3   | elevation           | 3     | no     |
//! | 4   | heading             | 2     | yes    |
//! | 5   | rolling time        | 1     | yes    |
//! | 6   | UTC time            | 0     | no     |
//!
//! Total distance, elevation and UTC time are skipped over but not stored;
//! the cursor still has to advance past them to reach later fields.

/// Flags word value marking the payload as invalid.
///
/// A zero flags word doubles as "no optional fields present", but the
/// server uses it to signal that speed and location are unknown, so it is
/// always treated as the aborted outcome rather than a valid empty record.
pub const FLAGS_INVALID: u16 = 0;

const FLAG_INSTANT_SPEED: u16 = 1 << 0;
const FLAG_TOTAL_DISTANCE: u16 = 1 << 1;
const FLAG_LOCATION: u16 = 1 << 2;
const FLAG_ELEVATION: u16 = 1 << 3;
const FLAG_HEADING: u16 = 1 << 4;
const FLAG_ROLLING_TIME: u16 = 1 << 5;
const FLAG_UTC_TIME: u16 = 1 << 6;

/// One decoded Location and Speed sample.
///
/// A field is meaningful **only** when its `*_present` flag is set.
/// Zero is a legitimate value (a stationary tracker reports speed 0), so
/// readers must check the flag, never the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationFix {
    pub instant_speed_present: bool,
    pub total_distance_present: bool,
    pub location_present: bool,
    pub elevation_present: bool,
    pub heading_present: bool,
    pub rolling_time_present: bool,
    pub utc_time_present: bool,

    /// Instantaneous speed, 1/10 metre per second.
    pub instant_speed: u16,
    /// Total distance in metres, 24 bits on the wire. Never decoded.
    pub total_distance: u32,
    /// Latitude, 1e-7 degrees.
    pub latitude: i32,
    /// Longitude, 1e-7 degrees.
    pub longitude: i32,
    /// Elevation, 1/100 metre, 24 bits on the wire. Never decoded.
    pub elevation: i32,
    /// Heading, 1/100 degree.
    pub heading: u16,
    /// Rolling time, seconds.
    pub rolling_time: u8,
}

/// Decode one characteristic value.
///
/// Returns `None` for the three aborted conditions: an empty buffer (the
/// server's way of saying it stopped sending data), a flags word equal to
/// [`FLAGS_INVALID`], or a buffer too short for the fields its flags
/// claim.  Anything else yields a fix whose unset fields stay at their
/// defaults with their presence flags false.
pub fn decode(data: &[u8]) -> Option<LocationFix> {
    if data.len() < 2 {
        return None;
    }

    let flags = u16::from_le_bytes([data[0], data[1]]);

    let mut fix = LocationFix {
        instant_speed_present: flags & FLAG_INSTANT_SPEED != 0,
        total_distance_present: flags & FLAG_TOTAL_DISTANCE != 0,
        location_present: flags & FLAG_LOCATION != 0,
        elevation_present: flags & FLAG_ELEVATION != 0,
        heading_present: flags & FLAG_HEADING != 0,
        rolling_time_present: flags & FLAG_ROLLING_TIME != 0,
        utc_time_present: flags & FLAG_UTC_TIME != 0,
        ..LocationFix::default()
    };

    let mut cursor = 2usize;

    if fix.instant_speed_present {
        fix.instant_speed = u16::from_le_bytes(take::<2>(data, &mut cursor)?);
    }
    if fix.total_distance_present {
        // 24-bit field, currently discarded.
        skip(data, &mut cursor, 3)?;
    }
    if fix.location_present {
        fix.latitude = i32::from_le_bytes(take::<4>(data, &mut cursor)?);
        fix.longitude = i32::from_le_bytes(take::<4>(data, &mut cursor)?);
    }
    if fix.elevation_present {
        // 24-bit field, currently discarded.
        skip(data, &mut cursor, 3)?;
    }
    if fix.heading_present {
        fix.heading = u16::from_le_bytes(take::<2>(data, &mut cursor)?);
    }
    if fix.rolling_time_present {
        fix.rolling_time = take::<1>(data, &mut cursor)?[0];
    }
    // UTC time (YYMMDDHHMMSS) would follow here; zero bytes consumed.

    if flags == FLAGS_INVALID {
        return None;
    }

    Some(fix)
}

fn take<const N: usize>(data: &[u8], cursor: &mut usize) -> Option<[u8; N]> {
    let bytes = data.get(*cursor..*cursor + N)?;
    *cursor += N;
    // Slice length is exactly N by construction.
    bytes.try_into().ok()
}

fn skip(data: &[u8], cursor: &mut usize, width: usize) -> Option<()> {
    data.get(*cursor..*cursor + width)?;
    *cursor += width;
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_aborted() {
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&[0x01]), None);
    }

    #[test]
    fn zero_flags_word_is_aborted_not_empty_record() {
        // 0x0000 is both "nothing present" and the invalid sentinel; the
        // sentinel interpretation wins.
        assert_eq!(decode(&[0x00, 0x00]), None);
        assert_eq!(decode(&[0x00, 0x00, 0xAA, 0xBB]), None);
    }

    #[test]
    fn speed_only() {
        // speed = 123 (12.3 m/s)
        let fix = decode(&[0x01, 0x00, 0x7B, 0x00]).unwrap();
        assert!(fix.instant_speed_present);
        assert_eq!(fix.instant_speed, 123);
        assert!(!fix.location_present);
        assert!(!fix.heading_present);
        assert_eq!(fix.latitude, 0);
    }

    #[test]
    fn zero_speed_is_a_valid_value() {
        let fix = decode(&[0x01, 0x00, 0x00, 0x00]).unwrap();
        assert!(fix.instant_speed_present);
        assert_eq!(fix.instant_speed, 0);
    }

    #[test]
    fn location_only_extracts_signed_le_pair_at_offset_2() {
        let lat: i32 = 634_123_456; // 63.4123456 deg
        let lon: i32 = -105_987_654;
        let mut buf = vec![0x04, 0x00];
        buf.extend_from_slice(&lat.to_le_bytes());
        buf.extend_from_slice(&lon.to_le_bytes());

        let fix = decode(&buf).unwrap();
        assert!(fix.location_present);
        assert_eq!(fix.latitude, lat);
        assert_eq!(fix.longitude, lon);
        assert!(!fix.instant_speed_present);
        assert!(!fix.heading_present);
        assert!(!fix.rolling_time_present);
        assert_eq!(fix.instant_speed, 0);
        assert_eq!(fix.heading, 0);
    }

    #[test]
    fn cursor_follows_bit_order_with_skipped_fields_compacted() {
        // speed + location + heading set: bytes must be consumed as
        // speed(2) then location(8) then heading(2) with no distance or
        // elevation gaps.
        let mut buf = vec![0x15, 0x00]; // bits 0, 2, 4
        buf.extend_from_slice(&55u16.to_le_bytes());
        buf.extend_from_slice(&7_000_000i32.to_le_bytes());
        buf.extend_from_slice(&(-7_000_000i32).to_le_bytes());
        buf.extend_from_slice(&27_000u16.to_le_bytes()); // 270.00 deg

        let fix = decode(&buf).unwrap();
        assert_eq!(fix.instant_speed, 55);
        assert_eq!(fix.latitude, 7_000_000);
        assert_eq!(fix.longitude, -7_000_000);
        assert_eq!(fix.heading, 27_000);
    }

    #[test]
    fn distance_and_elevation_are_skipped_not_stored() {
        // distance + location + elevation set.
        let mut buf = vec![0x0E, 0x00]; // bits 1, 2, 3
        buf.extend_from_slice(&[0x11, 0x22, 0x33]); // distance, discarded
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&2i32.to_le_bytes());
        buf.extend_from_slice(&[0x44, 0x55, 0x66]); // elevation, discarded

        let fix = decode(&buf).unwrap();
        assert!(fix.total_distance_present);
        assert!(fix.elevation_present);
        assert_eq!(fix.total_distance, 0);
        assert_eq!(fix.elevation, 0);
        assert_eq!(fix.latitude, 1);
        assert_eq!(fix.longitude, 2);
    }

    #[test]
    fn all_flags_full_payload() {
        let mut buf = vec![0x7F, 0x00];
        buf.extend_from_slice(&10u16.to_le_bytes()); // speed
        buf.extend_from_slice(&[1, 2, 3]); // distance
        buf.extend_from_slice(&100i32.to_le_bytes());
        buf.extend_from_slice(&200i32.to_le_bytes());
        buf.extend_from_slice(&[4, 5, 6]); // elevation
        buf.extend_from_slice(&300u16.to_le_bytes()); // heading
        buf.push(9); // rolling time
        // UTC time bit set, zero bytes consumed.

        let fix = decode(&buf).unwrap();
        assert!(fix.utc_time_present);
        assert_eq!(fix.instant_speed, 10);
        assert_eq!(fix.latitude, 100);
        assert_eq!(fix.longitude, 200);
        assert_eq!(fix.heading, 300);
        assert_eq!(fix.rolling_time, 9);
    }

    #[test]
    fn truncated_flagged_field_is_aborted() {
        // Location flag set but only 5 of the 8 coordinate bytes present.
        assert_eq!(decode(&[0x04, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05]), None);
    }

    #[test]
    fn decode_is_deterministic() {
        let buf = [0x05, 0x00, 0x2A, 0x00, 1, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(decode(&buf), decode(&buf));
    }
}
