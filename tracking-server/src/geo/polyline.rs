//! Encoded polyline codec (precision 1e5).
//!
//! Each coordinate is stored as a pair of signed deltas from the previous
//! point, latitude first. A delta is zigzag-encoded and written as 5-bit
//! groups, least significant first, each offset by 63 into printable ASCII.
//! Bit `0x20` of a group marks that another group follows.

use crate::domain::{Coordinate, ErrorKind};

/// Scale between degrees and the integer units on the wire.
const PRECISION: f64 = 1e5;

/// Offset added to every 5-bit group to make it printable.
const CHAR_OFFSET: u8 = 63;

/// Continuation flag within a group.
const CONTINUATION: i64 = 0x20;

/// Payload bits within a group.
const GROUP_MASK: i64 = 0x1f;

/// Groups beyond this shift cannot belong to a valid coordinate delta.
const MAX_SHIFT: u32 = 35;

/// Errors from decoding an encoded polyline.
///
/// All of these are fatal for the route being decoded; none of them mean
/// "no route".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolylineError {
    /// Input ended in the middle of a value.
    #[error("polyline truncated at byte {offset}")]
    Truncated { offset: usize },

    /// Byte outside the `?`..=`~` alphabet.
    #[error("invalid polyline byte 0x{byte:02x} at offset {offset}")]
    InvalidCharacter { offset: usize, byte: u8 },

    /// A latitude with no longitude after it.
    #[error("polyline ends after a latitude with no longitude (offset {offset})")]
    UnpairedLatitude { offset: usize },

    /// A value used more groups than any coordinate delta can.
    #[error("polyline value too long at offset {offset}")]
    Overflow { offset: usize },

    /// Accumulated position left the valid latitude/longitude range.
    #[error("decoded point {index} is out of range")]
    OutOfRange { index: usize },
}

impl PolylineError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }
}

/// Decode an encoded polyline into an ordered list of coordinates.
///
/// An empty string decodes to an empty list.
///
/// # Examples
///
/// ```
/// use tracking_server::geo::polyline;
///
/// let points = polyline::decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
/// assert_eq!(points.len(), 3);
/// assert!((points[0].latitude() - 38.5).abs() < 1e-5);
///
/// assert!(polyline::decode("_p~i").is_err());
/// ```
pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += decode_value(bytes, &mut index)?;

        if index >= bytes.len() {
            return Err(PolylineError::UnpairedLatitude { offset: index });
        }
        lng += decode_value(bytes, &mut index)?;

        let point = Coordinate::new(lat as f64 / PRECISION, lng as f64 / PRECISION).map_err(
            |_| PolylineError::OutOfRange {
                index: points.len(),
            },
        )?;
        points.push(point);
    }

    Ok(points)
}

/// Read one zigzag-encoded signed value starting at `*index`.
fn decode_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let byte = *bytes
            .get(*index)
            .ok_or(PolylineError::Truncated { offset: *index })?;

        if !(CHAR_OFFSET..=b'~').contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                offset: *index,
                byte,
            });
        }
        if shift >= MAX_SHIFT {
            return Err(PolylineError::Overflow { offset: *index });
        }

        let group = i64::from(byte - CHAR_OFFSET);
        result |= (group & GROUP_MASK) << shift;
        shift += 5;
        *index += 1;

        if group & CONTINUATION == 0 {
            break;
        }
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encode coordinates as a polyline.
///
/// Coordinates are rounded to five decimal places, so
/// `decode(&encode(points))` reproduces `points` to within 1e-5 degrees.
pub fn encode(points: &[Coordinate]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points {
        let lat = (point.latitude() * PRECISION).round() as i64;
        let lng = (point.longitude() * PRECISION).round() as i64;

        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);

        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };

    while value >= CONTINUATION {
        let group = (CONTINUATION | (value & GROUP_MASK)) as u8;
        out.push(char::from(group + CHAR_OFFSET));
        value >>= 5;
    }
    out.push(char::from(value as u8 + CHAR_OFFSET));
}
