//! Polyline representation for route geometries.
//!
//! Routes are kept as decoded coordinate sequences. The compact encoded
//! format is only decoded at the boundary, when a geometry arrives from OSRM.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::GeoPoint;

/// Precision used by OSRM for `geometries=polyline`.
pub const OSRM_PRECISION: u32 = 5;

/// An ordered sequence of `(latitude, longitude)` pairs.
///
/// Serializes as a plain array of `[lat, lng]` pairs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    #[error("invalid polyline character at offset {offset}")]
    InvalidCharacter { offset: usize },
    #[error("polyline ends inside a coordinate")]
    Truncated,
    #[error("polyline value overflows at offset {offset}")]
    Overflow { offset: usize },
}

impl Polyline {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Straight polyline through the given points in order.
    pub fn through(points: &[GeoPoint]) -> Self {
        Self::new(points.iter().map(GeoPoint::lat_lng).collect())
    }

    /// Decodes the encoded polyline format at the given decimal precision.
    pub fn decode(encoded: &str, precision: u32) -> Result<Self, PolylineError> {
        let factor = 10f64.powi(precision as i32);
        let bytes = encoded.as_bytes();
        let mut offset = 0;
        let mut lat = 0i64;
        let mut lng = 0i64;
        let mut points = Vec::new();

        while offset < bytes.len() {
            lat += next_delta(bytes, &mut offset)?;
            if offset >= bytes.len() {
                return Err(PolylineError::Truncated);
            }
            lng += next_delta(bytes, &mut offset)?;
            points.push((lat as f64 / factor, lng as f64 / factor));
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Reads one zig-zag encoded varint starting at `offset`.
fn next_delta(bytes: &[u8], offset: &mut usize) -> Result<i64, PolylineError> {
    let mut result = 0i64;
    let mut shift = 0u32;

    loop {
        let Some(&byte) = bytes.get(*offset) else {
            return Err(PolylineError::Truncated);
        };
        if !(63..127).contains(&byte) {
            return Err(PolylineError::InvalidCharacter { offset: *offset });
        }
        if shift > 60 {
            return Err(PolylineError::Overflow { offset: *offset });
        }
        *offset += 1;

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[(f64, f64)], expected: &[(f64, f64)]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a.0 - e.0).abs() < 1e-9, "{:?} != {:?}", a, e);
            assert!((a.1 - e.1).abs() < 1e-9, "{:?} != {:?}", a, e);
        }
    }

    #[test]
    fn test_decode_reference_vector() {
        let polyline = Polyline::decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@", OSRM_PRECISION).unwrap();
        assert_close(
            polyline.points(),
            &[(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)],
        );
    }

    #[test]
    fn test_decode_empty() {
        let polyline = Polyline::decode("", OSRM_PRECISION).unwrap();
        assert!(polyline.is_empty());
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        // Latitude of the first point only.
        assert_eq!(
            Polyline::decode("_p~iF", OSRM_PRECISION),
            Err(PolylineError::Truncated)
        );
        // Continuation bit set on the last character.
        assert_eq!(
            Polyline::decode("_p~iF~ps|", OSRM_PRECISION),
            Err(PolylineError::Truncated)
        );
    }

    #[test]
    fn test_decode_rejects_invalid_character() {
        assert_eq!(
            Polyline::decode("_p~iF ps|U", OSRM_PRECISION),
            Err(PolylineError::InvalidCharacter { offset: 5 })
        );
    }

    #[test]
    fn test_through_points() {
        let polyline = Polyline::through(&[GeoPoint::new(51.0, 13.7), GeoPoint::new(51.1, 13.8)]);
        assert_eq!(polyline.into_points(), vec![(51.0, 13.7), (51.1, 13.8)]);
    }

    #[test]
    fn test_serializes_as_pairs() {
        let polyline = Polyline::new(vec![(1.5, 2.5), (3.0, 4.0)]);
        let json = serde_json::to_string(&polyline).unwrap();
        assert_eq!(json, "[[1.5,2.5],[3.0,4.0]]");
        let back: Polyline = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
    }
}
