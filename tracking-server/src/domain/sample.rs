//! Location samples reported by a device or the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coordinate::{Coordinate, InvalidCoordinate};

/// A single position fix.
///
/// Samples are immutable once created. On the wire they are flat
/// objects: `{ latitude, longitude, accuracy?, speed?, timestamp }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SampleWire", into = "SampleWire")]
pub struct LocationSample {
    /// Where the vehicle was.
    pub coordinate: Coordinate,

    /// Horizontal accuracy in metres, if the source reports one.
    pub accuracy: Option<f64>,

    /// Ground speed in metres per second, if known.
    pub speed: Option<f64>,

    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// Create a sample with no accuracy or speed information.
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            accuracy: None,
            speed: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, metres: f64) -> Self {
        self.accuracy = Some(metres);
        self
    }

    pub fn with_speed(mut self, metres_per_sec: f64) -> Self {
        self.speed = Some(metres_per_sec);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SampleWire {
    latitude: f64,
    longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<SampleWire> for LocationSample {
    type Error = InvalidCoordinate;

    fn try_from(wire: SampleWire) -> Result<Self, Self::Error> {
        Ok(Self {
            coordinate: Coordinate::new(wire.latitude, wire.longitude)?,
            accuracy: wire.accuracy,
            speed: wire.speed,
            timestamp: wire.timestamp,
        })
    }
}

impl From<LocationSample> for SampleWire {
    fn from(s: LocationSample) -> Self {
        SampleWire {
            latitude: s.coordinate.latitude(),
            longitude: s.coordinate.longitude(),
            accuracy: s.accuracy,
            speed: s.speed,
            timestamp: s.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backend_shape() {
        let json = r#"{
            "latitude": 51.5,
            "longitude": -0.12,
            "accuracy": 8.0,
            "timestamp": "2026-03-15T10:00:00Z"
        }"#;
        let sample: LocationSample = serde_json::from_str(json).unwrap();

        assert_eq!(sample.coordinate.latitude(), 51.5);
        assert_eq!(sample.accuracy, Some(8.0));
        assert_eq!(sample.speed, None);
        assert_eq!(sample.timestamp.to_rfc3339(), "2026-03-15T10:00:00+00:00");
    }

    #[test]
    fn rejects_invalid_coordinate() {
        let json = r#"{"latitude": 123.0, "longitude": 0.0, "timestamp": "2026-03-15T10:00:00Z"}"#;
        assert!(serde_json::from_str::<LocationSample>(json).is_err());
    }

    #[test]
    fn serializes_flat_and_omits_missing() {
        let at = DateTime::parse_from_rfc3339("2026-03-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let sample = LocationSample::new(Coordinate::new(1.0, 2.0).unwrap(), at).with_speed(3.5);
        let json = serde_json::to_value(sample).unwrap();

        assert_eq!(json["latitude"], 1.0);
        assert_eq!(json["longitude"], 2.0);
        assert_eq!(json["speed"], 3.5);
        assert!(json.get("accuracy").is_none());
    }
}
