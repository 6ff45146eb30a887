//! Great-circle distance and straight-line ETA.
//!
//! The ETA here is a heuristic for immediate display while a route lookup
//! is in flight. It is deliberately independent of any routed polyline and
//! the two figures are never reconciled.

use serde::Serialize;

use crate::domain::Coordinate;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average speed assumed by [`eta_minutes`] when none is given.
pub const DEFAULT_AVG_SPEED_KMH: f64 = 40.0;

/// Haversine distance between two points in kilometres.
///
/// Symmetric, zero for identical points.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.longitude() - a.longitude()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Clamp guards asin against h drifting a hair above 1 for antipodes
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Straight-line travel time in whole minutes at `avg_speed_kmh`.
///
/// Returns 0 for a non-positive or non-finite speed.
pub fn eta_minutes(a: Coordinate, b: Coordinate, avg_speed_kmh: f64) -> i64 {
    if !avg_speed_kmh.is_finite() || avg_speed_kmh <= 0.0 {
        return 0;
    }
    (distance_km(a, b) / avg_speed_kmh * 60.0).round() as i64
}

/// Sum of segment lengths along a path, in kilometres.
pub fn path_length_km(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| distance_km(w[0], w[1])).sum()
}

/// Straight-line summary shown before a routed answer is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub eta_minutes: i64,
}

impl RouteEstimate {
    /// Estimate using [`DEFAULT_AVG_SPEED_KMH`].
    pub fn between(origin: Coordinate, destination: Coordinate) -> Self {
        Self::with_speed(origin, destination, DEFAULT_AVG_SPEED_KMH)
    }

    pub fn with_speed(origin: Coordinate, destination: Coordinate, avg_speed_kmh: f64) -> Self {
        Self {
            distance_km: distance_km(origin, destination),
            eta_minutes: eta_minutes(origin, destination, avg_speed_kmh),
        }
    }
}
