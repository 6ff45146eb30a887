//! Route geometry and straight-line estimates.

pub mod distance;
pub mod polyline;

pub use distance::{
    DEFAULT_AVG_SPEED_KMH, EARTH_RADIUS_KM, RouteEstimate, distance_km, eta_minutes,
    path_length_km,
};
pub use polyline::PolylineError;
