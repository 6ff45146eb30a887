//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, InvalidCoordinate, ShipmentId, ShipmentStatus};
use crate::geo::{DEFAULT_AVG_SPEED_KMH, RouteEstimate};
use crate::route::DecodedRoute;
use crate::tracking::{TrackingRole, TrackingSnapshot};

/// Query for a straight-line estimate.
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub from_lat: f64,
    pub from_lng: f64,
    pub to_lat: f64,
    pub to_lng: f64,

    /// Average speed for the ETA (defaults to 40 km/h)
    pub speed_kmh: Option<f64>,
}

impl EstimateRequest {
    pub fn estimate(&self) -> Result<RouteEstimate, InvalidCoordinate> {
        let from = Coordinate::new(self.from_lat, self.from_lng)?;
        let to = Coordinate::new(self.to_lat, self.to_lng)?;
        let speed = self.speed_kmh.unwrap_or(DEFAULT_AVG_SPEED_KMH);
        Ok(RouteEstimate::with_speed(from, to, speed))
    }
}

/// Request a route for a shipment view.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
}

/// A route as the map renders it.
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    /// Id of the request this response answers
    pub request_id: u64,

    /// A newer request was issued before this one finished; `points`
    /// show whatever is currently committed
    pub superseded: bool,

    /// Ordered path, empty when no route exists
    pub points: Vec<Coordinate>,

    /// The service answered, but found no route
    pub no_route: bool,

    /// Length of the decoded path
    pub path_length_km: f64,

    /// Distance reported by the directions service
    pub routed_distance_km: Option<f64>,

    /// Duration reported by the directions service
    pub routed_duration_minutes: Option<i64>,

    /// Straight-line estimate between the requested endpoints. Independent
    /// of the routed figures; the two may disagree.
    pub estimate: Option<RouteEstimate>,
}

impl RouteResponse {
    pub fn new(request_id: u64, superseded: bool, route: Option<&DecodedRoute>) -> Self {
        let points = route.map(|r| r.points.clone()).unwrap_or_default();
        Self {
            request_id,
            superseded,
            no_route: route.is_some_and(DecodedRoute::is_empty),
            path_length_km: route.map(DecodedRoute::path_length_km).unwrap_or(0.0),
            routed_distance_km: route.and_then(|r| r.distance_m).map(|m| m as f64 / 1000.0),
            routed_duration_minutes: route
                .and_then(|r| r.duration_s)
                .map(|s| (s as f64 / 60.0).round() as i64),
            points,
            estimate: None,
        }
    }

    pub fn with_estimate(mut self, estimate: RouteEstimate) -> Self {
        self.estimate = Some(estimate);
        self
    }
}

/// Open a tracking view.
#[derive(Debug, Deserialize)]
pub struct OpenTrackingRequest {
    /// Defaults to viewer
    pub role: Option<TrackingRole>,
}

/// Toggle live tracking.
#[derive(Debug, Deserialize)]
pub struct LiveRequest {
    pub enabled: bool,
}

/// Driver device permission change.
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub granted: bool,
}

/// State of an open shipment view.
#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub shipment_id: ShipmentId,
    pub shipment_status: ShipmentStatus,
    pub role: TrackingRole,
    pub tracking: TrackingSnapshot,

    /// `HH:MM:SS` delivery duration, live while in transit
    pub elapsed: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
