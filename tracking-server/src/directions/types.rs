//! Wire types for the directions API and their conversion.
//!
//! Only the fields this crate needs are modelled; everything else in the
//! response is ignored by serde.

use serde::Deserialize;

use super::error::DirectionsError;

/// Top-level directions response.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsResponse {
    /// "OK", "ZERO_RESULTS", "NOT_FOUND", "OVER_QUERY_LIMIT", ...
    pub status: String,

    #[serde(default)]
    pub routes: Vec<RouteDto>,

    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteDto {
    pub overview_polyline: PolylineDto,

    #[serde(default)]
    pub legs: Vec<LegDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolylineDto {
    pub points: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegDto {
    #[serde(default)]
    pub distance: Option<ValueDto>,

    #[serde(default)]
    pub duration: Option<ValueDto>,
}

/// A `{ value, text }` pair; `value` is metres or seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueDto {
    pub value: u64,
}

/// A route as returned by the service, geometry still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRoute {
    pub encoded_polyline: String,

    /// Total routed distance in metres, when every leg reports one.
    pub distance_m: Option<u64>,

    /// Total routed duration in seconds, when every leg reports one.
    pub duration_s: Option<u64>,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionsOutcome {
    Route(RawRoute),

    /// The service answered but knows no route between the points.
    NoRoute,
}

impl DirectionsResponse {
    /// Interpret the `status` field and pick the first route.
    pub fn into_outcome(self) -> Result<DirectionsOutcome, DirectionsError> {
        match self.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" | "NOT_FOUND" => return Ok(DirectionsOutcome::NoRoute),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => return Err(DirectionsError::RateLimited),
            "REQUEST_DENIED" => return Err(DirectionsError::Unauthorized),
            other => {
                let message = match self.error_message {
                    Some(detail) => format!("{other}: {detail}"),
                    None => other.to_string(),
                };
                return Err(DirectionsError::Api {
                    status: 200,
                    message,
                });
            }
        }

        let Some(route) = self.routes.into_iter().next() else {
            return Ok(DirectionsOutcome::NoRoute);
        };

        let distance_m = sum_legs(&route.legs, |leg| leg.distance.as_ref());
        let duration_s = sum_legs(&route.legs, |leg| leg.duration.as_ref());

        Ok(DirectionsOutcome::Route(RawRoute {
            encoded_polyline: route.overview_polyline.points,
            distance_m,
            duration_s,
        }))
    }
}

/// Sum a per-leg value, or `None` if there are no legs or any leg lacks it.
fn sum_legs(legs: &[LegDto], field: impl Fn(&LegDto) -> Option<&ValueDto>) -> Option<u64> {
    if legs.is_empty() {
        return None;
    }
    legs.iter()
        .map(|leg| field(leg).map(|v| v.value))
        .sum::<Option<u64>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> DirectionsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn ok_with_legs() {
        let resp = parse(
            r#"{
                "status": "OK",
                "routes": [{
                    "overview_polyline": { "points": "_p~iF~ps|U" },
                    "legs": [
                        { "distance": { "value": 1200, "text": "1.2 km" },
                          "duration": { "value": 300, "text": "5 mins" } },
                        { "distance": { "value": 800, "text": "0.8 km" },
                          "duration": { "value": 120, "text": "2 mins" } }
                    ],
                    "summary": "A1"
                }],
                "geocoded_waypoints": []
            }"#,
        );

        let outcome = resp.into_outcome().unwrap();
        assert_eq!(
            outcome,
            DirectionsOutcome::Route(RawRoute {
                encoded_polyline: "_p~iF~ps|U".into(),
                distance_m: Some(2000),
                duration_s: Some(420),
            })
        );
    }

    #[test]
    fn ok_without_legs() {
        let resp = parse(r#"{"status":"OK","routes":[{"overview_polyline":{"points":"??"}}]}"#);
        let DirectionsOutcome::Route(route) = resp.into_outcome().unwrap() else {
            panic!("expected a route");
        };
        assert_eq!(route.distance_m, None);
        assert_eq!(route.duration_s, None);
    }

    #[test]
    fn partial_leg_data_is_dropped() {
        let resp = parse(
            r#"{"status":"OK","routes":[{"overview_polyline":{"points":"??"},
                "legs":[{"distance":{"value":5}},{"duration":{"value":9}}]}]}"#,
        );
        let DirectionsOutcome::Route(route) = resp.into_outcome().unwrap() else {
            panic!("expected a route");
        };
        assert_eq!(route.distance_m, None);
        assert_eq!(route.duration_s, None);
    }

    #[test]
    fn zero_results_is_no_route() {
        let resp = parse(r#"{"status":"ZERO_RESULTS","routes":[]}"#);
        assert_eq!(resp.into_outcome().unwrap(), DirectionsOutcome::NoRoute);

        let resp = parse(r#"{"status":"NOT_FOUND"}"#);
        assert_eq!(resp.into_outcome().unwrap(), DirectionsOutcome::NoRoute);
    }

    #[test]
    fn ok_with_no_routes_is_no_route() {
        let resp = parse(r#"{"status":"OK","routes":[]}"#);
        assert_eq!(resp.into_outcome().unwrap(), DirectionsOutcome::NoRoute);
    }

    #[test]
    fn error_statuses() {
        let resp = parse(r#"{"status":"OVER_QUERY_LIMIT"}"#);
        assert!(matches!(
            resp.into_outcome(),
            Err(DirectionsError::RateLimited)
        ));

        let resp = parse(r#"{"status":"REQUEST_DENIED","error_message":"bad key"}"#);
        assert!(matches!(
            resp.into_outcome(),
            Err(DirectionsError::Unauthorized)
        ));

        let resp = parse(r#"{"status":"INVALID_REQUEST","error_message":"missing origin"}"#);
        match resp.into_outcome() {
            Err(DirectionsError::Api { message, .. }) => {
                assert_eq!(message, "INVALID_REQUEST: missing origin");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
