//! Route fetching with stale-result suppression.
//!
//! Every call to [`RouteFetcher::request_route`] is tagged with a strictly
//! increasing request id. Lookups may complete in any order, but only the
//! most recently *issued* request is allowed to commit its result: an older
//! request that finishes later is discarded. A failed lookup never blanks
//! the route that is already committed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::directions::{DirectionsError, DirectionsOutcome, DirectionsService};
use crate::domain::{Coordinate, ErrorKind};
use crate::geo::{PolylineError, path_length_km, polyline};

/// Default cap on a route lookup.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration for the route fetcher.
#[derive(Debug, Clone)]
pub struct RouteFetcherConfig {
    /// Upper bound on a single lookup, so interactive flows never block
    /// on a slow upstream.
    pub timeout: Duration,
}

impl RouteFetcherConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RouteFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One issued lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteQuery {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub request_id: u64,
}

/// Decoded route geometry ready for rendering.
///
/// Empty `points` means the service found no route.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedRoute {
    pub points: Vec<Coordinate>,

    /// Routed distance reported by the service, in metres.
    pub distance_m: Option<u64>,

    /// Routed duration reported by the service, in seconds.
    pub duration_s: Option<u64>,
}

impl DecodedRoute {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the decoded path in kilometres.
    pub fn path_length_km(&self) -> f64 {
        path_length_km(&self.points)
    }
}

/// The route currently visible to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommittedRoute {
    /// Id of the request that produced `route`; 0 before any commit.
    pub request_id: u64,
    pub query: Option<RouteQuery>,
    pub route: Option<DecodedRoute>,
}

/// What happened to a completed request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// The result is now the visible route.
    Committed { request_id: u64, route: DecodedRoute },

    /// A newer request was issued while this one was in flight; its result
    /// (success or failure) was discarded.
    Superseded { request_id: u64, latest: u64 },
}

/// Errors from a route request that was still the latest when it failed.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route lookup failed: {0}")]
    Directions(#[from] DirectionsError),

    #[error("route geometry is malformed: {0}")]
    Geometry(#[from] PolylineError),
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::Directions(e) => e.kind(),
            RouteError::Geometry(e) => e.kind(),
        }
    }
}

/// Issues route lookups and publishes the latest committed route.
pub struct RouteFetcher<D> {
    directions: D,
    config: RouteFetcherConfig,
    latest_issued: AtomicU64,
    state: watch::Sender<CommittedRoute>,
}

impl<D: DirectionsService> RouteFetcher<D> {
    pub fn new(directions: D, config: RouteFetcherConfig) -> Self {
        let (state, _) = watch::channel(CommittedRoute::default());
        Self {
            directions,
            config,
            latest_issued: AtomicU64::new(0),
            state,
        }
    }

    /// Id of the most recently issued request (0 if none).
    pub fn latest_request_id(&self) -> u64 {
        self.latest_issued.load(Ordering::SeqCst)
    }

    /// The currently committed route, if any request has committed.
    pub fn current(&self) -> Option<DecodedRoute> {
        self.state.borrow().route.clone()
    }

    /// Watch committed routes as they change.
    pub fn subscribe(&self) -> watch::Receiver<CommittedRoute> {
        self.state.subscribe()
    }

    /// Request a route and commit it if no newer request has been issued.
    ///
    /// Failures of the latest request are logged and returned; the
    /// previously committed route is left untouched either way.
    pub async fn request_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteOutcome, RouteError> {
        let query = self.issue(origin, destination);
        let result = self.lookup(&query).await;

        match result {
            Ok(route) => Ok(self.commit(query, route)),
            Err(err) => {
                let latest = self.latest_request_id();
                if latest != query.request_id {
                    debug!(request_id = query.request_id, latest, error = %err, "discarding failure of superseded route request");
                    return Ok(RouteOutcome::Superseded {
                        request_id: query.request_id,
                        latest,
                    });
                }
                warn!(request_id = query.request_id, kind = %err.kind(), error = %err, "route request failed; keeping previous route");
                Err(err)
            }
        }
    }

    fn issue(&self, origin: Coordinate, destination: Coordinate) -> RouteQuery {
        let request_id = self.latest_issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(request_id, %origin, %destination, "issuing route request");
        RouteQuery {
            origin,
            destination,
            request_id,
        }
    }

    async fn lookup(&self, query: &RouteQuery) -> Result<DecodedRoute, RouteError> {
        let outcome = tokio::time::timeout(
            self.config.timeout,
            self.directions.directions(query.origin, query.destination),
        )
        .await
        .map_err(|_| DirectionsError::Timeout)??;

        match outcome {
            DirectionsOutcome::NoRoute => Ok(DecodedRoute::default()),
            DirectionsOutcome::Route(raw) => Ok(DecodedRoute {
                points: polyline::decode(&raw.encoded_polyline)?,
                distance_m: raw.distance_m,
                duration_s: raw.duration_s,
            }),
        }
    }

    /// Commit `route` if `query` is still the latest issued request.
    ///
    /// The check runs inside the watch channel's write lock, so a newer
    /// commit can never be overwritten by an older one.
    fn commit(&self, query: RouteQuery, route: DecodedRoute) -> RouteOutcome {
        let mut committed = false;

        self.state.send_if_modified(|state| {
            let latest = self.latest_issued.load(Ordering::SeqCst);
            if latest != query.request_id || state.request_id >= query.request_id {
                return false;
            }
            *state = CommittedRoute {
                request_id: query.request_id,
                query: Some(query),
                route: Some(route.clone()),
            };
            committed = true;
            true
        });

        if committed {
            debug!(request_id = query.request_id, points = route.points.len(), "committed route");
            RouteOutcome::Committed {
                request_id: query.request_id,
                route,
            }
        } else {
            let latest = self.latest_request_id();
            debug!(request_id = query.request_id, latest, "discarding stale route result");
            RouteOutcome::Superseded {
                request_id: query.request_id,
                latest,
            }
        }
    }
}
