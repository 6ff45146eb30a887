//! Driving-directions lookup.
//!
//! The directions service is an external collaborator: given an origin and
//! a destination it answers with a status and, when a route exists, an
//! encoded overview polyline. Decoding and stale-result handling live in
//! [`crate::route`]; this module only talks to the service.

mod client;
mod error;
mod types;

use std::future::Future;

use crate::domain::Coordinate;

pub use client::{DirectionsClient, DirectionsConfig};
pub use error::DirectionsError;
pub use types::{DirectionsOutcome, DirectionsResponse, RawRoute};

/// Source of driving routes.
///
/// This abstraction allows the route fetcher to be tested with mock
/// services and to sit behind a cache.
pub trait DirectionsService: Send + Sync {
    /// Look up a route from `origin` to `destination`.
    fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<DirectionsOutcome, DirectionsError>> + Send;
}

impl<D: DirectionsService> DirectionsService for std::sync::Arc<D> {
    fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<DirectionsOutcome, DirectionsError>> + Send {
        (**self).directions(origin, destination)
    }
}
