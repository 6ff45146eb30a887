//! Application state for the web layer.

use std::sync::Arc;

use crate::backend::BackendClient;
use crate::directions::DirectionsClient;
use crate::route::{CachedDirections, RouteFetcherConfig};
use crate::tracking::TrackingConfig;

use super::views::ViewRegistry;

/// Directions lookups as the server makes them.
pub type Directions = CachedDirections<DirectionsClient>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Shipment records, positions and driver pushes
    pub backend: BackendClient,

    /// Open shipment views
    pub views: Arc<ViewRegistry<Directions>>,
}

impl AppState {
    pub fn new(
        directions: Directions,
        backend: BackendClient,
        route_config: RouteFetcherConfig,
        tracking_config: TrackingConfig,
    ) -> Self {
        Self {
            backend,
            views: Arc::new(ViewRegistry::new(
                Arc::new(directions),
                route_config,
                tracking_config,
            )),
        }
    }
}
