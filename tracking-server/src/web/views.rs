//! Open shipment views.
//!
//! Each open view owns exactly one tracking session, one route fetcher and
//! at most one elapsed ticker for its shipment. Nothing is shared between
//! views. Opening a view for a shipment that already has one replaces it,
//! and the replaced view's session is cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::directions::DirectionsService;
use crate::domain::{Coordinate, ShipmentId, ShipmentRecord, ShipmentStatus};
use crate::route::{DecodedRoute, RouteError, RouteFetcher, RouteFetcherConfig, RouteOutcome};
use crate::tracking::{
    DeliveryClock, DeviceFeedHandle, ElapsedTicker, LocationProvider, LocationSink,
    SessionClosed, TrackingConfig, TrackingHandle, TrackingRole, TrackingSession,
    TrackingSnapshot, device_feed,
};

struct ClockState {
    status: ShipmentStatus,
    clock: DeliveryClock,
    ticker: Option<ElapsedTicker>,
}

impl ClockState {
    fn new(record: &ShipmentRecord) -> Self {
        let mut state = Self {
            status: record.status.clone(),
            clock: DeliveryClock::NotStarted,
            ticker: None,
        };
        state.apply(record);
        state
    }

    /// Start or drop the ticker to match the record.
    fn apply(&mut self, record: &ShipmentRecord) {
        self.status = record.status.clone();
        let clock = DeliveryClock::from_record(record);

        match clock {
            DeliveryClock::Live(timer) => {
                let restart = self.ticker.as_ref().is_none_or(|t| t.timer() != timer);
                if restart {
                    self.ticker = Some(ElapsedTicker::spawn(timer));
                }
            }
            _ => self.ticker = None,
        }
        self.clock = clock;
    }

    fn display(&self) -> Option<String> {
        match &self.ticker {
            Some(ticker) => Some(ticker.current()),
            None => self.clock.display(),
        }
    }
}

/// Everything one open shipment view owns.
pub struct ShipmentView<D> {
    shipment: ShipmentId,
    role: TrackingRole,
    route: RouteFetcher<Arc<D>>,
    tracking: TrackingHandle,
    device: Option<DeviceFeedHandle>,
    clock: Mutex<ClockState>,
}

impl<D: DirectionsService> ShipmentView<D> {
    pub fn shipment(&self) -> &ShipmentId {
        &self.shipment
    }

    pub fn role(&self) -> TrackingRole {
        self.role
    }

    /// The driver's device feed; `None` for viewers.
    pub fn device(&self) -> Option<&DeviceFeedHandle> {
        self.device.as_ref()
    }

    pub fn tracking(&self) -> TrackingSnapshot {
        self.tracking.snapshot()
    }

    pub fn route(&self) -> Option<DecodedRoute> {
        self.route.current()
    }

    pub fn latest_route_request(&self) -> u64 {
        self.route.latest_request_id()
    }

    pub async fn request_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteOutcome, RouteError> {
        self.route.request_route(origin, destination).await
    }

    pub async fn set_live_tracking(&self, enabled: bool) -> Result<(), SessionClosed> {
        self.tracking.set_live_tracking(enabled).await
    }

    pub async fn retry_permission(&self) -> Result<(), SessionClosed> {
        self.tracking.retry_permission().await
    }

    /// Apply a freshly fetched shipment record: status changes reach the
    /// session, and the elapsed ticker follows the in-transit state.
    pub async fn apply_record(&self, record: &ShipmentRecord) -> Result<(), SessionClosed> {
        let changed = {
            let mut clock = self.clock.lock().await;
            let changed = clock.status != record.status;
            if changed {
                debug!(shipment = %self.shipment, from = %clock.status, to = %record.status, "shipment status changed");
            }
            clock.apply(record);
            changed
        };

        // The session may be mid-poll; readers of the clock must not wait on it
        if changed {
            self.tracking.update_status(record.status.clone()).await?;
        }
        Ok(())
    }

    pub async fn shipment_status(&self) -> ShipmentStatus {
        self.clock.lock().await.status.clone()
    }

    /// Formatted delivery duration, live or final.
    pub async fn elapsed(&self) -> Option<String> {
        self.clock.lock().await.display()
    }

    fn close(&self) {
        self.tracking.cancel();
    }
}

/// All open views, keyed by shipment.
pub struct ViewRegistry<D> {
    directions: Arc<D>,
    route_config: RouteFetcherConfig,
    tracking_config: TrackingConfig,
    views: Mutex<HashMap<ShipmentId, Arc<ShipmentView<D>>>>,
}

impl<D> ViewRegistry<D>
where
    D: DirectionsService + 'static,
{
    pub fn new(
        directions: Arc<D>,
        route_config: RouteFetcherConfig,
        tracking_config: TrackingConfig,
    ) -> Self {
        Self {
            directions,
            route_config,
            tracking_config,
            views: Mutex::new(HashMap::new()),
        }
    }

    /// Open a view that watches backend-reported positions.
    pub async fn open_viewer<P>(&self, record: &ShipmentRecord, provider: P) -> Arc<ShipmentView<D>>
    where
        P: LocationProvider + 'static,
    {
        let session = TrackingSession::new(
            record.id.clone(),
            record.status.clone(),
            TrackingRole::Viewer,
            provider,
            crate::tracking::NoSink,
            self.tracking_config.clone(),
        );
        self.insert(record, TrackingRole::Viewer, session.spawn(), None)
            .await
    }

    /// Open a driver view fed by the returned device handle. Accepted fixes
    /// are pushed to `sink`.
    pub async fn open_driver<S>(&self, record: &ShipmentRecord, sink: S) -> Arc<ShipmentView<D>>
    where
        S: LocationSink + 'static,
    {
        let (device, feed) = device_feed();
        let session = TrackingSession::new(
            record.id.clone(),
            record.status.clone(),
            TrackingRole::Driver,
            feed,
            sink,
            self.tracking_config.clone(),
        );
        self.insert(record, TrackingRole::Driver, session.spawn(), Some(device))
            .await
    }

    async fn insert(
        &self,
        record: &ShipmentRecord,
        role: TrackingRole,
        tracking: TrackingHandle,
        device: Option<DeviceFeedHandle>,
    ) -> Arc<ShipmentView<D>> {
        let view = Arc::new(ShipmentView {
            shipment: record.id.clone(),
            role,
            route: RouteFetcher::new(self.directions.clone(), self.route_config.clone()),
            tracking,
            device,
            clock: Mutex::new(ClockState::new(record)),
        });

        let previous = self
            .views
            .lock()
            .await
            .insert(record.id.clone(), view.clone());
        if let Some(previous) = previous {
            previous.close();
        }

        info!(shipment = %record.id, ?role, "opened shipment view");
        view
    }

    pub async fn get(&self, id: &ShipmentId) -> Option<Arc<ShipmentView<D>>> {
        self.views.lock().await.get(id).cloned()
    }

    /// Close a view. Returns false when none was open.
    pub async fn close(&self, id: &ShipmentId) -> bool {
        let removed = self.views.lock().await.remove(id);
        match removed {
            Some(view) => {
                view.close();
                info!(shipment = %id, "closed shipment view");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.views.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.views.lock().await.is_empty()
    }
}
