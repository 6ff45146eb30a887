//! Tracking adapters over the backend client.

use crate::domain::{LocationSample, ShipmentId};
use crate::tracking::{LocationError, LocationProvider, LocationSink};

use super::client::BackendClient;

/// Backend-reported vehicle position for one shipment (viewer role).
#[derive(Debug, Clone)]
pub struct BackendPositionProvider {
    client: BackendClient,
    shipment: ShipmentId,
}

impl BackendPositionProvider {
    pub fn new(client: BackendClient, shipment: ShipmentId) -> Self {
        Self { client, shipment }
    }
}

impl LocationProvider for BackendPositionProvider {
    async fn current_location(&self) -> Result<Option<LocationSample>, LocationError> {
        Ok(self.client.current_position(&self.shipment).await?)
    }
}

/// Pushes a driver's accepted samples to the backend.
#[derive(Debug, Clone)]
pub struct BackendSink {
    client: BackendClient,
}

impl BackendSink {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

impl LocationSink for BackendSink {
    async fn push_location(
        &self,
        shipment: &ShipmentId,
        sample: &LocationSample,
    ) -> Result<(), LocationError> {
        Ok(self.client.push_location(shipment, sample).await?)
    }
}
