//! Location sources and upstream sinks.
//!
//! A tracking session reads positions from a [`LocationProvider`]: the
//! device's own GPS for the driver role, or the backend's reported vehicle
//! position for the viewer role. Drivers also report accepted samples to a
//! [`LocationSink`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::{ErrorKind, LocationSample, ShipmentId};

/// Errors from reading or reporting a location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The user or device refused access to location.
    #[error("location permission denied")]
    PermissionDenied,

    /// Temporary failure: network, timeout, device not ready.
    #[error("location unavailable: {0}")]
    Transient(String),

    /// The source answered with something unreadable.
    #[error("malformed location: {0}")]
    Parse(String),
}

impl LocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocationError::PermissionDenied => ErrorKind::PermissionDenied,
            LocationError::Transient(_) => ErrorKind::Transient,
            LocationError::Parse(_) => ErrorKind::Parse,
        }
    }
}

/// A source of the vehicle's current position.
pub trait LocationProvider: Send + Sync {
    /// Read the current position.
    ///
    /// `Ok(None)` means the source is reachable but has no fix yet; that is
    /// not an error.
    fn current_location(
        &self,
    ) -> impl Future<Output = Result<Option<LocationSample>, LocationError>> + Send;
}

/// Somewhere to report accepted samples (driver role).
pub trait LocationSink: Send + Sync {
    fn push_location(
        &self,
        shipment: &ShipmentId,
        sample: &LocationSample,
    ) -> impl Future<Output = Result<(), LocationError>> + Send;
}

/// Sink that discards everything, for sessions that only observe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSink;

impl LocationSink for NoSink {
    async fn push_location(
        &self,
        _shipment: &ShipmentId,
        _sample: &LocationSample,
    ) -> Result<(), LocationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct DeviceState {
    denied: bool,
    latest: Option<LocationSample>,
}

/// Create a connected device feed: the handle publishes fixes reported by
/// the driver's device, the feed serves them to a tracking session.
pub fn device_feed() -> (DeviceFeedHandle, DeviceFeed) {
    let (tx, rx) = watch::channel(DeviceState::default());
    (DeviceFeedHandle { tx: Arc::new(tx) }, DeviceFeed { rx })
}

/// Writing side of a device feed.
#[derive(Debug, Clone)]
pub struct DeviceFeedHandle {
    tx: Arc<watch::Sender<DeviceState>>,
}

impl DeviceFeedHandle {
    /// Report a new fix. Also implies permission is granted.
    pub fn publish(&self, sample: LocationSample) {
        self.tx.send_modify(|state| {
            state.denied = false;
            state.latest = Some(sample);
        });
    }

    /// Report that the device refused location access.
    pub fn deny(&self) {
        self.tx.send_modify(|state| state.denied = true);
    }

    /// Report that location access was granted again.
    pub fn grant(&self) {
        self.tx.send_modify(|state| state.denied = false);
    }
}

/// Reading side of a device feed, used as a session's provider.
#[derive(Debug, Clone)]
pub struct DeviceFeed {
    rx: watch::Receiver<DeviceState>,
}

impl LocationProvider for DeviceFeed {
    async fn current_location(&self) -> Result<Option<LocationSample>, LocationError> {
        if self.rx.has_changed().is_err() {
            return Err(LocationError::Transient("device feed closed".into()));
        }
        let state = self.rx.borrow().clone();
        if state.denied {
            return Err(LocationError::PermissionDenied);
        }
        Ok(state.latest)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::Coordinate;

    fn sample(lat: f64) -> LocationSample {
        LocationSample::new(
            Coordinate::new(lat, 0.0).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn feed_starts_without_fix() {
        let (_handle, feed) = device_feed();
        assert_eq!(feed.current_location().await, Ok(None));
    }

    #[tokio::test]
    async fn feed_serves_latest_fix() {
        let (handle, feed) = device_feed();
        handle.publish(sample(1.0));
        handle.publish(sample(2.0));
        assert_eq!(feed.current_location().await, Ok(Some(sample(2.0))));
    }

    #[tokio::test]
    async fn feed_reports_denial_until_granted() {
        let (handle, feed) = device_feed();
        handle.publish(sample(1.0));
        handle.deny();
        assert_eq!(
            feed.current_location().await,
            Err(LocationError::PermissionDenied)
        );

        handle.grant();
        assert_eq!(feed.current_location().await, Ok(Some(sample(1.0))));
    }

    #[tokio::test]
    async fn closed_feed_is_transient() {
        let (handle, feed) = device_feed();
        drop(handle);
        let err = feed.current_location().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            LocationError::PermissionDenied.kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            LocationError::Transient("x".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(LocationError::Parse("x".into()).kind(), ErrorKind::Parse);
    }
}
