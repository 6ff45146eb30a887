//! Tracking session configuration.

use std::time::Duration;

/// Configuration parameters for tracking sessions.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Maximum number of samples kept in a session's history.
    pub history_capacity: usize,

    /// Driver role: minimum movement (metres) before a new fix is accepted.
    pub min_movement_m: f64,

    /// Driver role: how often the device position is read (seconds).
    pub driver_interval_secs: u64,

    /// Viewer role: how often the backend position is polled (seconds).
    pub viewer_interval_secs: u64,

    /// Viewer role with live tracking enabled (seconds).
    pub live_interval_secs: u64,
}

impl TrackingConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_min_movement(mut self, metres: f64) -> Self {
        self.min_movement_m = metres;
        self
    }

    pub fn with_driver_interval(mut self, secs: u64) -> Self {
        self.driver_interval_secs = secs;
        self
    }

    pub fn with_viewer_interval(mut self, secs: u64) -> Self {
        self.viewer_interval_secs = secs;
        self
    }

    pub fn with_live_interval(mut self, secs: u64) -> Self {
        self.live_interval_secs = secs;
        self
    }

    /// Returns the driver poll interval as a Duration.
    pub fn driver_interval(&self) -> Duration {
        Duration::from_secs(self.driver_interval_secs.max(1))
    }

    /// Returns the viewer poll interval as a Duration.
    pub fn viewer_interval(&self) -> Duration {
        Duration::from_secs(self.viewer_interval_secs.max(1))
    }

    /// Returns the live-tracking poll interval as a Duration.
    pub fn live_interval(&self) -> Duration {
        Duration::from_secs(self.live_interval_secs.max(1))
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            min_movement_m: 5.0,
            driver_interval_secs: 5,
            viewer_interval_secs: 30,
            live_interval_secs: 5,
        }
    }
}
