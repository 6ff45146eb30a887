//! Live vehicle tracking.
//!
//! One [`TrackingSession`] per open shipment view polls a
//! [`LocationProvider`], keeps a bounded breadcrumb [`HistoryBuffer`] and
//! publishes [`TrackingSnapshot`]s. An [`ElapsedTicker`] runs alongside
//! while the shipment is in transit.

mod config;
mod history;
mod provider;
mod session;
mod timer;

pub use config::TrackingConfig;
pub use history::{DEFAULT_CAPACITY, HistoryBuffer};
pub use provider::{
    DeviceFeed, DeviceFeedHandle, LocationError, LocationProvider, LocationSink, NoSink,
    device_feed,
};
pub use session::{
    PollOutcome, SessionClosed, SessionStatus, TrackingHandle, TrackingRole, TrackingSession,
    TrackingSnapshot,
};
pub use timer::{DeliveryClock, ElapsedTicker, ElapsedTimer, format_elapsed};
