//! Domain types for fleet tracking.
//!
//! These types represent validated tracking data. Coordinates and
//! shipment ids enforce their invariants at construction time (and on
//! deserialization), so code that receives them can trust their validity.

mod coordinate;
mod error;
mod sample;
mod shipment;

pub use coordinate::{Coordinate, InvalidCoordinate};
pub use error::ErrorKind;
pub use sample::LocationSample;
pub use shipment::{InvalidShipmentId, RouteInfo, ShipmentId, ShipmentRecord, ShipmentStatus};
