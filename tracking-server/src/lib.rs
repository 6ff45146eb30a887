//! Fleet tracking server.
//!
//! Live vehicle tracking and route computation for shipment views: decodes
//! routed polylines, polls vehicle positions per shipment, keeps a short
//! breadcrumb history and counts elapsed delivery time.

pub mod backend;
pub mod directions;
pub mod domain;
pub mod geo;
pub mod route;
pub mod tracking;
pub mod web;
