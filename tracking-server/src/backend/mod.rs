//! Shipment backend.
//!
//! The backend owns shipment records (status and route timing), serves the
//! latest vehicle position to viewers and accepts position pushes from
//! drivers. It is reached over HTTP with an optional bearer token.

mod client;
mod error;
mod provider;

pub use client::{BackendClient, BackendConfig};
pub use error::BackendError;
pub use provider::{BackendPositionProvider, BackendSink};
