//! HTTP surface over route computation and live tracking.

mod dto;
mod routes;
mod state;
mod views;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, Directions};
pub use views::{ShipmentView, ViewRegistry};
