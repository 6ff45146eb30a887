//! Shipment identifiers and the backend's view of a shipment.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid shipment id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid shipment id: {reason}")]
pub struct InvalidShipmentId {
    reason: &'static str,
}

/// Backend identifier of a shipment.
///
/// Ids are opaque to this crate but must be non-empty and safe to embed
/// in a URL path segment (ASCII alphanumerics, `-` and `_`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShipmentId(String);

impl ShipmentId {
    /// Maximum accepted id length.
    pub const MAX_LEN: usize = 64;

    pub fn parse(s: &str) -> Result<Self, InvalidShipmentId> {
        if s.is_empty() {
            return Err(InvalidShipmentId {
                reason: "must not be empty",
            });
        }
        if s.len() > Self::MAX_LEN {
            return Err(InvalidShipmentId {
                reason: "must be at most 64 characters",
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(InvalidShipmentId {
                reason: "must contain only ASCII letters, digits, '-' or '_'",
            });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShipmentId({})", self.0)
    }
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShipmentId {
    type Error = InvalidShipmentId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ShipmentId::parse(&s)
    }
}

impl From<ShipmentId> for String {
    fn from(id: ShipmentId) -> Self {
        id.0
    }
}

/// Remote lifecycle status of a shipment.
///
/// The backend spells statuses loosely ("in transit", "in_transit",
/// "In-Transit"); parsing normalises case and separators. Unknown values
/// are preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Completed,
    Other(String),
}

impl ShipmentStatus {
    pub fn parse(s: &str) -> Self {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '_' | '-' => ' ',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "pending" => ShipmentStatus::Pending,
            "in transit" | "intransit" => ShipmentStatus::InTransit,
            "completed" | "delivered" => ShipmentStatus::Completed,
            _ => ShipmentStatus::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::InTransit => "in transit",
            ShipmentStatus::Completed => "completed",
            ShipmentStatus::Other(s) => s,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ShipmentStatus::Pending)
    }
}

impl From<String> for ShipmentStatus {
    fn from(s: String) -> Self {
        ShipmentStatus::parse(&s)
    }
}

impl From<ShipmentStatus> for String {
    fn from(status: ShipmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route timing the backend records against a shipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    /// When the driver started the route (remote clock).
    #[serde(default)]
    pub route_started: Option<DateTime<Utc>>,

    /// Authoritative delivery duration in seconds, present once completed.
    #[serde(default)]
    pub actual_duration: Option<u64>,
}

/// The subset of a backend shipment record this subsystem consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    pub id: ShipmentId,
    pub status: ShipmentStatus,
    #[serde(default)]
    pub route_info: RouteInfo,
}
