//! Error taxonomy shared by the tracking subsystem.
//!
//! Every boundary error (`PolylineError`, `DirectionsError`,
//! `BackendError`, `LocationError`, `RouteError`) maps onto one of these
//! kinds. "Nothing there yet" (no route, no location) is not an error and
//! is modelled as an empty value instead.

use std::fmt;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Permission to read location was refused. Terminal for a session
    /// until externally re-requested.
    PermissionDenied,

    /// Network failure, timeout or an unavailable upstream. Retried on the
    /// next natural cycle.
    Transient,

    /// Malformed geometry or response body. Fatal to that one operation.
    Parse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Transient => "transient",
            ErrorKind::Parse => "parse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(ErrorKind::PermissionDenied.to_string(), "permission denied");
        assert_eq!(ErrorKind::Transient.to_string(), "transient");
        assert_eq!(ErrorKind::Parse.to_string(), "parse");
    }
}
