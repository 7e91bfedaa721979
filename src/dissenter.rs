//! Veto value returned by approval observers and surfaced to clients.

#[cfg(feature = "serializable")]
use serde::Deserialize;
#[cfg(feature = "serializable")]
use serde::Serialize;

use crate::Status;

/// A dissent against an operation: a status code and an optional
/// human-readable reason supplied by the objecting observer.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Dissenter {
    status: Status,
    reason: Option<String>,
}

impl Dissenter {
    /// Create a dissenter carrying only a status code.
    pub fn new(status: Status) -> Dissenter {
        Dissenter {
            status,
            reason: None,
        }
    }

    /// Create a dissenter with a reason string.
    pub fn with_reason(status: Status, reason: impl Into<String>) -> Dissenter {
        Dissenter {
            status,
            reason: Some(reason.into()),
        }
    }

    /// The status code.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The reason, if the observer supplied one.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}
