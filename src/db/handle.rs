//! Logical database handles and operation kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two database replicas the router can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbHandle {
    /// Authoritative replica; preferred whenever reachable.
    Primary,
    /// Failover target; serves all traffic while the circuit is open.
    Mirror,
}

impl DbHandle {
    /// Handle name used in logs and status payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Mirror => "mirror",
        }
    }
}

impl fmt::Display for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an operation reads or mutates.
///
/// Both kinds currently route identically — the mirror takes writes too
/// during an outage, which is what makes reconciliation necessary — but
/// the distinction is part of the router's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A query with no side effects.
    Read,
    /// An insert, update, or delete.
    Write,
}
