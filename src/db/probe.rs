//! Primary-database health probe.
//!
//! The probe opens a fresh connection with a bounded timeout and pings
//! it. Failures are classified into a closed [`ProbeError`] so the
//! router matches kinds explicitly instead of swallowing arbitrary
//! errors.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, ConnectOptions};

/// Why a probe attempt failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    /// The connect attempt did not complete within the configured timeout.
    #[error("primary probe timed out")]
    Timeout,
    /// The primary actively refused the connection.
    #[error("primary refused connection: {0}")]
    ConnectionRefused(String),
    /// Any other connection, protocol, or OS-level failure.
    #[error("primary probe failed: {0}")]
    Other(String),
}

impl ProbeError {
    /// Short kind label for structured logs.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionRefused(_) => "connection_refused",
            Self::Other(_) => "other",
        }
    }
}

/// Health check against the primary replica.
#[async_trait]
pub trait ConnectionProbe: Send + Sync + fmt::Debug {
    /// Verifies that the primary accepts connections.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] classifying the failure; never panics and
    /// never blocks past the configured timeout.
    async fn check(&self) -> Result<(), ProbeError>;
}

/// Probe that dials the primary with `sqlx` and a hard timeout.
pub struct PgProbe {
    options: PgConnectOptions,
    timeout: Duration,
}

impl PgProbe {
    /// Creates a probe for the given connection options.
    #[must_use]
    pub fn new(options: PgConnectOptions, timeout: Duration) -> Self {
        // Quiet per-statement logging; the probe runs on every cold path.
        let options = options.disable_statement_logging();
        Self { options, timeout }
    }
}

impl fmt::Debug for PgProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgProbe")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConnectionProbe for PgProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        let connect = PgConnection::connect_with(&self.options);
        let mut conn = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => return Err(classify(&err)),
            Err(_elapsed) => return Err(ProbeError::Timeout),
        };

        let outcome = match tokio::time::timeout(self.timeout, conn.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(classify(&err)),
            Err(_elapsed) => Err(ProbeError::Timeout),
        };

        // Close the probe connection whatever happened; a dead handle
        // must not linger.
        let _ = conn.close().await;
        outcome
    }
}

/// Maps an `sqlx` error onto the closed probe error kinds.
fn classify(err: &sqlx::Error) -> ProbeError {
    match err {
        sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            ProbeError::ConnectionRefused(io.to_string())
        }
        sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => ProbeError::Timeout,
        sqlx::Error::PoolTimedOut => ProbeError::Timeout,
        other => ProbeError::Other(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_refused_connections() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let kind = classify(&sqlx::Error::Io(io));
        assert!(matches!(kind, ProbeError::ConnectionRefused(_)));
    }

    #[test]
    fn classify_maps_io_timeouts() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let kind = classify(&sqlx::Error::Io(io));
        assert!(matches!(kind, ProbeError::Timeout));
    }

    #[test]
    fn classify_defaults_to_other() {
        let kind = classify(&sqlx::Error::RowNotFound);
        assert!(matches!(kind, ProbeError::Other(_)));
    }

    #[test]
    fn kind_strings_are_stable() {
        assert_eq!(ProbeError::Timeout.kind_str(), "timeout");
        assert_eq!(
            ProbeError::ConnectionRefused(String::new()).kind_str(),
            "connection_refused"
        );
        assert_eq!(ProbeError::Other(String::new()).kind_str(), "other");
    }
}
