//! Database failover layer: handle selection, circuit-breaker routing,
//! and mirror-to-primary reconciliation.
//!
//! The rest of the crate never picks a connection pool directly; it asks
//! [`RoutedPools`] for a read or write pool and the [`FailoverRouter`]
//! decides, per operation, whether the primary or the mirror serves it.

pub mod flags;
pub mod handle;
pub mod pools;
pub mod probe;
pub mod router;
pub mod sync;

pub use flags::FlagStore;
pub use handle::{DbHandle, OperationKind};
pub use pools::RoutedPools;
pub use probe::{ConnectionProbe, PgProbe, ProbeError};
pub use router::FailoverRouter;
pub use sync::{Reconciler, SyncError, SyncOptions, SyncReport, SyncStatusCell};
