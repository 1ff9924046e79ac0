//! Router-backed access to the primary and mirror connection pools.

use std::sync::Arc;

use sqlx::PgPool;

use super::handle::{DbHandle, OperationKind};
use super::router::FailoverRouter;

/// The pair of connection pools plus the router that picks between them.
///
/// Both pools are built lazily so the process starts (and can serve from
/// the mirror) even when the primary is down at boot.
#[derive(Debug, Clone)]
pub struct RoutedPools {
    primary: PgPool,
    mirror: PgPool,
    router: Arc<FailoverRouter>,
}

impl RoutedPools {
    /// Bundles the two pools with the router.
    #[must_use]
    pub fn new(primary: PgPool, mirror: PgPool, router: Arc<FailoverRouter>) -> Self {
        Self {
            primary,
            mirror,
            router,
        }
    }

    /// Pool for a read operation, as routed right now.
    pub async fn read(&self) -> &PgPool {
        self.pool_for(OperationKind::Read).await
    }

    /// Pool for a write operation, as routed right now.
    pub async fn write(&self) -> &PgPool {
        self.pool_for(OperationKind::Write).await
    }

    /// Direct access to the primary pool (reconciliation only).
    #[must_use]
    pub fn primary(&self) -> &PgPool {
        &self.primary
    }

    /// Direct access to the mirror pool (reconciliation only).
    #[must_use]
    pub fn mirror(&self) -> &PgPool {
        &self.mirror
    }

    async fn pool_for(&self, kind: OperationKind) -> &PgPool {
        match self.router.select_database(kind).await {
            DbHandle::Primary => &self.primary,
            DbHandle::Mirror => &self.mirror,
        }
    }
}
