//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::db::{FailoverRouter, SyncStatusCell};
use crate::service::{BookingService, CartService, NotificationLog};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Cart operations and the cart-to-reservation conversion.
    pub cart_service: Arc<CartService>,
    /// Reservation lifecycle operations.
    pub booking_service: Arc<BookingService>,
    /// Failover router, exposed for replication status.
    pub router: Arc<FailoverRouter>,
    /// Last background reconciliation outcome.
    pub sync_status: SyncStatusCell,
    /// Recent notification outcomes.
    pub notifications: NotificationLog,
}
