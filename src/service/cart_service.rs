//! Cart operations: add items, view the cart, and the atomic
//! cart-to-reservation conversion.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use super::persist_with_fresh_code;
use crate::domain::money::{self, Totals};
use crate::domain::{
    BookingEvent, CustomerContact, EventBus, ItemKind, LineSnapshot, generate_reservation_code,
};
use crate::error::BookingError;
use crate::persistence::BookingRepo;
use crate::persistence::models::{CartLine, NewReservation, NewReservationLine};

/// Result of a successful cart confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmedBooking {
    /// Database id of the new reservation.
    pub reservation_id: i64,
    /// Public reservation code handed back to the customer.
    pub code: String,
}

/// A customer's cart with a running totals preview.
#[derive(Debug, Clone)]
pub struct CartView {
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
    /// Subtotal, tax, and total as they would be charged today.
    pub totals: Totals,
}

/// Cart business logic over the repository seam.
///
/// Every mutation follows the same order: validate, persist, then
/// publish. Events only fire after the data is durable.
#[derive(Debug, Clone)]
pub struct CartService {
    repo: Arc<dyn BookingRepo>,
    bus: EventBus,
    tax_rate: Decimal,
}

impl CartService {
    /// Creates the service.
    #[must_use]
    pub fn new(repo: Arc<dyn BookingRepo>, bus: EventBus, tax_rate: Decimal) -> Self {
        Self {
            repo,
            bus,
            tax_rate,
        }
    }

    /// Adds an item to the customer's cart, capturing the current price.
    ///
    /// Quantity accumulates onto an existing line for the same item.
    ///
    /// # Errors
    ///
    /// Rejects a non-positive quantity, an unknown customer, or an
    /// unknown/inactive item.
    pub async fn add_item(
        &self,
        customer_id: i64,
        kind: ItemKind,
        item_id: i64,
        quantity: i32,
    ) -> Result<CartLine, BookingError> {
        if quantity <= 0 {
            return Err(BookingError::InvalidRequest(
                "quantity must be positive".to_string(),
            ));
        }
        let _customer = self.repo.customer(customer_id).await?;
        let item = self.repo.catalog_item(kind, item_id).await?;

        let line = self
            .repo
            .add_cart_line(customer_id, kind, item_id, quantity, item.unit_price)
            .await?;
        tracing::info!(
            customer_id,
            item = %kind,
            item_id,
            quantity = line.quantity,
            "cart line updated"
        );
        Ok(line)
    }

    /// Returns the customer's cart with a totals preview.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn view(&self, customer_id: i64) -> Result<CartView, BookingError> {
        let lines = self.repo.cart_lines(customer_id).await?;
        let totals = money::compute_totals(
            lines
                .iter()
                .map(|l| money::line_subtotal(l.unit_price, l.quantity)),
            self.tax_rate,
        );
        Ok(CartView { lines, totals })
    }

    /// Converts the cart into a PENDING reservation.
    ///
    /// Validation happens up front; the reservation, its line snapshots,
    /// and the cart clear then commit in one transaction. The
    /// `reservation_created` event — and with it the notification
    /// emails — fires only after the commit, built from the in-memory
    /// snapshots rather than a re-query.
    ///
    /// # Errors
    ///
    /// Rejects a blank address, an empty cart, a date without an open
    /// slot, and a date already claimed by an active reservation.
    pub async fn confirm_cart(
        &self,
        customer_id: i64,
        event_date: NaiveDate,
        event_address: &str,
        special_notes: Option<&str>,
    ) -> Result<ConfirmedBooking, BookingError> {
        let address = event_address.trim();
        if address.is_empty() {
            return Err(BookingError::InvalidRequest(
                "event address is required".to_string(),
            ));
        }

        let customer = self.repo.customer(customer_id).await?;
        let lines = self.repo.cart_lines(customer_id).await?;
        if lines.is_empty() {
            return Err(BookingError::EmptyCart);
        }

        let slot = self
            .repo
            .slot_for_date(event_date)
            .await?
            .ok_or(BookingError::NoSlotForDate(event_date))?;

        // Read-then-insert overlap guard, date granularity. Racy across
        // concurrent confirmations; the partial unique index turns the
        // lost race into a DateAlreadyBooked conflict.
        if self.repo.active_reservation_on(event_date).await? {
            return Err(BookingError::DateAlreadyBooked(event_date));
        }

        let totals = money::compute_totals(
            lines
                .iter()
                .map(|l| money::line_subtotal(l.unit_price, l.quantity)),
            self.tax_rate,
        );

        let new_lines: Vec<NewReservationLine> = lines.iter().map(snapshot_line).collect();
        let snapshots: Vec<LineSnapshot> = new_lines
            .iter()
            .map(|l| LineSnapshot {
                item_name: l.item_name.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
                line_subtotal: l.line_subtotal,
            })
            .collect();

        let reservation = NewReservation {
            customer_id,
            slot_id: slot.id,
            code: generate_reservation_code(),
            event_date,
            starts_at: slot.starts_at,
            event_address: address.to_string(),
            special_notes: special_notes.map(str::to_string),
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
        };

        let (reservation_id, code) =
            persist_with_fresh_code(self.repo.as_ref(), reservation, &new_lines, Some(customer_id))
                .await?;

        tracing::info!(reservation_id, code = %code, %event_date, "cart confirmed");

        self.bus.publish(BookingEvent::ReservationCreated {
            reservation_id,
            code: code.clone(),
            customer: CustomerContact {
                first_name: customer.first_name,
                last_name: customer.last_name,
                email: customer.email,
            },
            event_date,
            event_address: address.to_string(),
            lines: snapshots,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            payment_method: None,
            timestamp: Utc::now(),
        });

        Ok(ConfirmedBooking {
            reservation_id,
            code,
        })
    }
}

/// Freezes one cart line into a reservation-line insert.
fn snapshot_line(line: &CartLine) -> NewReservationLine {
    NewReservationLine {
        kind: line.kind(),
        service_id: line.service_id,
        bundle_id: line.bundle_id,
        promotion_id: line.promotion_id,
        item_name: line.item_name.clone(),
        quantity: line.quantity,
        unit_price: line.unit_price,
        line_subtotal: money::line_subtotal(line.unit_price, line.quantity),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryRepo;
    use std::sync::atomic::Ordering;

    fn dec(s: &str) -> Decimal {
        s.parse().ok().unwrap_or_else(|| panic!("bad decimal {s}"))
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().ok().unwrap_or_else(|| panic!("bad date {s}"))
    }

    struct Fixture {
        repo: Arc<MemoryRepo>,
        service: CartService,
        bus: EventBus,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepo::new());
        repo.add_customer(1, "Ana", "ana@example.com");
        repo.add_item(ItemKind::Service, 10, "Bounce house", dec("100.00"));
        repo.add_item(ItemKind::Bundle, 20, "Birthday pack", dec("250.00"));
        repo.add_slot(5, date("2025-12-01"), 2);
        let bus = EventBus::new(16);
        let service = CartService::new(
            Arc::clone(&repo) as Arc<dyn BookingRepo>,
            bus.clone(),
            dec("0.12"),
        );
        Fixture { repo, service, bus }
    }

    #[tokio::test]
    async fn add_item_captures_current_price() {
        let f = fixture();
        let line = f
            .service
            .add_item(1, ItemKind::Service, 10, 1)
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        assert_eq!(line.unit_price, dec("100.00"));
        assert_eq!(line.item_name, "Bounce house");
    }

    #[tokio::test]
    async fn add_item_accumulates_quantity() {
        let f = fixture();
        let _ = f.service.add_item(1, ItemKind::Service, 10, 1).await;
        let line = f
            .service
            .add_item(1, ItemKind::Service, 10, 2)
            .await
            .unwrap_or_else(|e| panic!("add failed: {e}"));
        assert_eq!(line.quantity, 3);
    }

    #[tokio::test]
    async fn add_item_rejects_zero_quantity() {
        let f = fixture();
        let result = f.service.add_item(1, ItemKind::Service, 10, 0).await;
        assert!(matches!(result, Err(BookingError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn add_item_rejects_unknown_item() {
        let f = fixture();
        let result = f.service.add_item(1, ItemKind::Promotion, 99, 1).await;
        assert!(matches!(result, Err(BookingError::ItemNotFound { .. })));
    }

    #[tokio::test]
    async fn confirm_produces_expected_totals_and_empties_cart() {
        let f = fixture();
        let _ = f.service.add_item(1, ItemKind::Service, 10, 1).await;

        let booking = f
            .service
            .confirm_cart(1, date("2025-12-01"), "Main St 1", None)
            .await
            .unwrap_or_else(|e| panic!("confirm failed: {e}"));

        let reservation = f
            .repo
            .reservation(booking.reservation_id)
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(reservation.subtotal, dec("100.00"));
        assert_eq!(reservation.tax, dec("12.00"));
        assert_eq!(reservation.total, dec("112.00"));
        assert_eq!(reservation.state, "PENDING");
        assert_eq!(reservation.code, booking.code);

        let cart = f.repo.cart_lines(1).await.unwrap_or_default();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn confirm_is_atomic_when_line_insert_fails() {
        let f = fixture();
        let _ = f.service.add_item(1, ItemKind::Service, 10, 1).await;
        let _ = f.service.add_item(1, ItemKind::Bundle, 20, 1).await;
        f.repo.fail_line_insert.store(true, Ordering::SeqCst);

        let result = f
            .service
            .confirm_cart(1, date("2025-12-01"), "Main St 1", None)
            .await;
        assert!(matches!(result, Err(BookingError::Database(_))));

        // No reservation persisted, cart untouched.
        let cart = f.repo.cart_lines(1).await.unwrap_or_default();
        assert_eq!(cart.len(), 2);
        assert!(
            !f.repo
                .active_reservation_on(date("2025-12-01"))
                .await
                .unwrap_or(true)
        );
    }

    #[tokio::test]
    async fn confirm_rejects_empty_cart() {
        let f = fixture();
        let result = f
            .service
            .confirm_cart(1, date("2025-12-01"), "Main St 1", None)
            .await;
        assert!(matches!(result, Err(BookingError::EmptyCart)));
    }

    #[tokio::test]
    async fn confirm_rejects_blank_address() {
        let f = fixture();
        let _ = f.service.add_item(1, ItemKind::Service, 10, 1).await;
        let result = f
            .service
            .confirm_cart(1, date("2025-12-01"), "   ", None)
            .await;
        assert!(matches!(result, Err(BookingError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn confirm_rejects_date_without_slot() {
        let f = fixture();
        let _ = f.service.add_item(1, ItemKind::Service, 10, 1).await;
        let result = f
            .service
            .confirm_cart(1, date("2025-12-02"), "Main St 1", None)
            .await;
        assert!(matches!(result, Err(BookingError::NoSlotForDate(_))));
    }

    #[tokio::test]
    async fn confirm_rejects_already_booked_date() {
        let f = fixture();
        f.repo.add_customer(2, "Eva", "eva@example.com");
        let _ = f.service.add_item(1, ItemKind::Service, 10, 1).await;
        let _ = f
            .service
            .confirm_cart(1, date("2025-12-01"), "Main St 1", None)
            .await;

        let _ = f.service.add_item(2, ItemKind::Bundle, 20, 1).await;
        let result = f
            .service
            .confirm_cart(2, date("2025-12-01"), "Oak Ave 2", None)
            .await;
        assert!(matches!(result, Err(BookingError::DateAlreadyBooked(_))));
    }

    #[tokio::test]
    async fn confirm_publishes_event_with_in_memory_snapshots() {
        let f = fixture();
        let mut rx = f.bus.subscribe();
        let _ = f.service.add_item(1, ItemKind::Service, 10, 2).await;

        let booking = f
            .service
            .confirm_cart(1, date("2025-12-01"), "Main St 1", None)
            .await
            .unwrap_or_else(|e| panic!("confirm failed: {e}"));

        let Ok(event) = rx.try_recv() else {
            panic!("expected a reservation_created event");
        };
        let BookingEvent::ReservationCreated {
            code,
            lines,
            total,
            customer,
            ..
        } = event
        else {
            panic!("wrong event variant");
        };
        assert_eq!(code, booking.code);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines.first().map(|l| l.line_subtotal),
            Some(dec("200.00"))
        );
        assert_eq!(total, dec("224.00"));
        assert_eq!(customer.email, "ana@example.com");
    }

    #[tokio::test]
    async fn failed_confirm_publishes_nothing() {
        let f = fixture();
        let mut rx = f.bus.subscribe();
        let result = f
            .service
            .confirm_cart(1, date("2025-12-01"), "Main St 1", None)
            .await;
        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }
}
