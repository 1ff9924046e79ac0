//! Reservation lifecycle: direct booking, slot availability, lookup,
//! checkout, and the admin approve/void/delete transitions.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use super::persist_with_fresh_code;
use crate::domain::money;
use crate::domain::{
    BookingEvent, CustomerContact, EventBus, ItemKind, LineSnapshot, PaymentMethod,
    ReservationState, generate_reservation_code,
};
use crate::error::BookingError;
use crate::persistence::BookingRepo;
use crate::persistence::models::{
    BankAccount, Customer, NewReservation, NewReservationLine, Reservation, ReservationLine,
    SlotAvailability,
};

/// Outcome of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The reservation transitioned to APPROVED and notifications fired.
    Approved,
    /// The reservation was already approved; nothing changed and no
    /// notification fired (the `confirmed_at` idempotency guard).
    AlreadyApproved,
}

/// A reservation with its immutable line snapshots.
#[derive(Debug, Clone)]
pub struct ReservationDetail {
    /// The reservation row.
    pub reservation: Reservation,
    /// Its line snapshots in insertion order.
    pub lines: Vec<ReservationLine>,
}

/// Checkout result: the stored method plus bank details for transfers.
#[derive(Debug, Clone)]
pub struct CheckoutSummary {
    /// Method now on the reservation.
    pub method: PaymentMethod,
    /// Current reservation state string.
    pub state: String,
    /// Active bank accounts; populated only for transfers.
    pub bank_accounts: Vec<BankAccount>,
}

/// Reservation business logic over the repository seam.
#[derive(Debug, Clone)]
pub struct BookingService {
    repo: Arc<dyn BookingRepo>,
    bus: EventBus,
    tax_rate: Decimal,
}

impl BookingService {
    /// Creates the service.
    #[must_use]
    pub fn new(repo: Arc<dyn BookingRepo>, bus: EventBus, tax_rate: Decimal) -> Self {
        Self {
            repo,
            bus,
            tax_rate,
        }
    }

    /// Creates a reservation directly from one catalog item and an
    /// explicit slot, bypassing the cart.
    ///
    /// # Errors
    ///
    /// Rejects a blank address, an unknown customer/slot/item, a closed
    /// slot, and (via the active-date index) an already-booked date.
    pub async fn direct_booking(
        &self,
        customer_id: i64,
        slot_id: i64,
        kind: ItemKind,
        item_id: i64,
        event_address: &str,
        special_notes: Option<&str>,
    ) -> Result<(i64, String), BookingError> {
        let address = event_address.trim();
        if address.is_empty() {
            return Err(BookingError::InvalidRequest(
                "event address is required".to_string(),
            ));
        }

        let customer = self.repo.customer(customer_id).await?;
        let slot = self.repo.slot(slot_id).await?;
        if !slot.available {
            return Err(BookingError::SlotNotFound(slot_id));
        }
        let item = self.repo.catalog_item(kind, item_id).await?;

        let line_subtotal = money::line_subtotal(item.unit_price, 1);
        let totals = money::compute_totals([line_subtotal], self.tax_rate);
        let line = NewReservationLine {
            kind,
            service_id: (kind == ItemKind::Service).then_some(item_id),
            bundle_id: (kind == ItemKind::Bundle).then_some(item_id),
            promotion_id: (kind == ItemKind::Promotion).then_some(item_id),
            item_name: item.name.clone(),
            quantity: 1,
            unit_price: item.unit_price,
            line_subtotal,
        };
        let reservation = NewReservation {
            customer_id,
            slot_id: slot.id,
            code: generate_reservation_code(),
            event_date: slot.slot_date,
            starts_at: slot.starts_at,
            event_address: address.to_string(),
            special_notes: special_notes.map(str::to_string),
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
        };

        let (reservation_id, code) =
            persist_with_fresh_code(self.repo.as_ref(), reservation, &[line.clone()], None).await?;

        tracing::info!(reservation_id, code = %code, slot_id, "direct booking created");

        self.bus.publish(BookingEvent::ReservationCreated {
            reservation_id,
            code: code.clone(),
            customer: contact(&customer),
            event_date: slot.slot_date,
            event_address: address.to_string(),
            lines: vec![LineSnapshot {
                item_name: line.item_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_subtotal: line.line_subtotal,
            }],
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            payment_method: None,
            timestamp: Utc::now(),
        });

        Ok((reservation_id, code))
    }

    /// Lists open slots on a date with spare capacity.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn available_slots(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, BookingError> {
        self.repo.open_slots(date).await
    }

    /// Fetches a reservation with its line snapshots by public code.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] when the code is unknown.
    pub async fn lookup(&self, code: &str) -> Result<ReservationDetail, BookingError> {
        let reservation = self.repo.reservation_by_code(code).await?;
        let lines = self.repo.reservation_lines(reservation.id).await?;
        Ok(ReservationDetail { reservation, lines })
    }

    /// Records the customer's payment method choice.
    ///
    /// Transfers return the active bank accounts so the customer can pay;
    /// cards store the processor transaction id; cash clears both.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] for an unknown reservation.
    pub async fn checkout(
        &self,
        reservation_id: i64,
        method: PaymentMethod,
        transaction_id: Option<&str>,
        proof_url: Option<&str>,
    ) -> Result<CheckoutSummary, BookingError> {
        let reservation = self.repo.reservation(reservation_id).await?;

        let (proof, txn) = match method {
            PaymentMethod::Transfer => (proof_url, None),
            PaymentMethod::Card => (None, transaction_id),
            PaymentMethod::Cash => (None, None),
        };
        self.repo
            .set_payment(reservation_id, method, proof, txn)
            .await?;

        let bank_accounts = if method == PaymentMethod::Transfer {
            self.repo.active_bank_accounts().await?
        } else {
            Vec::new()
        };

        tracing::info!(reservation_id, method = %method, "payment method recorded");
        Ok(CheckoutSummary {
            method,
            state: reservation.state,
            bank_accounts,
        })
    }

    /// Approves a PENDING reservation with a verified transaction id.
    ///
    /// Re-approving an already-approved reservation (with `confirmed_at`
    /// set) is an idempotent no-op: no state change, no notification.
    ///
    /// # Errors
    ///
    /// Rejects a blank transaction id, a transaction id recorded on a
    /// different reservation (anti-fraud), and any state other than
    /// PENDING.
    pub async fn approve(
        &self,
        reservation_id: i64,
        transaction_id: &str,
    ) -> Result<ApprovalOutcome, BookingError> {
        let txn = transaction_id.trim();
        if txn.is_empty() {
            return Err(BookingError::InvalidRequest(
                "transaction id is required".to_string(),
            ));
        }

        let reservation = self.repo.reservation(reservation_id).await?;
        let state = state_of(&reservation)?;

        if state == ReservationState::Approved && reservation.confirmed_at.is_some() {
            tracing::info!(reservation_id, "already approved, skipping re-notification");
            return Ok(ApprovalOutcome::AlreadyApproved);
        }
        if !state.can_transition_to(ReservationState::Approved) {
            return Err(BookingError::InvalidTransition {
                from: state,
                action: "approve",
            });
        }
        if self.repo.transaction_id_taken(txn, reservation_id).await? {
            return Err(BookingError::DuplicateTransactionId(txn.to_string()));
        }

        self.repo
            .mark_approved(reservation_id, txn, Utc::now())
            .await?;

        let customer = self.repo.customer(reservation.customer_id).await?;
        tracing::info!(reservation_id, code = %reservation.code, "reservation approved");
        self.bus.publish(BookingEvent::ReservationApproved {
            reservation_id,
            code: reservation.code,
            customer: contact(&customer),
            event_date: reservation.event_date,
            timestamp: Utc::now(),
        });
        Ok(ApprovalOutcome::Approved)
    }

    /// Voids a PENDING reservation.
    ///
    /// # Errors
    ///
    /// Rejects any state other than PENDING.
    pub async fn void(&self, reservation_id: i64) -> Result<(), BookingError> {
        let reservation = self.repo.reservation(reservation_id).await?;
        let state = state_of(&reservation)?;
        if !state.can_transition_to(ReservationState::Voided) {
            return Err(BookingError::InvalidTransition {
                from: state,
                action: "void",
            });
        }

        self.repo
            .set_state(reservation_id, ReservationState::Voided)
            .await?;

        let customer = self.repo.customer(reservation.customer_id).await?;
        tracing::info!(reservation_id, code = %reservation.code, "reservation voided");
        self.bus.publish(BookingEvent::ReservationVoided {
            reservation_id,
            code: reservation.code,
            customer: contact(&customer),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Marks a PENDING or APPROVED reservation DELETED. Administrative
    /// tombstone; fires no notification.
    ///
    /// # Errors
    ///
    /// Rejects VOIDED and DELETED reservations.
    pub async fn remove(&self, reservation_id: i64) -> Result<(), BookingError> {
        let reservation = self.repo.reservation(reservation_id).await?;
        let state = state_of(&reservation)?;
        if !state.can_transition_to(ReservationState::Deleted) {
            return Err(BookingError::InvalidTransition {
                from: state,
                action: "delete",
            });
        }
        self.repo
            .set_state(reservation_id, ReservationState::Deleted)
            .await?;
        tracing::info!(reservation_id, code = %reservation.code, "reservation deleted");
        Ok(())
    }
}

fn contact(customer: &Customer) -> CustomerContact {
    CustomerContact {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
    }
}

fn state_of(reservation: &Reservation) -> Result<ReservationState, BookingError> {
    reservation.current_state().ok_or_else(|| {
        BookingError::Internal(format!(
            "reservation {} has unknown state {:?}",
            reservation.id, reservation.state
        ))
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryRepo;

    fn dec(s: &str) -> Decimal {
        s.parse().ok().unwrap_or_else(|| panic!("bad decimal {s}"))
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().ok().unwrap_or_else(|| panic!("bad date {s}"))
    }

    struct Fixture {
        repo: Arc<MemoryRepo>,
        service: BookingService,
        bus: EventBus,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepo::new());
        repo.add_customer(1, "Ana", "ana@example.com");
        repo.add_item(ItemKind::Service, 10, "Bounce house", dec("100.00"));
        repo.add_slot(5, date("2025-12-01"), 2);
        repo.add_bank_account(1, "First National");
        let bus = EventBus::new(16);
        let service = BookingService::new(
            Arc::clone(&repo) as Arc<dyn BookingRepo>,
            bus.clone(),
            dec("0.12"),
        );
        Fixture { repo, service, bus }
    }

    async fn make_booking(f: &Fixture) -> i64 {
        let (id, _code) = f
            .service
            .direct_booking(1, 5, ItemKind::Service, 10, "Main St 1", None)
            .await
            .unwrap_or_else(|e| panic!("booking failed: {e}"));
        id
    }

    #[tokio::test]
    async fn direct_booking_computes_totals() {
        let f = fixture();
        let id = make_booking(&f).await;
        let reservation = f
            .repo
            .reservation(id)
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(reservation.subtotal, dec("100.00"));
        assert_eq!(reservation.total, dec("112.00"));
        assert_eq!(reservation.state, "PENDING");
    }

    #[tokio::test]
    async fn direct_booking_rejects_unknown_slot() {
        let f = fixture();
        let result = f
            .service
            .direct_booking(1, 99, ItemKind::Service, 10, "Main St 1", None)
            .await;
        assert!(matches!(result, Err(BookingError::SlotNotFound(99))));
    }

    #[tokio::test]
    async fn approve_sets_state_and_fires_event() {
        let f = fixture();
        let id = make_booking(&f).await;
        let mut rx = f.bus.subscribe();

        let outcome = f
            .service
            .approve(id, "TX-100")
            .await
            .unwrap_or_else(|e| panic!("approve failed: {e}"));
        assert_eq!(outcome, ApprovalOutcome::Approved);

        let reservation = f
            .repo
            .reservation(id)
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(reservation.state, "APPROVED");
        assert!(reservation.confirmed_at.is_some());

        let Ok(event) = rx.try_recv() else {
            panic!("expected approval event");
        };
        assert_eq!(event.event_type_str(), "reservation_approved");
    }

    #[tokio::test]
    async fn second_approval_is_silent_noop() {
        let f = fixture();
        let id = make_booking(&f).await;
        let _ = f.service.approve(id, "TX-100").await;

        let mut rx = f.bus.subscribe();
        let outcome = f
            .service
            .approve(id, "TX-100")
            .await
            .unwrap_or_else(|e| panic!("re-approve failed: {e}"));
        assert_eq!(outcome, ApprovalOutcome::AlreadyApproved);
        // No second notification: confirmed_at is already set.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn approve_rejects_reused_transaction_id() {
        let f = fixture();
        f.repo.add_customer(2, "Eva", "eva@example.com");
        f.repo.add_slot(6, date("2025-12-02"), 1);
        let first = make_booking(&f).await;
        let (second, _) = f
            .service
            .direct_booking(2, 6, ItemKind::Service, 10, "Oak Ave 2", None)
            .await
            .unwrap_or_else(|e| panic!("booking failed: {e}"));

        let _ = f.service.approve(first, "TX-SAME").await;
        let result = f.service.approve(second, "TX-SAME").await;
        assert!(matches!(
            result,
            Err(BookingError::DuplicateTransactionId(_))
        ));

        // No state change on the rejected reservation.
        let reservation = f
            .repo
            .reservation(second)
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(reservation.state, "PENDING");
        assert!(reservation.confirmed_at.is_none());
    }

    #[tokio::test]
    async fn approve_rejects_blank_transaction_id() {
        let f = fixture();
        let id = make_booking(&f).await;
        let result = f.service.approve(id, "  ").await;
        assert!(matches!(result, Err(BookingError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn void_fires_event_and_blocks_approval() {
        let f = fixture();
        let id = make_booking(&f).await;
        let mut rx = f.bus.subscribe();

        f.service
            .void(id)
            .await
            .unwrap_or_else(|e| panic!("void failed: {e}"));
        let Ok(event) = rx.try_recv() else {
            panic!("expected void event");
        };
        assert_eq!(event.event_type_str(), "reservation_voided");

        let result = f.service.approve(id, "TX-1").await;
        assert!(matches!(result, Err(BookingError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn remove_tombstones_without_event() {
        let f = fixture();
        let id = make_booking(&f).await;
        let mut rx = f.bus.subscribe();

        f.service
            .remove(id)
            .await
            .unwrap_or_else(|e| panic!("remove failed: {e}"));
        assert!(rx.try_recv().is_err());

        let reservation = f
            .repo
            .reservation(id)
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(reservation.state, "DELETED");
    }

    #[tokio::test]
    async fn checkout_transfer_returns_bank_accounts() {
        let f = fixture();
        let id = make_booking(&f).await;
        let summary = f
            .service
            .checkout(id, PaymentMethod::Transfer, None, Some("https://proof"))
            .await
            .unwrap_or_else(|e| panic!("checkout failed: {e}"));
        assert_eq!(summary.method, PaymentMethod::Transfer);
        assert_eq!(summary.bank_accounts.len(), 1);

        let reservation = f
            .repo
            .reservation(id)
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(reservation.payment_method.as_deref(), Some("transfer"));
        assert_eq!(
            reservation.payment_proof_url.as_deref(),
            Some("https://proof")
        );
    }

    #[tokio::test]
    async fn checkout_cash_clears_attachments() {
        let f = fixture();
        let id = make_booking(&f).await;
        let _ = f
            .service
            .checkout(id, PaymentMethod::Card, Some("TX-9"), None)
            .await;
        let summary = f
            .service
            .checkout(id, PaymentMethod::Cash, None, None)
            .await
            .unwrap_or_else(|e| panic!("checkout failed: {e}"));
        assert!(summary.bank_accounts.is_empty());

        let reservation = f
            .repo
            .reservation(id)
            .await
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        assert_eq!(reservation.payment_method.as_deref(), Some("cash"));
        assert!(reservation.transaction_id.is_none());
        assert!(reservation.payment_proof_url.is_none());
    }

    #[tokio::test]
    async fn lookup_returns_lines() {
        let f = fixture();
        let (_id, code) = f
            .service
            .direct_booking(1, 5, ItemKind::Service, 10, "Main St 1", None)
            .await
            .unwrap_or_else(|e| panic!("booking failed: {e}"));
        let detail = f
            .service
            .lookup(&code)
            .await
            .unwrap_or_else(|e| panic!("lookup failed: {e}"));
        assert_eq!(detail.lines.len(), 1);
        assert_eq!(
            detail.lines.first().map(|l| l.item_name.as_str()),
            Some("Bounce house")
        );
    }

    #[tokio::test]
    async fn available_slots_excludes_full_ones() {
        let f = fixture();
        f.repo.add_customer(2, "Eva", "eva@example.com");
        f.repo.add_slot(7, date("2025-12-03"), 1);
        let slots = f
            .service
            .available_slots(date("2025-12-03"))
            .await
            .unwrap_or_default();
        assert_eq!(slots.len(), 1);

        let _ = f
            .service
            .direct_booking(2, 7, ItemKind::Service, 10, "Oak Ave 2", None)
            .await;
        let slots = f
            .service
            .available_slots(date("2025-12-03"))
            .await
            .unwrap_or_default();
        assert!(slots.is_empty());
    }
}
