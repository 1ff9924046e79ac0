//! In-memory [`BookingRepo`] for service-layer tests.
//!
//! Mimics the Postgres implementation's observable behavior, including
//! the partial-index conflicts and the all-or-nothing semantics of
//! `persist_reservation`. A line-insert failure can be injected to test
//! atomicity.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use super::models::{
    BankAccount, CartLine, CatalogItem, Customer, NewReservation, NewReservationLine, Reservation,
    ReservationLine, SlotAvailability, TimeSlot,
};
use super::repo::BookingRepo;
use crate::domain::{ItemKind, PaymentMethod, ReservationState};
use crate::error::BookingError;

#[derive(Debug, Default)]
struct State {
    customers: HashMap<i64, Customer>,
    items: HashMap<(ItemKind, i64), CatalogItem>,
    slots: Vec<TimeSlot>,
    cart_lines: HashMap<i64, Vec<CartLine>>,
    reservations: HashMap<i64, Reservation>,
    reservation_lines: HashMap<i64, Vec<ReservationLine>>,
    bank_accounts: Vec<BankAccount>,
    next_id: i64,
}

impl State {
    fn fresh_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Test double for the repository seam.
#[derive(Debug, Default)]
pub(crate) struct MemoryRepo {
    state: Mutex<State>,
    /// When set, the next `persist_reservation` fails at line insertion.
    pub(crate) fail_line_insert: AtomicBool,
}

impl MemoryRepo {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_customer(&self, id: i64, first_name: &str, email: &str) {
        let mut state = self.lock();
        state.customers.insert(
            id,
            Customer {
                id,
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                email: email.to_string(),
                phone: format!("555-{id:04}"),
                active: true,
            },
        );
    }

    pub(crate) fn add_item(&self, kind: ItemKind, id: i64, name: &str, unit_price: Decimal) {
        let mut state = self.lock();
        state.items.insert(
            (kind, id),
            CatalogItem {
                name: name.to_string(),
                unit_price,
            },
        );
    }

    pub(crate) fn add_slot(&self, id: i64, date: NaiveDate, capacity: i32) {
        let mut state = self.lock();
        state.slots.push(TimeSlot {
            id,
            slot_date: date,
            starts_at: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default(),
            ends_at: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            available: true,
            capacity,
        });
    }

    pub(crate) fn add_bank_account(&self, id: i64, bank_name: &str) {
        let mut state = self.lock();
        state.bank_accounts.push(BankAccount {
            id,
            bank_name: bank_name.to_string(),
            account_holder: "Party Rentals LLC".to_string(),
            account_number: format!("ACC-{id:06}"),
            instructions: None,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl BookingRepo for MemoryRepo {
    async fn customer(&self, customer_id: i64) -> Result<Customer, BookingError> {
        self.lock()
            .customers
            .get(&customer_id)
            .cloned()
            .ok_or(BookingError::CustomerNotFound(customer_id))
    }

    async fn catalog_item(&self, kind: ItemKind, item_id: i64) -> Result<CatalogItem, BookingError> {
        self.lock()
            .items
            .get(&(kind, item_id))
            .cloned()
            .ok_or(BookingError::ItemNotFound { kind, id: item_id })
    }

    async fn add_cart_line(
        &self,
        customer_id: i64,
        kind: ItemKind,
        item_id: i64,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartLine, BookingError> {
        let mut state = self.lock();
        let item_name = state
            .items
            .get(&(kind, item_id))
            .map(|i| i.name.clone())
            .unwrap_or_default();
        let line_id = state.fresh_id();
        let lines = state.cart_lines.entry(customer_id).or_default();

        let matches_item = |line: &CartLine| match kind {
            ItemKind::Service => line.service_id == Some(item_id),
            ItemKind::Bundle => line.bundle_id == Some(item_id),
            ItemKind::Promotion => line.promotion_id == Some(item_id),
        };
        if let Some(line) = lines.iter_mut().find(|l| matches_item(l)) {
            line.quantity += quantity;
            line.unit_price = unit_price;
            return Ok(line.clone());
        }

        let line = CartLine {
            id: line_id,
            cart_id: customer_id,
            service_id: (kind == ItemKind::Service).then_some(item_id),
            bundle_id: (kind == ItemKind::Bundle).then_some(item_id),
            promotion_id: (kind == ItemKind::Promotion).then_some(item_id),
            item_name,
            quantity,
            unit_price,
        };
        lines.push(line.clone());
        Ok(line)
    }

    async fn cart_lines(&self, customer_id: i64) -> Result<Vec<CartLine>, BookingError> {
        Ok(self
            .lock()
            .cart_lines
            .get(&customer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn slot_for_date(&self, date: NaiveDate) -> Result<Option<TimeSlot>, BookingError> {
        Ok(self
            .lock()
            .slots
            .iter()
            .find(|s| s.slot_date == date && s.available)
            .cloned())
    }

    async fn slot(&self, slot_id: i64) -> Result<TimeSlot, BookingError> {
        self.lock()
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .cloned()
            .ok_or(BookingError::SlotNotFound(slot_id))
    }

    async fn open_slots(&self, date: NaiveDate) -> Result<Vec<SlotAvailability>, BookingError> {
        let state = self.lock();
        let booked_on = |slot_id: i64| {
            state
                .reservations
                .values()
                .filter(|r| {
                    r.slot_id == slot_id
                        && r.current_state().is_some_and(ReservationState::is_active)
                })
                .count() as i64
        };
        Ok(state
            .slots
            .iter()
            .filter(|s| s.slot_date == date && s.available)
            .map(|s| SlotAvailability {
                id: s.id,
                slot_date: s.slot_date,
                starts_at: s.starts_at,
                ends_at: s.ends_at,
                capacity: s.capacity,
                booked: booked_on(s.id),
            })
            .filter(|s| s.booked < i64::from(s.capacity))
            .collect())
    }

    async fn active_reservation_on(&self, date: NaiveDate) -> Result<bool, BookingError> {
        Ok(self.lock().reservations.values().any(|r| {
            r.event_date == date && r.current_state().is_some_and(ReservationState::is_active)
        }))
    }

    async fn persist_reservation(
        &self,
        reservation: &NewReservation,
        lines: &[NewReservationLine],
        empty_cart_for: Option<i64>,
    ) -> Result<i64, BookingError> {
        let mut state = self.lock();

        if state.reservations.values().any(|r| r.code == reservation.code) {
            return Err(BookingError::CodeCollision);
        }
        let date_taken = state.reservations.values().any(|r| {
            r.event_date == reservation.event_date
                && r.current_state().is_some_and(ReservationState::is_active)
        });
        if date_taken {
            return Err(BookingError::DateAlreadyBooked(reservation.event_date));
        }
        // Atomicity: fail before any mutation, like a rolled-back
        // transaction.
        if self.fail_line_insert.load(Ordering::SeqCst) {
            return Err(BookingError::Database("injected line failure".to_string()));
        }

        let reservation_id = state.fresh_id();
        let snapshots: Vec<ReservationLine> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| ReservationLine {
                id: reservation_id * 100 + i as i64,
                reservation_id,
                line_kind: line.kind.db_code().to_string(),
                item_name: line.item_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_subtotal: line.line_subtotal,
            })
            .collect();

        state.reservations.insert(
            reservation_id,
            Reservation {
                id: reservation_id,
                customer_id: reservation.customer_id,
                slot_id: reservation.slot_id,
                code: reservation.code.clone(),
                event_date: reservation.event_date,
                starts_at: reservation.starts_at,
                event_address: reservation.event_address.clone(),
                special_notes: reservation.special_notes.clone(),
                subtotal: reservation.subtotal,
                discount: Decimal::ZERO,
                tax: reservation.tax,
                total: reservation.total,
                state: ReservationState::Pending.as_str().to_string(),
                payment_method: None,
                payment_proof_url: None,
                transaction_id: None,
                booked_at: Utc::now(),
                confirmed_at: None,
            },
        );
        state.reservation_lines.insert(reservation_id, snapshots);

        if let Some(customer_id) = empty_cart_for {
            state.cart_lines.remove(&customer_id);
        }
        Ok(reservation_id)
    }

    async fn reservation(&self, reservation_id: i64) -> Result<Reservation, BookingError> {
        self.lock()
            .reservations
            .get(&reservation_id)
            .cloned()
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))
    }

    async fn reservation_by_code(&self, code: &str) -> Result<Reservation, BookingError> {
        self.lock()
            .reservations
            .values()
            .find(|r| r.code == code)
            .cloned()
            .ok_or_else(|| BookingError::ReservationNotFound(code.to_string()))
    }

    async fn reservation_lines(
        &self,
        reservation_id: i64,
    ) -> Result<Vec<ReservationLine>, BookingError> {
        Ok(self
            .lock()
            .reservation_lines
            .get(&reservation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transaction_id_taken(
        &self,
        transaction_id: &str,
        exclude: i64,
    ) -> Result<bool, BookingError> {
        Ok(self.lock().reservations.values().any(|r| {
            r.id != exclude && r.transaction_id.as_deref() == Some(transaction_id)
        }))
    }

    async fn mark_approved(
        &self,
        reservation_id: i64,
        transaction_id: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let mut state = self.lock();
        let taken = state.reservations.values().any(|r| {
            r.id != reservation_id && r.transaction_id.as_deref() == Some(transaction_id)
        });
        if taken {
            return Err(BookingError::DuplicateTransactionId(
                transaction_id.to_string(),
            ));
        }
        let reservation = state
            .reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))?;
        reservation.state = ReservationState::Approved.as_str().to_string();
        reservation.transaction_id = Some(transaction_id.to_string());
        reservation.confirmed_at = Some(confirmed_at);
        Ok(())
    }

    async fn set_state(
        &self,
        reservation_id: i64,
        state: ReservationState,
    ) -> Result<(), BookingError> {
        let mut guard = self.lock();
        let reservation = guard
            .reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))?;
        reservation.state = state.as_str().to_string();
        Ok(())
    }

    async fn set_payment(
        &self,
        reservation_id: i64,
        method: PaymentMethod,
        proof_url: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<(), BookingError> {
        let mut guard = self.lock();
        let reservation = guard
            .reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))?;
        reservation.payment_method = Some(method.as_str().to_string());
        reservation.payment_proof_url = proof_url.map(str::to_string);
        reservation.transaction_id = transaction_id.map(str::to_string);
        Ok(())
    }

    async fn active_bank_accounts(&self) -> Result<Vec<BankAccount>, BookingError> {
        Ok(self.lock().bank_accounts.clone())
    }
}
