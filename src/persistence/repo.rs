//! The repository seam between the services and storage.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::models::{
    BankAccount, CartLine, CatalogItem, Customer, NewReservation, NewReservationLine, Reservation,
    ReservationLine, SlotAvailability, TimeSlot,
};
use crate::domain::{ItemKind, PaymentMethod, ReservationState};
use crate::error::BookingError;

/// Storage operations the booking services need.
///
/// The production implementation is [`super::PgBookingRepo`]; tests use
/// an in-memory one. Every method maps to at most one transaction —
/// [`BookingRepo::persist_reservation`] is the single multi-statement
/// atomic unit in the system.
#[async_trait]
pub trait BookingRepo: Send + Sync + std::fmt::Debug {
    /// Loads a customer by id.
    ///
    /// # Errors
    ///
    /// [`BookingError::CustomerNotFound`] when absent.
    async fn customer(&self, customer_id: i64) -> Result<Customer, BookingError>;

    /// Resolves a catalog item's name and current price.
    ///
    /// # Errors
    ///
    /// [`BookingError::ItemNotFound`] when absent or inactive.
    async fn catalog_item(&self, kind: ItemKind, item_id: i64) -> Result<CatalogItem, BookingError>;

    /// Adds `quantity` of an item to the customer's cart, creating the
    /// cart on first use and accumulating onto an existing line for the
    /// same item. The line's unit price is refreshed to `unit_price`.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn add_cart_line(
        &self,
        customer_id: i64,
        kind: ItemKind,
        item_id: i64,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartLine, BookingError>;

    /// Lists the customer's cart lines in insertion order.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn cart_lines(&self, customer_id: i64) -> Result<Vec<CartLine>, BookingError>;

    /// Finds the first open slot on a date, if any.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn slot_for_date(&self, date: NaiveDate) -> Result<Option<TimeSlot>, BookingError>;

    /// Loads a slot by id.
    ///
    /// # Errors
    ///
    /// [`BookingError::SlotNotFound`] when absent.
    async fn slot(&self, slot_id: i64) -> Result<TimeSlot, BookingError>;

    /// Lists open slots on a date with spare capacity.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn open_slots(&self, date: NaiveDate) -> Result<Vec<SlotAvailability>, BookingError>;

    /// Whether any PENDING or APPROVED reservation already claims the date.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn active_reservation_on(&self, date: NaiveDate) -> Result<bool, BookingError>;

    /// Atomically inserts the reservation with all line snapshots and,
    /// when `empty_cart_for` is set, deletes that customer's cart lines.
    /// Nothing persists if any statement fails.
    ///
    /// # Errors
    ///
    /// [`BookingError::CodeCollision`] on a duplicate code,
    /// [`BookingError::DateAlreadyBooked`] when the active-date index
    /// rejects the insert, [`BookingError::Database`] otherwise.
    async fn persist_reservation(
        &self,
        reservation: &NewReservation,
        lines: &[NewReservationLine],
        empty_cart_for: Option<i64>,
    ) -> Result<i64, BookingError>;

    /// Loads a reservation by id.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] when absent.
    async fn reservation(&self, reservation_id: i64) -> Result<Reservation, BookingError>;

    /// Loads a reservation by its public code.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] when absent.
    async fn reservation_by_code(&self, code: &str) -> Result<Reservation, BookingError>;

    /// Lists a reservation's line snapshots.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn reservation_lines(
        &self,
        reservation_id: i64,
    ) -> Result<Vec<ReservationLine>, BookingError>;

    /// Whether `transaction_id` is already recorded on any reservation
    /// other than `exclude`.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn transaction_id_taken(
        &self,
        transaction_id: &str,
        exclude: i64,
    ) -> Result<bool, BookingError>;

    /// Marks a reservation APPROVED with its transaction id and
    /// confirmation timestamp.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] when absent,
    /// [`BookingError::DuplicateTransactionId`] when the transaction-id
    /// index rejects the update.
    async fn mark_approved(
        &self,
        reservation_id: i64,
        transaction_id: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<(), BookingError>;

    /// Sets a reservation's lifecycle state.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] when absent.
    async fn set_state(
        &self,
        reservation_id: i64,
        state: ReservationState,
    ) -> Result<(), BookingError>;

    /// Records the chosen payment method and its attachments.
    ///
    /// # Errors
    ///
    /// [`BookingError::ReservationNotFound`] when absent.
    async fn set_payment(
        &self,
        reservation_id: i64,
        method: PaymentMethod,
        proof_url: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<(), BookingError>;

    /// Lists active bank accounts for transfer payers.
    ///
    /// # Errors
    ///
    /// Database failures surface as [`BookingError::Database`].
    async fn active_bank_accounts(&self) -> Result<Vec<BankAccount>, BookingError>;
}
