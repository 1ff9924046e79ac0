//! Row models for the booking schema.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{ItemKind, ReservationState};

/// A customer row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    /// Row id.
    pub id: i64,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Notification address.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Whether the account is active.
    pub active: bool,
}

/// A catalog item resolved for cart pricing: name plus the current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Item name at lookup time.
    pub name: String,
    /// Current unit price.
    pub unit_price: Decimal,
}

/// A cart line joined with its catalog item's name.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    /// Row id.
    pub id: i64,
    /// Owning cart.
    pub cart_id: i64,
    /// Service reference, when the line is a service.
    pub service_id: Option<i64>,
    /// Bundle reference, when the line is a bundle.
    pub bundle_id: Option<i64>,
    /// Promotion reference, when the line is a promotion.
    pub promotion_id: Option<i64>,
    /// Item name at read time.
    pub item_name: String,
    /// Units in the cart.
    pub quantity: i32,
    /// Price per unit captured when the line was added.
    pub unit_price: Decimal,
}

impl CartLine {
    /// Which catalog item type the line references.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match (self.service_id, self.bundle_id) {
            (Some(_), _) => ItemKind::Service,
            (None, Some(_)) => ItemKind::Bundle,
            (None, None) => ItemKind::Promotion,
        }
    }
}

/// An admin-managed bookable time slot.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeSlot {
    /// Row id.
    pub id: i64,
    /// Calendar date.
    pub slot_date: NaiveDate,
    /// Window start.
    pub starts_at: NaiveTime,
    /// Window end.
    pub ends_at: NaiveTime,
    /// Whether the slot is open for booking at all.
    pub available: bool,
    /// Maximum simultaneous reservations.
    pub capacity: i32,
}

/// A slot together with its current active-reservation count.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SlotAvailability {
    /// Slot id.
    pub id: i64,
    /// Calendar date.
    pub slot_date: NaiveDate,
    /// Window start.
    pub starts_at: NaiveTime,
    /// Window end.
    pub ends_at: NaiveTime,
    /// Maximum simultaneous reservations.
    pub capacity: i32,
    /// PENDING/APPROVED reservations currently on the slot.
    pub booked: i64,
}

/// A reservation row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    /// Row id.
    pub id: i64,
    /// Owning customer.
    pub customer_id: i64,
    /// Booked slot.
    pub slot_id: i64,
    /// Human-readable unique code.
    pub code: String,
    /// Event date.
    pub event_date: NaiveDate,
    /// Event start time, copied from the slot.
    pub starts_at: NaiveTime,
    /// Delivery address.
    pub event_address: String,
    /// Free-form customer notes.
    pub special_notes: Option<String>,
    /// Pre-tax sum.
    pub subtotal: Decimal,
    /// Discount applied.
    pub discount: Decimal,
    /// Tax amount.
    pub tax: Decimal,
    /// Grand total.
    pub total: Decimal,
    /// Lifecycle state, stored as text.
    pub state: String,
    /// Payment method string, once chosen.
    pub payment_method: Option<String>,
    /// Proof-of-payment URL for transfers.
    pub payment_proof_url: Option<String>,
    /// Processor transaction id for card payments / approval.
    pub transaction_id: Option<String>,
    /// Creation timestamp.
    pub booked_at: DateTime<Utc>,
    /// Approval timestamp; the idempotency guard for re-approval.
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Parses the stored state string.
    ///
    /// Returns `None` only if the column holds a value outside the
    /// state machine, which indicates corrupt data.
    #[must_use]
    pub fn current_state(&self) -> Option<ReservationState> {
        ReservationState::parse(&self.state)
    }
}

/// An immutable reservation line snapshot row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReservationLine {
    /// Row id.
    pub id: i64,
    /// Owning reservation.
    pub reservation_id: i64,
    /// One-letter item kind code.
    pub line_kind: String,
    /// Item name frozen at confirmation.
    pub item_name: String,
    /// Units booked.
    pub quantity: i32,
    /// Unit price frozen at confirmation.
    pub unit_price: Decimal,
    /// `unit_price × quantity` frozen at confirmation.
    pub line_subtotal: Decimal,
}

/// Values for a reservation insert.
#[derive(Debug, Clone)]
pub struct NewReservation {
    /// Owning customer.
    pub customer_id: i64,
    /// Booked slot.
    pub slot_id: i64,
    /// Generated unique code.
    pub code: String,
    /// Event date.
    pub event_date: NaiveDate,
    /// Event start time.
    pub starts_at: NaiveTime,
    /// Delivery address.
    pub event_address: String,
    /// Free-form customer notes.
    pub special_notes: Option<String>,
    /// Pre-tax sum.
    pub subtotal: Decimal,
    /// Tax amount.
    pub tax: Decimal,
    /// Grand total.
    pub total: Decimal,
}

/// Values for one reservation-line insert.
#[derive(Debug, Clone)]
pub struct NewReservationLine {
    /// Which catalog item type the snapshot references.
    pub kind: ItemKind,
    /// Service reference.
    pub service_id: Option<i64>,
    /// Bundle reference.
    pub bundle_id: Option<i64>,
    /// Promotion reference.
    pub promotion_id: Option<i64>,
    /// Item name frozen at confirmation.
    pub item_name: String,
    /// Units booked.
    pub quantity: i32,
    /// Unit price frozen at confirmation.
    pub unit_price: Decimal,
    /// `unit_price × quantity`.
    pub line_subtotal: Decimal,
}

/// An active bank account served to transfer payers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BankAccount {
    /// Row id.
    pub id: i64,
    /// Bank name.
    pub bank_name: String,
    /// Account holder.
    pub account_holder: String,
    /// Account number.
    pub account_number: String,
    /// Free-form payment instructions.
    pub instructions: Option<String>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn cart_line_kind_follows_populated_reference() {
        let mut line = CartLine {
            id: 1,
            cart_id: 1,
            service_id: Some(9),
            bundle_id: None,
            promotion_id: None,
            item_name: "Bounce house".to_string(),
            quantity: 1,
            unit_price: Decimal::ONE,
        };
        assert_eq!(line.kind(), ItemKind::Service);

        line.service_id = None;
        line.bundle_id = Some(3);
        assert_eq!(line.kind(), ItemKind::Bundle);

        line.bundle_id = None;
        line.promotion_id = Some(4);
        assert_eq!(line.kind(), ItemKind::Promotion);
    }

    #[test]
    fn reservation_state_parses_stored_text() {
        let reservation = Reservation {
            id: 1,
            customer_id: 1,
            slot_id: 1,
            code: "RES-1111-AAAA".to_string(),
            event_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap_or_default(),
            starts_at: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default(),
            event_address: "Main St 1".to_string(),
            special_notes: None,
            subtotal: Decimal::ZERO,
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            state: "PENDING".to_string(),
            payment_method: None,
            payment_proof_url: None,
            transaction_id: None,
            booked_at: Utc::now(),
            confirmed_at: None,
        };
        assert_eq!(reservation.current_state(), Some(ReservationState::Pending));
    }
}
