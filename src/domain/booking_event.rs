//! Booking lifecycle events published after durable state changes.
//!
//! Events carry everything the notification layer needs in memory —
//! contact details, line snapshots, totals — so no subscriber has to
//! re-query rows that may not yet be visible on a lagging mirror.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::payment::PaymentMethod;

/// Customer contact details captured at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Destination address for customer notifications.
    pub email: String,
}

/// Immutable view of one reservation line as it was priced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSnapshot {
    /// Catalog item name at confirmation time.
    pub item_name: String,
    /// Units booked.
    pub quantity: i32,
    /// Price per unit captured when the line entered the cart.
    pub unit_price: Decimal,
    /// `unit_price × quantity`.
    pub line_subtotal: Decimal,
}

/// Events emitted by the booking services after a transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    /// A cart was converted (or a direct booking created) into a
    /// PENDING reservation.
    ReservationCreated {
        /// Database id of the new reservation.
        reservation_id: i64,
        /// Human-readable reservation code.
        code: String,
        /// Customer to notify.
        customer: CustomerContact,
        /// Booked event date.
        event_date: NaiveDate,
        /// Delivery address for the event.
        event_address: String,
        /// Line snapshots captured in memory before commit.
        lines: Vec<LineSnapshot>,
        /// Pre-tax sum.
        subtotal: Decimal,
        /// Tax amount.
        tax: Decimal,
        /// Grand total.
        total: Decimal,
        /// Payment method, when already chosen.
        payment_method: Option<PaymentMethod>,
        /// Publish timestamp.
        timestamp: DateTime<Utc>,
    },
    /// An admin approved the reservation with a verified payment.
    ReservationApproved {
        /// Reservation id.
        reservation_id: i64,
        /// Reservation code.
        code: String,
        /// Customer to notify.
        customer: CustomerContact,
        /// Booked event date.
        event_date: NaiveDate,
        /// Publish timestamp.
        timestamp: DateTime<Utc>,
    },
    /// The reservation was voided before approval.
    ReservationVoided {
        /// Reservation id.
        reservation_id: i64,
        /// Reservation code.
        code: String,
        /// Customer to notify.
        customer: CustomerContact,
        /// Publish timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl BookingEvent {
    /// Stable discriminator string, used in logs and the notification log.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ReservationCreated { .. } => "reservation_created",
            Self::ReservationApproved { .. } => "reservation_approved",
            Self::ReservationVoided { .. } => "reservation_voided",
        }
    }

    /// Reservation code the event refers to.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::ReservationCreated { code, .. }
            | Self::ReservationApproved { code, .. }
            | Self::ReservationVoided { code, .. } => code,
        }
    }

    /// Customer contact the event refers to.
    #[must_use]
    pub const fn customer(&self) -> &CustomerContact {
        match self {
            Self::ReservationCreated { customer, .. }
            | Self::ReservationApproved { customer, .. }
            | Self::ReservationVoided { customer, .. } => customer,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn contact() -> CustomerContact {
        CustomerContact {
            first_name: "Ana".to_string(),
            last_name: "Flores".to_string(),
            email: "ana@example.com".to_string(),
        }
    }

    #[test]
    fn event_type_strings_are_stable() {
        let voided = BookingEvent::ReservationVoided {
            reservation_id: 7,
            code: "RES-1234-ABCD".to_string(),
            customer: contact(),
            timestamp: Utc::now(),
        };
        assert_eq!(voided.event_type_str(), "reservation_voided");
        assert_eq!(voided.code(), "RES-1234-ABCD");
        assert_eq!(voided.customer().email, "ana@example.com");
    }

    #[test]
    fn serde_round_trip() {
        let event = BookingEvent::ReservationApproved {
            reservation_id: 3,
            code: "RES-9999-FFFF".to_string(),
            customer: contact(),
            event_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap_or_default(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        let back: Option<BookingEvent> = serde_json::from_str(&json).ok();
        let Some(back) = back else {
            panic!("deserialization failed");
        };
        assert_eq!(back.event_type_str(), "reservation_approved");
    }
}
