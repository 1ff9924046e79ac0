//! Reservation DTOs: direct booking, lookup, checkout, and transitions.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::persistence::models::{BankAccount, ReservationLine, SlotAvailability};
use crate::service::booking_service::ReservationDetail;

/// Request body for `POST /reservations`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectBookingRequest {
    /// Booking customer.
    pub customer_id: i64,
    /// Chosen time slot.
    pub slot_id: i64,
    /// Item kind: `"service"`, `"bundle"`, or `"promotion"`.
    pub kind: String,
    /// Catalog item id.
    pub item_id: i64,
    /// Delivery address for the event.
    pub event_address: String,
    /// Optional free-form notes.
    #[serde(default)]
    pub special_notes: Option<String>,
}

/// Response body for `POST /reservations` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateBookingResponse {
    /// New reservation id.
    pub reservation_id: i64,
    /// Public reservation code.
    pub code: String,
}

/// One available slot in `GET /slots`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotDto {
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
    /// Active reservations currently booked.
    pub booked: i64,
}

impl From<&SlotAvailability> for SlotDto {
    fn from(slot: &SlotAvailability) -> Self {
        Self {
            id: slot.id,
            slot_date: slot.slot_date,
            starts_at: slot.starts_at,
            ends_at: slot.ends_at,
            capacity: slot.capacity,
            booked: slot.booked,
        }
    }
}

/// One line snapshot in a reservation detail response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationLineDto {
    /// One-letter item kind code.
    pub kind: String,
    /// Item name frozen at confirmation.
    pub item_name: String,
    /// Units booked.
    pub quantity: i32,
    /// Frozen unit price.
    pub unit_price: Decimal,
    /// Frozen line subtotal.
    pub line_subtotal: Decimal,
}

impl From<&ReservationLine> for ReservationLineDto {
    fn from(line: &ReservationLine) -> Self {
        Self {
            kind: line.line_kind.clone(),
            item_name: line.item_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_subtotal: line.line_subtotal,
        }
    }
}

/// Response body for `GET /reservations/{code}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationDetailResponse {
    /// Reservation id.
    pub id: i64,
    /// Public code.
    pub code: String,
    /// Event date.
    pub event_date: NaiveDate,
    /// Event start time.
    pub starts_at: NaiveTime,
    /// Delivery address.
    pub event_address: String,
    /// Lifecycle state string.
    pub state: String,
    /// Pre-tax sum.
    pub subtotal: Decimal,
    /// Tax amount.
    pub tax: Decimal,
    /// Grand total.
    pub total: Decimal,
    /// Payment method, once chosen.
    pub payment_method: Option<String>,
    /// Line snapshots.
    pub lines: Vec<ReservationLineDto>,
}

impl From<&ReservationDetail> for ReservationDetailResponse {
    fn from(detail: &ReservationDetail) -> Self {
        Self {
            id: detail.reservation.id,
            code: detail.reservation.code.clone(),
            event_date: detail.reservation.event_date,
            starts_at: detail.reservation.starts_at,
            event_address: detail.reservation.event_address.clone(),
            state: detail.reservation.state.clone(),
            subtotal: detail.reservation.subtotal,
            tax: detail.reservation.tax,
            total: detail.reservation.total,
            payment_method: detail.reservation.payment_method.clone(),
            lines: detail.lines.iter().map(ReservationLineDto::from).collect(),
        }
    }
}

/// Request body for `POST /reservations/{id}/checkout`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Payment method: `"transfer"`, `"card"`, or `"cash"`.
    pub payment_method: String,
    /// Processor transaction id (card payments).
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Proof-of-payment URL (transfers).
    #[serde(default)]
    pub payment_proof_url: Option<String>,
}

/// A bank account offered to transfer payers.
#[derive(Debug, Serialize, ToSchema)]
pub struct BankAccountDto {
    /// Bank name.
    pub bank_name: String,
    /// Account holder.
    pub account_holder: String,
    /// Account number.
    pub account_number: String,
    /// Free-form payment instructions.
    pub instructions: Option<String>,
}

impl From<&BankAccount> for BankAccountDto {
    fn from(account: &BankAccount) -> Self {
        Self {
            bank_name: account.bank_name.clone(),
            account_holder: account.account_holder.clone(),
            account_number: account.account_number.clone(),
            instructions: account.instructions.clone(),
        }
    }
}

/// Response body for `POST /reservations/{id}/checkout`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    /// Method now on the reservation.
    pub payment_method: String,
    /// Current reservation state string.
    pub state: String,
    /// Active bank accounts; present only for transfers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bank_accounts: Vec<BankAccountDto>,
}

/// Request body for `POST /reservations/{id}/approve`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveRequest {
    /// Verified payment transaction id.
    pub transaction_id: String,
}

/// Response body for `POST /reservations/{id}/approve`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApproveResponse {
    /// `"approved"`, or `"already_approved"` for the idempotent no-op.
    pub status: String,
}
