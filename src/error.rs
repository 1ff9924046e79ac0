//! Booking error types with HTTP status code mapping.
//!
//! [`BookingError`] is the central error type for the service. Each
//! variant maps to a numeric code and an HTTP status, and renders as a
//! structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::ReservationState;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "date 2025-12-01 is already reserved",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`BookingError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                |
/// |-----------|---------------------|----------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request            |
/// | 2000–2099 | Not Found           | 404 Not Found              |
/// | 2100–2199 | Conflict            | 409 Conflict               |
/// | 3000–3999 | Server              | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The cart has no lines to confirm.
    #[error("cart is empty")]
    EmptyCart,

    /// Unknown catalog item kind string.
    #[error("invalid item kind: {0}")]
    InvalidItemKind(String),

    /// Unknown payment method string.
    #[error("invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// No open time slot exists for the requested date.
    #[error("no availability open for {0}")]
    NoSlotForDate(NaiveDate),

    /// Customer with the given id was not found.
    #[error("customer not found: {0}")]
    CustomerNotFound(i64),

    /// Catalog item was not found or is inactive.
    #[error("{kind} not found: {id}")]
    ItemNotFound {
        /// Item kind looked up.
        kind: crate::domain::ItemKind,
        /// Requested id.
        id: i64,
    },

    /// Reservation with the given id or code was not found.
    #[error("reservation not found: {0}")]
    ReservationNotFound(String),

    /// Time slot with the given id was not found or is closed.
    #[error("time slot not found: {0}")]
    SlotNotFound(i64),

    /// Another active reservation already claims the date.
    #[error("date {0} is already reserved")]
    DateAlreadyBooked(NaiveDate),

    /// The payment transaction id belongs to a different reservation.
    #[error("transaction id {0} is already used by another reservation")]
    DuplicateTransactionId(String),

    /// The requested lifecycle transition is not allowed.
    #[error("cannot {action} a {from} reservation")]
    InvalidTransition {
        /// Current state.
        from: ReservationState,
        /// Attempted action.
        action: &'static str,
    },

    /// A generated reservation code collided with an existing one.
    #[error("reservation code collision")]
    CodeCollision,

    /// Database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::EmptyCart => 1002,
            Self::InvalidItemKind(_) => 1003,
            Self::InvalidPaymentMethod(_) => 1004,
            Self::NoSlotForDate(_) => 1005,
            Self::CustomerNotFound(_) => 2001,
            Self::ItemNotFound { .. } => 2002,
            Self::ReservationNotFound(_) => 2003,
            Self::SlotNotFound(_) => 2004,
            Self::DateAlreadyBooked(_) => 2101,
            Self::DuplicateTransactionId(_) => 2102,
            Self::InvalidTransition { .. } => 2103,
            Self::CodeCollision => 2104,
            Self::Internal(_) => 3000,
            Self::Database(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::EmptyCart
            | Self::InvalidItemKind(_)
            | Self::InvalidPaymentMethod(_)
            | Self::NoSlotForDate(_) => StatusCode::BAD_REQUEST,
            Self::CustomerNotFound(_)
            | Self::ItemNotFound { .. }
            | Self::ReservationNotFound(_)
            | Self::SlotNotFound(_) => StatusCode::NOT_FOUND,
            Self::DateAlreadyBooked(_)
            | Self::DuplicateTransactionId(_)
            | Self::InvalidTransition { .. }
            | Self::CodeCollision => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_request() {
        assert_eq!(BookingError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            BookingError::InvalidPaymentMethod("crypto".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn conflicts_map_to_409() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap_or_default();
        assert_eq!(
            BookingError::DateAlreadyBooked(date).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BookingError::DuplicateTransactionId("TX-1".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BookingError::InvalidTransition {
                from: ReservationState::Voided,
                action: "approve",
            }
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn error_codes_are_unique() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap_or_default();
        let errors = [
            BookingError::InvalidRequest(String::new()),
            BookingError::EmptyCart,
            BookingError::InvalidItemKind(String::new()),
            BookingError::InvalidPaymentMethod(String::new()),
            BookingError::NoSlotForDate(date),
            BookingError::CustomerNotFound(1),
            BookingError::ItemNotFound {
                kind: crate::domain::ItemKind::Service,
                id: 1,
            },
            BookingError::ReservationNotFound(String::new()),
            BookingError::SlotNotFound(1),
            BookingError::DateAlreadyBooked(date),
            BookingError::DuplicateTransactionId(String::new()),
            BookingError::InvalidTransition {
                from: ReservationState::Pending,
                action: "approve",
            },
            BookingError::CodeCollision,
            BookingError::Database(String::new()),
            BookingError::Internal(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(BookingError::error_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn sqlx_errors_become_database_errors() {
        let err: BookingError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, BookingError::Database(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
