//! Reservation handlers: slots, direct booking, lookup, checkout, and
//! the admin approve/void/delete transitions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::dto::{
    ApproveRequest, ApproveResponse, BankAccountDto, CheckoutRequest, CheckoutResponse,
    CreateBookingResponse, DirectBookingRequest, ReservationDetailResponse, SlotDto,
};
use crate::app_state::AppState;
use crate::domain::{ItemKind, PaymentMethod};
use crate::error::{BookingError, ErrorResponse};
use crate::service::booking_service::ApprovalOutcome;

/// Query parameters for `GET /slots`.
#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    /// Date to list availability for (`YYYY-MM-DD`).
    pub date: NaiveDate,
}

/// `GET /slots` — List open slots with spare capacity on a date.
///
/// # Errors
///
/// Returns [`BookingError`] on repository failures.
#[utoipa::path(
    get,
    path = "/api/v1/slots",
    tag = "Bookings",
    summary = "List available slots",
    params(
        ("date" = String, Query, description = "Date to list availability for (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Slots with spare capacity", body = Vec<SlotDto>),
    )
)]
pub async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<SlotsQuery>,
) -> Result<impl IntoResponse, BookingError> {
    let slots = state.booking_service.available_slots(query.date).await?;
    let dtos: Vec<SlotDto> = slots.iter().map(SlotDto::from).collect();
    Ok(Json(dtos))
}

/// `POST /reservations` — Create a reservation directly from one item.
///
/// # Errors
///
/// Returns [`BookingError`] for an unknown slot/item or a taken date.
#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Bookings",
    summary = "Create a direct booking",
    description = "Creates a PENDING reservation for a single catalog item on an explicit slot, bypassing the cart.",
    request_body = DirectBookingRequest,
    responses(
        (status = 201, description = "Reservation created", body = CreateBookingResponse),
        (status = 404, description = "Slot or item not found", body = ErrorResponse),
        (status = 409, description = "Date already reserved", body = ErrorResponse),
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<DirectBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let kind = ItemKind::parse(&req.kind).ok_or(BookingError::InvalidItemKind(req.kind))?;
    let (reservation_id, code) = state
        .booking_service
        .direct_booking(
            req.customer_id,
            req.slot_id,
            kind,
            req.item_id,
            &req.event_address,
            req.special_notes.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            reservation_id,
            code,
        }),
    ))
}

/// `GET /reservations/code/{code}` — Fetch a reservation by its public
/// code.
///
/// # Errors
///
/// Returns [`BookingError::ReservationNotFound`] for an unknown code.
#[utoipa::path(
    get,
    path = "/api/v1/reservations/code/{code}",
    tag = "Bookings",
    summary = "Look up a reservation",
    params(
        ("code" = String, Path, description = "Public reservation code"),
    ),
    responses(
        (status = 200, description = "Reservation with line snapshots", body = ReservationDetailResponse),
        (status = 404, description = "Unknown code", body = ErrorResponse),
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    let detail = state.booking_service.lookup(&code).await?;
    Ok(Json(ReservationDetailResponse::from(&detail)))
}

/// `POST /reservations/{id}/checkout` — Choose a payment method.
///
/// # Errors
///
/// Returns [`BookingError`] for an unknown reservation or method.
#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/checkout",
    tag = "Bookings",
    summary = "Record the payment method",
    description = "Stores the chosen payment method. Transfers get the active bank accounts back; cards store the transaction id; cash clears both.",
    params(
        ("id" = i64, Path, description = "Reservation id"),
    ),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment method recorded", body = CheckoutResponse),
        (status = 400, description = "Invalid payment method", body = ErrorResponse),
        (status = 404, description = "Reservation not found", body = ErrorResponse),
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let method = PaymentMethod::parse(&req.payment_method)
        .ok_or(BookingError::InvalidPaymentMethod(req.payment_method))?;
    let summary = state
        .booking_service
        .checkout(
            id,
            method,
            req.transaction_id.as_deref(),
            req.payment_proof_url.as_deref(),
        )
        .await?;
    Ok(Json(CheckoutResponse {
        payment_method: summary.method.as_str().to_string(),
        state: summary.state,
        bank_accounts: summary.bank_accounts.iter().map(BankAccountDto::from).collect(),
    }))
}

/// `POST /reservations/{id}/approve` — Approve with a transaction id.
///
/// # Errors
///
/// Returns [`BookingError::DuplicateTransactionId`] when the id belongs
/// to another reservation, [`BookingError::InvalidTransition`] for
/// non-PENDING states.
#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/approve",
    tag = "Bookings",
    summary = "Approve a reservation",
    description = "Marks a PENDING reservation APPROVED with a verified payment transaction id. Re-approval is an idempotent no-op that sends no notification.",
    params(
        ("id" = i64, Path, description = "Reservation id"),
    ),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Approved (or already approved)", body = ApproveResponse),
        (status = 409, description = "Duplicate transaction id or bad state", body = ErrorResponse),
    )
)]
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ApproveRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let outcome = state
        .booking_service
        .approve(id, &req.transaction_id)
        .await?;
    let status = match outcome {
        ApprovalOutcome::Approved => "approved",
        ApprovalOutcome::AlreadyApproved => "already_approved",
    };
    Ok(Json(ApproveResponse {
        status: status.to_string(),
    }))
}

/// `POST /reservations/{id}/void` — Void a PENDING reservation.
///
/// # Errors
///
/// Returns [`BookingError::InvalidTransition`] for non-PENDING states.
#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/void",
    tag = "Bookings",
    summary = "Void a reservation",
    params(
        ("id" = i64, Path, description = "Reservation id"),
    ),
    responses(
        (status = 204, description = "Voided"),
        (status = 409, description = "Not voidable in its current state", body = ErrorResponse),
    )
)]
pub async fn void(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    state.booking_service.void(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /reservations/{id}` — Mark a reservation DELETED.
///
/// # Errors
///
/// Returns [`BookingError::InvalidTransition`] for states other than
/// PENDING or APPROVED.
#[utoipa::path(
    delete,
    path = "/api/v1/reservations/{id}",
    tag = "Bookings",
    summary = "Delete a reservation",
    params(
        ("id" = i64, Path, description = "Reservation id"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Not deletable in its current state", body = ErrorResponse),
    )
)]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    state.booking_service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Booking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/slots", get(list_slots))
        .route("/reservations", post(create_booking))
        .route("/reservations/code/{code}", get(get_reservation))
        .route("/reservations/{id}/checkout", post(checkout))
        .route("/reservations/{id}/approve", post(approve))
        .route("/reservations/{id}/void", post(void))
        .route("/reservations/{id}", delete(remove))
}
