//! Cart handlers: add an item, view the cart, confirm into a reservation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    AddCartItemRequest, CartLineDto, CartViewResponse, ConfirmCartRequest, ConfirmCartResponse,
};
use crate::app_state::AppState;
use crate::domain::ItemKind;
use crate::error::{BookingError, ErrorResponse};

/// `POST /cart/items` — Add a catalog item to the customer's cart.
///
/// # Errors
///
/// Returns [`BookingError`] for an unknown kind, item, or customer.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    tag = "Cart",
    summary = "Add an item to the cart",
    description = "Adds the given quantity of a service, bundle, or promotion to the customer's cart, capturing the current unit price. Quantity accumulates on an existing line for the same item.",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Updated cart line", body = CartLineDto),
        (status = 400, description = "Invalid kind or quantity", body = ErrorResponse),
        (status = 404, description = "Customer or item not found", body = ErrorResponse),
    )
)]
pub async fn add_item(
    State(state): State<AppState>,
    Json(req): Json<AddCartItemRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let kind = ItemKind::parse(&req.kind).ok_or(BookingError::InvalidItemKind(req.kind))?;
    let line = state
        .cart_service
        .add_item(req.customer_id, kind, req.item_id, req.quantity)
        .await?;
    Ok(Json(CartLineDto::from(&line)))
}

/// `GET /cart/{customer_id}` — View the cart with a totals preview.
///
/// # Errors
///
/// Returns [`BookingError`] on repository failures.
#[utoipa::path(
    get,
    path = "/api/v1/cart/{customer_id}",
    tag = "Cart",
    summary = "View the cart",
    params(
        ("customer_id" = i64, Path, description = "Customer id"),
    ),
    responses(
        (status = 200, description = "Cart lines and totals", body = CartViewResponse),
    )
)]
pub async fn view_cart(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    let view = state.cart_service.view(customer_id).await?;
    Ok(Json(CartViewResponse::from(view)))
}

/// `POST /cart/confirm` — Convert the cart into a PENDING reservation.
///
/// # Errors
///
/// Returns [`BookingError`] for an empty cart, a date without an open
/// slot, or a date already claimed by an active reservation.
#[utoipa::path(
    post,
    path = "/api/v1/cart/confirm",
    tag = "Cart",
    summary = "Confirm the cart into a reservation",
    description = "Atomically creates a reservation with immutable line snapshots, empties the cart, and dispatches notification emails after commit.",
    request_body = ConfirmCartRequest,
    responses(
        (status = 201, description = "Reservation created", body = ConfirmCartResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 409, description = "Date already reserved", body = ErrorResponse),
    )
)]
pub async fn confirm_cart(
    State(state): State<AppState>,
    Json(req): Json<ConfirmCartRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let booking = state
        .cart_service
        .confirm_cart(
            req.customer_id,
            req.event_date,
            &req.event_address,
            req.special_notes.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ConfirmCartResponse {
            reservation_id: booking.reservation_id,
            code: booking.code,
        }),
    ))
}

/// Cart routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart/items", post(add_item))
        .route("/cart/{customer_id}", get(view_cart))
        .route("/cart/confirm", post(confirm_cart))
}
