//! Cart DTOs for add, view, and confirm operations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::money;
use crate::persistence::models::CartLine;
use crate::service::cart_service::CartView;

/// Request body for `POST /cart/items`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    /// Customer adding the item.
    pub customer_id: i64,
    /// Item kind: `"service"`, `"bundle"`, or `"promotion"`.
    pub kind: String,
    /// Catalog item id.
    pub item_id: i64,
    /// Units to add. Defaults to 1.
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// One cart line in API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineDto {
    /// Line id.
    pub id: i64,
    /// Item kind string.
    pub kind: String,
    /// Item name at read time.
    pub item_name: String,
    /// Units in the cart.
    pub quantity: i32,
    /// Captured unit price.
    pub unit_price: Decimal,
    /// `unit_price × quantity`.
    pub line_subtotal: Decimal,
}

impl From<&CartLine> for CartLineDto {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id,
            kind: line.kind().as_str().to_string(),
            item_name: line.item_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_subtotal: money::line_subtotal(line.unit_price, line.quantity),
        }
    }
}

/// Response body for `GET /cart`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartViewResponse {
    /// Lines in insertion order.
    pub lines: Vec<CartLineDto>,
    /// Pre-tax sum.
    pub subtotal: Decimal,
    /// Tax preview.
    pub tax: Decimal,
    /// Total preview.
    pub total: Decimal,
}

impl From<CartView> for CartViewResponse {
    fn from(view: CartView) -> Self {
        Self {
            lines: view.lines.iter().map(CartLineDto::from).collect(),
            subtotal: view.totals.subtotal,
            tax: view.totals.tax,
            total: view.totals.total,
        }
    }
}

/// Request body for `POST /cart/confirm`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmCartRequest {
    /// Customer whose cart is being confirmed.
    pub customer_id: i64,
    /// Requested event date (`YYYY-MM-DD`).
    pub event_date: NaiveDate,
    /// Delivery address for the event.
    pub event_address: String,
    /// Optional free-form notes.
    #[serde(default)]
    pub special_notes: Option<String>,
}

/// Response body for `POST /cart/confirm` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmCartResponse {
    /// New reservation id.
    pub reservation_id: i64,
    /// Public reservation code.
    pub code: String,
}
