//! PostgreSQL implementation of the repository seam.
//!
//! Every query goes through [`RoutedPools`], so the failover router
//! picks the replica per operation. `persist_reservation` is the one
//! multi-statement transaction: reservation, line snapshots, and the
//! cart clear commit or roll back together.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::models::{
    BankAccount, CartLine, CatalogItem, Customer, NewReservation, NewReservationLine, Reservation,
    ReservationLine, SlotAvailability, TimeSlot,
};
use super::repo::BookingRepo;
use crate::db::RoutedPools;
use crate::domain::{ItemKind, PaymentMethod, ReservationState};
use crate::error::BookingError;

/// Cart line columns with the joined item name, shared by every cart query.
const CART_LINE_SELECT: &str = "SELECT cl.id, cl.cart_id, cl.service_id, cl.bundle_id, \
     cl.promotion_id, COALESCE(s.name, b.name, p.name, '') AS item_name, cl.quantity, \
     cl.unit_price \
     FROM cart_lines cl \
     JOIN carts c ON c.id = cl.cart_id \
     LEFT JOIN services s ON s.id = cl.service_id \
     LEFT JOIN bundles b ON b.id = cl.bundle_id \
     LEFT JOIN promotions p ON p.id = cl.promotion_id";

/// PostgreSQL-backed [`BookingRepo`] over the routed pools.
#[derive(Debug, Clone)]
pub struct PgBookingRepo {
    pools: RoutedPools,
}

impl PgBookingRepo {
    /// Creates the repository.
    #[must_use]
    pub fn new(pools: RoutedPools) -> Self {
        Self { pools }
    }

    /// Foreign-key column for an item kind in the line tables.
    const fn item_column(kind: ItemKind) -> &'static str {
        match kind {
            ItemKind::Service => "service_id",
            ItemKind::Bundle => "bundle_id",
            ItemKind::Promotion => "promotion_id",
        }
    }
}

#[async_trait]
impl BookingRepo for PgBookingRepo {
    async fn customer(&self, customer_id: i64) -> Result<Customer, BookingError> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, first_name, last_name, email, phone, active FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .fetch_optional(self.pools.read().await)
        .await?
        .ok_or(BookingError::CustomerNotFound(customer_id))
    }

    async fn catalog_item(&self, kind: ItemKind, item_id: i64) -> Result<CatalogItem, BookingError> {
        let sql = match kind {
            ItemKind::Service => {
                "SELECT name, base_price FROM services WHERE id = $1 AND available"
            }
            ItemKind::Bundle => "SELECT name, price FROM bundles WHERE id = $1 AND active",
            ItemKind::Promotion => "SELECT name, price FROM promotions WHERE id = $1 AND active",
        };
        let row: Option<(String, Decimal)> = sqlx::query_as(sql)
            .bind(item_id)
            .fetch_optional(self.pools.read().await)
            .await?;
        row.map(|(name, unit_price)| CatalogItem { name, unit_price })
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
        let pool = self.pools.write().await;
        let mut tx = pool.begin().await?;

        let cart_id: i64 = sqlx::query_scalar(
            "INSERT INTO carts (customer_id) VALUES ($1) \
             ON CONFLICT (customer_id) DO UPDATE SET updated_at = now() \
             RETURNING id",
        )
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await?;

        let column = Self::item_column(kind);
        let existing: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM cart_lines WHERE cart_id = $1 AND {column} = $2"
        ))
        .bind(cart_id)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let line_id: i64 = match existing {
            Some(id) => {
                sqlx::query_scalar(
                    "UPDATE cart_lines SET quantity = quantity + $2, unit_price = $3 \
                     WHERE id = $1 RETURNING id",
                )
                .bind(id)
                .bind(quantity)
                .bind(unit_price)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_scalar(&format!(
                    "INSERT INTO cart_lines (cart_id, {column}, quantity, unit_price) \
                     VALUES ($1, $2, $3, $4) RETURNING id"
                ))
                .bind(cart_id)
                .bind(item_id)
                .bind(quantity)
                .bind(unit_price)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        let sql = format!("{CART_LINE_SELECT} WHERE cl.id = $1");
        Ok(sqlx::query_as::<_, CartLine>(&sql)
            .bind(line_id)
            .fetch_one(self.pools.read().await)
            .await?)
    }

    async fn cart_lines(&self, customer_id: i64) -> Result<Vec<CartLine>, BookingError> {
        let sql = format!("{CART_LINE_SELECT} WHERE c.customer_id = $1 ORDER BY cl.id");
        Ok(sqlx::query_as::<_, CartLine>(&sql)
            .bind(customer_id)
            .fetch_all(self.pools.read().await)
            .await?)
    }

    async fn slot_for_date(&self, date: NaiveDate) -> Result<Option<TimeSlot>, BookingError> {
        Ok(sqlx::query_as::<_, TimeSlot>(
            "SELECT id, slot_date, starts_at, ends_at, available, capacity \
             FROM time_slots WHERE slot_date = $1 AND available \
             ORDER BY starts_at LIMIT 1",
        )
        .bind(date)
        .fetch_optional(self.pools.read().await)
        .await?)
    }

    async fn slot(&self, slot_id: i64) -> Result<TimeSlot, BookingError> {
        sqlx::query_as::<_, TimeSlot>(
            "SELECT id, slot_date, starts_at, ends_at, available, capacity \
             FROM time_slots WHERE id = $1",
        )
        .bind(slot_id)
        .fetch_optional(self.pools.read().await)
        .await?
        .ok_or(BookingError::SlotNotFound(slot_id))
    }

    async fn open_slots(&self, date: NaiveDate) -> Result<Vec<SlotAvailability>, BookingError> {
        Ok(sqlx::query_as::<_, SlotAvailability>(
            "SELECT ts.id, ts.slot_date, ts.starts_at, ts.ends_at, ts.capacity, \
                    COUNT(r.id) FILTER (WHERE r.state IN ('PENDING','APPROVED')) AS booked \
             FROM time_slots ts \
             LEFT JOIN reservations r ON r.slot_id = ts.id \
             WHERE ts.slot_date = $1 AND ts.available \
             GROUP BY ts.id, ts.slot_date, ts.starts_at, ts.ends_at, ts.capacity \
             HAVING COUNT(r.id) FILTER (WHERE r.state IN ('PENDING','APPROVED')) < ts.capacity \
             ORDER BY ts.starts_at",
        )
        .bind(date)
        .fetch_all(self.pools.read().await)
        .await?)
    }

    async fn active_reservation_on(&self, date: NaiveDate) -> Result<bool, BookingError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reservations \
             WHERE event_date = $1 AND state IN ('PENDING','APPROVED'))",
        )
        .bind(date)
        .fetch_one(self.pools.read().await)
        .await?)
    }

    async fn persist_reservation(
        &self,
        reservation: &NewReservation,
        lines: &[NewReservationLine],
        empty_cart_for: Option<i64>,
    ) -> Result<i64, BookingError> {
        let pool = self.pools.write().await;
        let mut tx = pool.begin().await?;

        let reservation_id: i64 = sqlx::query_scalar(
            "INSERT INTO reservations (customer_id, slot_id, code, event_date, starts_at, \
             event_address, special_notes, subtotal, tax, total, state) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'PENDING') \
             RETURNING id",
        )
        .bind(reservation.customer_id)
        .bind(reservation.slot_id)
        .bind(&reservation.code)
        .bind(reservation.event_date)
        .bind(reservation.starts_at)
        .bind(&reservation.event_address)
        .bind(reservation.special_notes.as_deref())
        .bind(reservation.subtotal)
        .bind(reservation.tax)
        .bind(reservation.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_reservation_insert(e, reservation.event_date))?;

        for line in lines {
            sqlx::query(
                "INSERT INTO reservation_lines (reservation_id, line_kind, service_id, \
                 bundle_id, promotion_id, item_name, quantity, unit_price, line_subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(reservation_id)
            .bind(line.kind.db_code())
            .bind(line.service_id)
            .bind(line.bundle_id)
            .bind(line.promotion_id)
            .bind(&line.item_name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_subtotal)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(customer_id) = empty_cart_for {
            sqlx::query(
                "DELETE FROM cart_lines USING carts \
                 WHERE cart_lines.cart_id = carts.id AND carts.customer_id = $1",
            )
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(reservation_id)
    }

    async fn reservation(&self, reservation_id: i64) -> Result<Reservation, BookingError> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .fetch_optional(self.pools.read().await)
            .await?
            .ok_or_else(|| BookingError::ReservationNotFound(reservation_id.to_string()))
    }

    async fn reservation_by_code(&self, code: &str) -> Result<Reservation, BookingError> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE code = $1")
            .bind(code)
            .fetch_optional(self.pools.read().await)
            .await?
            .ok_or_else(|| BookingError::ReservationNotFound(code.to_string()))
    }

    async fn reservation_lines(
        &self,
        reservation_id: i64,
    ) -> Result<Vec<ReservationLine>, BookingError> {
        Ok(sqlx::query_as::<_, ReservationLine>(
            "SELECT id, reservation_id, line_kind, item_name, quantity, unit_price, \
             line_subtotal FROM reservation_lines WHERE reservation_id = $1 ORDER BY id",
        )
        .bind(reservation_id)
        .fetch_all(self.pools.read().await)
        .await?)
    }

    async fn transaction_id_taken(
        &self,
        transaction_id: &str,
        exclude: i64,
    ) -> Result<bool, BookingError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reservations \
             WHERE transaction_id = $1 AND id <> $2)",
        )
        .bind(transaction_id)
        .bind(exclude)
        .fetch_one(self.pools.read().await)
        .await?)
    }

    async fn mark_approved(
        &self,
        reservation_id: i64,
        transaction_id: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE reservations SET state = 'APPROVED', transaction_id = $2, \
             confirmed_at = $3 WHERE id = $1",
        )
        .bind(reservation_id)
        .bind(transaction_id)
        .bind(confirmed_at)
        .execute(self.pools.write().await)
        .await
        .map_err(|e| map_transaction_conflict(e, transaction_id))?;

        if result.rows_affected() == 0 {
            return Err(BookingError::ReservationNotFound(reservation_id.to_string()));
        }
        Ok(())
    }

    async fn set_state(
        &self,
        reservation_id: i64,
        state: ReservationState,
    ) -> Result<(), BookingError> {
        let result = sqlx::query("UPDATE reservations SET state = $2 WHERE id = $1")
            .bind(reservation_id)
            .bind(state.as_str())
            .execute(self.pools.write().await)
            .await?;
        if result.rows_affected() == 0 {
            return Err(BookingError::ReservationNotFound(reservation_id.to_string()));
        }
        Ok(())
    }

    async fn set_payment(
        &self,
        reservation_id: i64,
        method: PaymentMethod,
        proof_url: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE reservations SET payment_method = $2, payment_proof_url = $3, \
             transaction_id = $4 WHERE id = $1",
        )
        .bind(reservation_id)
        .bind(method.as_str())
        .bind(proof_url)
        .bind(transaction_id)
        .execute(self.pools.write().await)
        .await
        .map_err(|e| map_transaction_conflict(e, transaction_id.unwrap_or_default()))?;
        if result.rows_affected() == 0 {
            return Err(BookingError::ReservationNotFound(reservation_id.to_string()));
        }
        Ok(())
    }

    async fn active_bank_accounts(&self) -> Result<Vec<BankAccount>, BookingError> {
        Ok(sqlx::query_as::<_, BankAccount>(
            "SELECT id, bank_name, account_holder, account_number, instructions \
             FROM bank_accounts WHERE active ORDER BY id",
        )
        .fetch_all(self.pools.read().await)
        .await?)
    }
}

/// Maps unique violations on the reservation insert to typed conflicts.
fn map_reservation_insert(err: sqlx::Error, event_date: NaiveDate) -> BookingError {
    match constraint_name(&err) {
        Some("reservations_code_key") => BookingError::CodeCollision,
        Some("reservations_active_date_idx") => BookingError::DateAlreadyBooked(event_date),
        _ => err.into(),
    }
}

/// Maps a transaction-id unique violation to the anti-fraud conflict.
fn map_transaction_conflict(err: sqlx::Error, transaction_id: &str) -> BookingError {
    match constraint_name(&err) {
        Some("reservations_transaction_id_idx") => {
            BookingError::DuplicateTransactionId(transaction_id.to_string())
        }
        _ => err.into(),
    }
}

fn constraint_name(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) => db.constraint(),
        _ => None,
    }
}
