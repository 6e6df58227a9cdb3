//! # Reservation Repository
//!
//! Atomic stock holds keyed by (user_id, product_id).
//!
//! ## The Availability Equation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   available = max(stock_count − Σ active reservation quantities, 0)     │
//! │                                                                         │
//! │   A reservation is active when expires_at IS NULL (order holds) or      │
//! │   expires_at is in the future (cart holds).                             │
//! │                                                                         │
//! │   reserve() runs check-and-upsert inside one transaction so two         │
//! │   shoppers can never both hold the last unit:                           │
//! │                                                                         │
//! │     BEGIN                                                               │
//! │       purge expired holds for the product                               │
//! │       read stock_count + active holds + caller's current hold           │
//! │       additional_needed = requested − current hold                      │
//! │       additional_needed > available? → Insufficient, ROLLBACK           │
//! │       upsert hold to the requested quantity                             │
//! │     COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::ReserveOutcome;
use bazaar_core::{Reservation, ReservationKind};

/// Repository for reservation operations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReservationRepository { pool }
    }

    /// Computes effective availability for a product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn available_stock(&self, product_id: &str, now: DateTime<Utc>) -> DbResult<i64> {
        let available: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(p.stock_count - COALESCE((
                SELECT SUM(r.quantity) FROM reservations r
                WHERE r.product_id = p.id
                  AND (r.expires_at IS NULL OR r.expires_at > ?2)
            ), 0), 0)
            FROM products p
            WHERE p.id = ?1
            "#,
        )
        .bind(product_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        available.ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Atomically reserves `quantity` units for a user.
    ///
    /// The requested quantity is absolute, not a delta: a caller holding 2
    /// who asks for 5 only needs 3 more units of availability. The caller's
    /// existing hold is replaced wholesale on success.
    pub async fn reserve(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        kind: ReservationKind,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<ReserveOutcome> {
        debug!(
            user_id = %user_id,
            product_id = %product_id,
            quantity = %quantity,
            "Reserving stock"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Purge expired holds so they stop counting against availability.
        sqlx::query(
            "DELETE FROM reservations WHERE product_id = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
        )
        .bind(product_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock_count FROM products WHERE id = ?1 AND is_active = 1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;

        let stock = stock.ok_or_else(|| DbError::not_found("Product", product_id))?;

        let reserved: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM reservations WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let current_hold: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM reservations WHERE user_id = ?1 AND product_id = ?2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let available = (stock - reserved).max(0);
        let additional_needed = quantity - current_hold;

        if additional_needed > available {
            tx.rollback().await?;
            return Ok(ReserveOutcome::Insufficient {
                available,
                requested: quantity,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO reservations (user_id, product_id, quantity, kind, order_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)
            ON CONFLICT(user_id, product_id) DO UPDATE SET
                quantity = excluded.quantity,
                kind = excluded.kind,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(kind)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReserveOutcome::Reserved)
    }

    /// Gets a user's active hold on a product, if any.
    pub async fn get(
        &self,
        user_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT user_id, product_id, quantity, kind, order_id, created_at, expires_at
            FROM reservations
            WHERE user_id = ?1 AND product_id = ?2
              AND (expires_at IS NULL OR expires_at > ?3)
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    /// Releases a user's hold on a product. No-op if absent.
    pub async fn release(&self, user_id: &str, product_id: &str) -> DbResult<()> {
        debug!(user_id = %user_id, product_id = %product_id, "Releasing reservation");

        sqlx::query("DELETE FROM reservations WHERE user_id = ?1 AND product_id = ?2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Releases every hold attached to an order. Returns the count removed.
    pub async fn release_all_for_order(&self, order_id: &str) -> DbResult<u64> {
        debug!(order_id = %order_id, "Releasing order reservations");

        let result = sqlx::query("DELETE FROM reservations WHERE order_id = ?1")
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Retags a user's cart holds as order holds: clears the TTL and
    /// attaches the order id. All-or-nothing across the given products.
    ///
    /// ## Returns
    /// * `Err(DbError::Conflict)` - A hold expired or vanished mid-checkout
    pub async fn promote_to_order(
        &self,
        user_id: &str,
        product_ids: &[String],
        order_id: &str,
    ) -> DbResult<()> {
        debug!(
            user_id = %user_id,
            order_id = %order_id,
            products = product_ids.len(),
            "Promoting cart reservations"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for product_id in product_ids {
            let result = sqlx::query(
                r#"
                UPDATE reservations
                SET kind = 'ORDER', expires_at = NULL, order_id = ?3
                WHERE user_id = ?1 AND product_id = ?2
                  AND (expires_at IS NULL OR expires_at > ?4)
                "#,
            )
            .bind(user_id)
            .bind(product_id)
            .bind(order_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(DbError::conflict(format!(
                    "reservation for product {product_id} expired during checkout"
                )));
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
