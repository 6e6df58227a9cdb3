//! # Order Repository
//!
//! Persistence for the order aggregate.
//!
//! ## Guarded Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │           How Concurrent Transitions Stay Safe                          │
//! │                                                                         │
//! │  Two callers race to move the same PENDING order:                       │
//! │                                                                         │
//! │  Caller A: UPDATE orders SET status='CONFIRMED', ...                    │
//! │            WHERE id=? AND status='PENDING'    → 1 row, wins             │
//! │  Caller B: UPDATE orders SET status='CANCELLED', ...                    │
//! │            WHERE id=? AND status='PENDING'    → 0 rows, Conflict        │
//! │                                                                         │
//! │  The status predicate makes the read-decide-write cycle safe without    │
//! │  holding a transaction open across business logic.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line items and pricing are immutable after insert; only status, payment
//! state, timestamps, and the embedded transition records are updatable.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use bazaar_core::{
    CancellationInfo, Order, OrderItem, OrderPricing, OrderStats, OrderStatus, OrderTimestamps,
    PaymentStatus, TrackingInfo,
};

/// Flat row shape for the `orders` table. Address, tracking, and
/// cancellation columns hold JSON objects.
#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    user_id: String,
    customer_email: String,
    customer_name: String,
    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    currency: String,
    shipping_address: String,
    billing_address: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    confirmed_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    tracking: Option<String>,
    cancellation: Option<String>,
    payment_transaction_id: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// Assembles the aggregate from the flat row plus its line items.
    fn into_order(self, items: Vec<OrderItem>) -> DbResult<Order> {
        let tracking: Option<TrackingInfo> = self
            .tracking
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let cancellation: Option<CancellationInfo> = self
            .cancellation
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            items,
            pricing: OrderPricing {
                subtotal_cents: self.subtotal_cents,
                tax_cents: self.tax_cents,
                shipping_cents: self.shipping_cents,
                discount_cents: self.discount_cents,
                total_cents: self.total_cents,
                currency: self.currency,
            },
            shipping_address: serde_json::from_str(&self.shipping_address)?,
            billing_address: serde_json::from_str(&self.billing_address)?,
            status: self.status,
            payment_status: self.payment_status,
            timestamps: OrderTimestamps {
                confirmed: self.confirmed_at,
                processed: self.processed_at,
                shipped: self.shipped_at,
                delivered: self.delivered_at,
                cancelled: self.cancelled_at,
                completed: self.completed_at,
            },
            tracking,
            cancellation,
            payment_transaction_id: self.payment_transaction_id,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = r#"
    id, order_number, user_id, customer_email, customer_name,
    subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents, currency,
    shipping_address, billing_address, status, payment_status,
    confirmed_at, processed_at, shipped_at, delivered_at, cancelled_at, completed_at,
    tracking, cancellation, payment_transaction_id, notes, created_at, updated_at
"#;

/// Repository for order persistence.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a new order with its line items in one transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Order number already taken
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(
            id = %order.id,
            order_number = %order.order_number,
            items = order.items.len(),
            "Inserting order"
        );

        let shipping_address = serde_json::to_string(&order.shipping_address)?;
        let billing_address = serde_json::to_string(&order.billing_address)?;
        let tracking = order
            .tracking
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let cancellation = order
            .cancellation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, customer_email, customer_name,
                subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents, currency,
                shipping_address, billing_address, status, payment_status,
                confirmed_at, processed_at, shipped_at, delivered_at, cancelled_at, completed_at,
                tracking, cancellation, payment_transaction_id, notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21,
                ?22, ?23, ?24, ?25, ?26, ?27
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(&order.customer_email)
        .bind(&order.customer_name)
        .bind(order.pricing.subtotal_cents)
        .bind(order.pricing.tax_cents)
        .bind(order.pricing.shipping_cents)
        .bind(order.pricing.discount_cents)
        .bind(order.pricing.total_cents)
        .bind(&order.pricing.currency)
        .bind(shipping_address)
        .bind(billing_address)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.timestamps.confirmed)
        .bind(order.timestamps.processed)
        .bind(order.timestamps.shipped)
        .bind(order.timestamps.delivered)
        .bind(order.timestamps.cancelled)
        .bind(order.timestamps.completed)
        .bind(tracking)
        .bind(cancellation)
        .bind(&order.payment_transaction_id)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, position, product_id, name, description,
                    quantity, unit_price_cents, line_total_cents, seller_id, seller_name
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .bind(&item.seller_id)
            .bind(&item.seller_name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an order by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.items_for(&row.id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    /// Gets an order by its business number (e.g. ORD-000042).
    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.items_for(&row.id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    /// Lists a customer's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        self.assemble(rows).await
    }

    /// Lists orders containing at least one line item from a seller,
    /// newest first.
    pub async fn list_by_seller(&self, seller_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE id IN (SELECT DISTINCT order_id FROM order_items WHERE seller_id = ?1)
            ORDER BY created_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(seller_id)
            .fetch_all(&self.pool)
            .await?;

        self.assemble(rows).await
    }

    /// Finds orders stuck in a pre-shipment status since before the cutoff.
    /// Reaper input.
    pub async fn find_stale(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status IN ('PENDING', 'CONFIRMED', 'PROCESSING')
              AND created_at <= ?1
            ORDER BY created_at
            "#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        self.assemble(rows).await
    }

    /// Finds cancelled orders whose settlement (hold release and, when
    /// paid, restock) hasn't landed yet. Repair-sweep input.
    pub async fn find_unsettled(&self) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status = 'CANCELLED'
              AND json_extract(cancellation, '$.stock_restored') = 0
            ORDER BY created_at
            "#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        self.assemble(rows).await
    }

    /// Settles a cancelled order in one transaction: drops its holds,
    /// returns committed stock to the pool when the order was paid, and
    /// marks the cancellation record settled.
    ///
    /// Idempotent under retry: a prior successful settlement set the
    /// marker, and the repair sweep stops selecting the order. Line items
    /// whose product row has vanished are skipped; there is no stock left
    /// to return for them.
    pub async fn settle_cancellation(&self, order: &Order) -> DbResult<()> {
        let mut info = order
            .cancellation
            .clone()
            .ok_or_else(|| DbError::internal("cancelled order has no cancellation record"))?;
        info.stock_restored = true;
        let cancellation = serde_json::to_string(&info)?;

        debug!(
            id = %order.id,
            paid = order.payment_status == PaymentStatus::Paid,
            "Settling cancellation"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM reservations WHERE order_id = ?1")
            .bind(&order.id)
            .execute(&mut *tx)
            .await?;

        if order.payment_status == PaymentStatus::Paid {
            for item in &order.items {
                let result = sqlx::query(
                    "UPDATE products SET stock_count = stock_count + ?2, updated_at = ?3 WHERE id = ?1",
                )
                .bind(&item.product_id)
                .bind(item.quantity)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    warn!(
                        order_id = %order.id,
                        product_id = %item.product_id,
                        "Product missing during restock, skipping line"
                    );
                }
            }
        }

        let result = sqlx::query(
            "UPDATE orders SET cancellation = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'CANCELLED'",
        )
        .bind(&order.id)
        .bind(&cancellation)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::conflict(format!(
                "order {} is not cancelled",
                order.id
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Writes an order's mutable fields, guarded on its current status.
    ///
    /// The write only lands if the stored status still equals `expected`;
    /// a concurrent transition that got there first surfaces as Conflict.
    /// Line items and pricing are never updated.
    pub async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> DbResult<()> {
        debug!(
            id = %order.id,
            from = %expected,
            to = %order.status,
            "Applying guarded order update"
        );

        let tracking = order
            .tracking
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let cancellation = order
            .cancellation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?2,
                payment_status = ?3,
                confirmed_at = ?4,
                processed_at = ?5,
                shipped_at = ?6,
                delivered_at = ?7,
                cancelled_at = ?8,
                completed_at = ?9,
                tracking = ?10,
                cancellation = ?11,
                notes = ?12,
                updated_at = ?13
            WHERE id = ?1 AND status = ?14
            "#,
        )
        .bind(&order.id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.timestamps.confirmed)
        .bind(order.timestamps.processed)
        .bind(order.timestamps.shipped)
        .bind(order.timestamps.delivered)
        .bind(order.timestamps.cancelled)
        .bind(order.timestamps.completed)
        .bind(tracking)
        .bind(cancellation)
        .bind(&order.notes)
        .bind(order.updated_at)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "order {} is no longer {}",
                order.id, expected
            )));
        }

        Ok(())
    }

    /// Deletes an order and its items. Compensation path for failed
    /// checkouts only; committed orders are never deleted.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting order");

        sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Aggregates order counts by status plus revenue over non-cancelled
    /// orders.
    pub async fn stats(&self) -> DbResult<OrderStats> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(status = 'PENDING'), 0),
                COALESCE(SUM(status = 'CONFIRMED'), 0),
                COALESCE(SUM(status = 'PROCESSING'), 0),
                COALESCE(SUM(status = 'SHIPPED'), 0),
                COALESCE(SUM(status = 'DELIVERED'), 0),
                COALESCE(SUM(status = 'COMPLETED'), 0),
                COALESCE(SUM(status = 'CANCELLED'), 0),
                COALESCE(SUM(CASE WHEN status != 'CANCELLED' THEN total_cents ELSE 0 END), 0)
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderStats {
            total_orders: row.0,
            pending: row.1,
            confirmed: row.2,
            processing: row.3,
            shipped: row.4,
            delivered: row.5,
            completed: row.6,
            cancelled: row.7,
            total_revenue_cents: row.8,
        })
    }

    /// Loads the frozen line items for an order, in insert order.
    async fn items_for(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT product_id, name, description, quantity,
                   unit_price_cents, line_total_cents, seller_id, seller_name
            FROM order_items
            WHERE order_id = ?1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn assemble(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items_for(&row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }
}
