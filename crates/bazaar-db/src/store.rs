//! # Store Trait
//!
//! The persistence seam between the engine and storage.
//!
//! ## Two Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Arc<dyn Store>                                        │
//! │                         │                                                │
//! │         ┌───────────────┴────────────────┐                              │
//! │         ▼                                ▼                              │
//! │   Database (SQLite)               MemoryStore (Mutex)                   │
//! │   production, WAL mode            tests, embedded use                   │
//! │                                                                         │
//! │  Both uphold the same contracts:                                        │
//! │  • reserve() is check-and-set atomic per product                        │
//! │  • update_order_if_status() is a compare-and-swap on status             │
//! │  • next_sequence() never returns the same value twice                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbResult;
use crate::pool::Database;
use bazaar_core::{
    Cart, Order, OrderStats, OrderStatus, Product, Reservation, ReservationKind, Seller,
};

/// Outcome of an atomic reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The caller now holds exactly the requested quantity.
    Reserved,
    /// Not enough unreserved stock to cover the increase.
    Insufficient { available: i64, requested: i64 },
}

/// Persistence operations required by the order engine.
///
/// Implementations must be safe to share across tasks; every method takes
/// `&self` and mutation relies on storage-level atomicity, not caller locks.
#[async_trait]
pub trait Store: Send + Sync {
    // --- carts ---

    async fn get_cart(&self, user_id: &str) -> DbResult<Option<Cart>>;
    async fn save_cart(&self, cart: &Cart) -> DbResult<()>;
    async fn clear_cart(&self, user_id: &str) -> DbResult<()>;

    // --- catalog ---

    async fn get_product(&self, id: &str) -> DbResult<Option<Product>>;
    async fn insert_product(&self, product: &Product) -> DbResult<()>;
    /// Decrements durable stock, floored at zero.
    async fn commit_stock(&self, product_id: &str, quantity: i64) -> DbResult<()>;
    /// Increments durable stock.
    async fn restore_stock(&self, product_id: &str, quantity: i64) -> DbResult<()>;

    // --- sellers ---

    async fn get_seller(&self, id: &str) -> DbResult<Option<Seller>>;
    async fn get_seller_by_email(&self, email: &str) -> DbResult<Option<Seller>>;
    async fn insert_seller(&self, seller: &Seller) -> DbResult<()>;

    // --- reservations ---

    /// Atomically sets the caller's hold to an absolute quantity, after
    /// checking that the increase fits within unreserved stock.
    async fn reserve(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        kind: ReservationKind,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<ReserveOutcome>;

    /// Effective availability: max(stock − active holds, 0).
    async fn available_stock(&self, product_id: &str, now: DateTime<Utc>) -> DbResult<i64>;

    async fn get_reservation(
        &self,
        user_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Reservation>>;

    async fn release_reservation(&self, user_id: &str, product_id: &str) -> DbResult<()>;

    /// Releases every hold attached to an order. Returns the count removed.
    async fn release_order_reservations(&self, order_id: &str) -> DbResult<u64>;

    /// Retags cart holds as order holds (clears TTL, attaches the order id).
    /// All-or-nothing across the given products.
    async fn promote_reservations(
        &self,
        user_id: &str,
        product_ids: &[String],
        order_id: &str,
    ) -> DbResult<()>;

    // --- orders ---

    async fn insert_order(&self, order: &Order) -> DbResult<()>;
    async fn get_order(&self, id: &str) -> DbResult<Option<Order>>;
    async fn get_order_by_number(&self, order_number: &str) -> DbResult<Option<Order>>;
    async fn list_orders_by_user(&self, user_id: &str) -> DbResult<Vec<Order>>;
    async fn list_orders_by_seller(&self, seller_id: &str) -> DbResult<Vec<Order>>;
    /// Orders still in a pre-shipment status created at or before the cutoff.
    async fn find_stale_orders(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Order>>;
    /// Cancelled orders whose hold release / restock hasn't landed yet.
    async fn find_unsettled_cancellations(&self) -> DbResult<Vec<Order>>;
    /// Atomically drops a cancelled order's holds, restocks its lines if
    /// the order was paid, and marks the cancellation settled.
    async fn settle_cancelled_order(&self, order: &Order) -> DbResult<()>;
    /// Compare-and-swap on status; Conflict when the guard misses.
    async fn update_order_if_status(&self, order: &Order, expected: OrderStatus) -> DbResult<()>;
    /// Compensation path for failed checkouts only.
    async fn delete_order(&self, id: &str) -> DbResult<()>;
    async fn order_stats(&self) -> DbResult<OrderStats>;

    // --- sequences ---

    /// Next value of a named monotonic counter (starts at 1).
    async fn next_sequence(&self, domain: &str) -> DbResult<i64>;
}

#[async_trait]
impl Store for Database {
    async fn get_cart(&self, user_id: &str) -> DbResult<Option<Cart>> {
        self.carts().get(user_id).await
    }

    async fn save_cart(&self, cart: &Cart) -> DbResult<()> {
        self.carts().save(cart).await
    }

    async fn clear_cart(&self, user_id: &str) -> DbResult<()> {
        self.carts().clear(user_id).await
    }

    async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        self.products().get_by_id(id).await
    }

    async fn insert_product(&self, product: &Product) -> DbResult<()> {
        self.products().insert(product).await
    }

    async fn commit_stock(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        self.products().commit_stock(product_id, quantity).await
    }

    async fn restore_stock(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        self.products().restore_stock(product_id, quantity).await
    }

    async fn get_seller(&self, id: &str) -> DbResult<Option<Seller>> {
        self.sellers().get_by_id(id).await
    }

    async fn get_seller_by_email(&self, email: &str) -> DbResult<Option<Seller>> {
        self.sellers().get_by_email(email).await
    }

    async fn insert_seller(&self, seller: &Seller) -> DbResult<()> {
        self.sellers().insert(seller).await
    }

    async fn reserve(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        kind: ReservationKind,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<ReserveOutcome> {
        self.reservations()
            .reserve(user_id, product_id, quantity, kind, expires_at)
            .await
    }

    async fn available_stock(&self, product_id: &str, now: DateTime<Utc>) -> DbResult<i64> {
        self.reservations().available_stock(product_id, now).await
    }

    async fn get_reservation(
        &self,
        user_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Reservation>> {
        self.reservations().get(user_id, product_id, now).await
    }

    async fn release_reservation(&self, user_id: &str, product_id: &str) -> DbResult<()> {
        self.reservations().release(user_id, product_id).await
    }

    async fn release_order_reservations(&self, order_id: &str) -> DbResult<u64> {
        self.reservations().release_all_for_order(order_id).await
    }

    async fn promote_reservations(
        &self,
        user_id: &str,
        product_ids: &[String],
        order_id: &str,
    ) -> DbResult<()> {
        self.reservations()
            .promote_to_order(user_id, product_ids, order_id)
            .await
    }

    async fn insert_order(&self, order: &Order) -> DbResult<()> {
        self.orders().insert(order).await
    }

    async fn get_order(&self, id: &str) -> DbResult<Option<Order>> {
        self.orders().get_by_id(id).await
    }

    async fn get_order_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        self.orders().get_by_number(order_number).await
    }

    async fn list_orders_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        self.orders().list_by_user(user_id).await
    }

    async fn list_orders_by_seller(&self, seller_id: &str) -> DbResult<Vec<Order>> {
        self.orders().list_by_seller(seller_id).await
    }

    async fn find_stale_orders(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Order>> {
        self.orders().find_stale(cutoff).await
    }

    async fn find_unsettled_cancellations(&self) -> DbResult<Vec<Order>> {
        self.orders().find_unsettled().await
    }

    async fn settle_cancelled_order(&self, order: &Order) -> DbResult<()> {
        self.orders().settle_cancellation(order).await
    }

    async fn update_order_if_status(&self, order: &Order, expected: OrderStatus) -> DbResult<()> {
        self.orders().update_if_status(order, expected).await
    }

    async fn delete_order(&self, id: &str) -> DbResult<()> {
        self.orders().delete(id).await
    }

    async fn order_stats(&self) -> DbResult<OrderStats> {
        self.orders().stats().await
    }

    async fn next_sequence(&self, domain: &str) -> DbResult<i64> {
        self.sequences().next(domain).await
    }
}

// =============================================================================
// Integration Tests (SQLite-backed)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::DbConfig;
    use bazaar_core::{
        Address, CartItem, OrderItem, OrderPricing, OrderTimestamps, PaymentStatus,
    };
    use chrono::Duration;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn seller() -> Seller {
        Seller {
            id: "s1".to_string(),
            company_name: "Widget Co".to_string(),
            contact_email: "sales@widget.example".to_string(),
        }
    }

    fn product(id: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: "Widget".to_string(),
            description: Some("A widget".to_string()),
            price_cents: 2000,
            discount_bps: 0,
            stock_count: stock,
            seller_id: "s1".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn address() -> Address {
        Address {
            street: "1 Market St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62704".to_string(),
            country: "US".to_string(),
        }
    }

    fn order(id: &str, number: &str) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            order_number: number.to_string(),
            user_id: "u1".to_string(),
            customer_email: "jo@example.com".to_string(),
            customer_name: "Jo Customer".to_string(),
            items: vec![OrderItem {
                product_id: "p1".to_string(),
                name: "Widget".to_string(),
                description: Some("A widget".to_string()),
                quantity: 3,
                unit_price_cents: 2000,
                line_total_cents: 6000,
                seller_id: "s1".to_string(),
                seller_name: "Widget Co".to_string(),
            }],
            pricing: OrderPricing {
                subtotal_cents: 6000,
                tax_cents: 600,
                shipping_cents: 0,
                discount_cents: 0,
                total_cents: 6600,
                currency: "USD".to_string(),
            },
            shipping_address: address(),
            billing_address: address(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            timestamps: OrderTimestamps::default(),
            tracking: None,
            cancellation: None,
            payment_transaction_id: "txn_12345678".to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_order_round_trip() {
        let db = db().await;
        db.insert_seller(&seller()).await.unwrap();
        db.insert_product(&product("p1", 10)).await.unwrap();

        db.insert_order(&order("o1", "ORD-000001")).await.unwrap();

        let loaded = db.get_order("o1").await.unwrap().unwrap();
        assert_eq!(loaded.order_number, "ORD-000001");
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].line_total_cents, 6000);
        assert_eq!(loaded.pricing.total_cents, 6600);
        assert_eq!(loaded.shipping_address.city, "Springfield");

        let by_number = db.get_order_by_number("ORD-000001").await.unwrap().unwrap();
        assert_eq!(by_number.id, "o1");
    }

    #[tokio::test]
    async fn test_duplicate_order_number_rejected() {
        let db = db().await;
        db.insert_order(&order("o1", "ORD-000001")).await.unwrap();

        let err = db.insert_order(&order("o2", "ORD-000001")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_guarded_update_misses_on_stale_status() {
        let db = db().await;
        db.insert_order(&order("o1", "ORD-000001")).await.unwrap();

        let mut confirmed = order("o1", "ORD-000001");
        confirmed.status = OrderStatus::Confirmed;
        confirmed.payment_status = PaymentStatus::Paid;
        confirmed.timestamps.confirmed = Some(Utc::now());

        db.update_order_if_status(&confirmed, OrderStatus::Pending)
            .await
            .unwrap();

        // Second writer still thinks the order is PENDING.
        let mut cancelled = order("o1", "ORD-000001");
        cancelled.status = OrderStatus::Cancelled;
        let err = db
            .update_order_if_status(&cancelled, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let stored = db.get_order("o1").await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_reserve_and_availability_sql() {
        let db = db().await;
        db.insert_seller(&seller()).await.unwrap();
        db.insert_product(&product("p1", 10)).await.unwrap();

        let now = Utc::now();
        let expiry = Some(now + Duration::minutes(30));

        let outcome = db
            .reserve("u1", "p1", 4, ReservationKind::Cart, expiry)
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Reserved);
        assert_eq!(db.available_stock("p1", now).await.unwrap(), 6);

        // Second shopper can't take more than what's left.
        let outcome = db
            .reserve("u2", "p1", 7, ReservationKind::Cart, expiry)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReserveOutcome::Insufficient {
                available: 6,
                requested: 7
            }
        );

        // Durable stock never moved.
        assert_eq!(db.get_product("p1").await.unwrap().unwrap().stock_count, 10);
    }

    #[tokio::test]
    async fn test_expired_cart_hold_is_purged_on_reserve() {
        let db = db().await;
        db.insert_seller(&seller()).await.unwrap();
        db.insert_product(&product("p1", 5)).await.unwrap();

        let now = Utc::now();
        db.reserve("u1", "p1", 5, ReservationKind::Cart, Some(now - Duration::seconds(1)))
            .await
            .unwrap();

        // The stale hold no longer blocks a new shopper.
        let outcome = db
            .reserve("u2", "p1", 5, ReservationKind::Cart, Some(now + Duration::minutes(30)))
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Reserved);
    }

    #[tokio::test]
    async fn test_promote_and_release_for_order() {
        let db = db().await;
        db.insert_seller(&seller()).await.unwrap();
        db.insert_product(&product("p1", 5)).await.unwrap();

        let now = Utc::now();
        db.reserve("u1", "p1", 2, ReservationKind::Cart, Some(now + Duration::minutes(30)))
            .await
            .unwrap();

        db.promote_reservations("u1", &["p1".to_string()], "o1")
            .await
            .unwrap();

        let held = db.get_reservation("u1", "p1", now).await.unwrap().unwrap();
        assert_eq!(held.kind, ReservationKind::Order);
        assert_eq!(held.order_id.as_deref(), Some("o1"));
        assert!(held.expires_at.is_none());

        assert_eq!(db.release_order_reservations("o1").await.unwrap(), 1);
        assert!(db.get_reservation("u1", "p1", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cart_round_trip() {
        let db = db().await;
        let now = Utc::now();

        let mut cart = Cart::new("u1", now);
        cart.items.push(CartItem {
            product_id: "p1".to_string(),
            name: "Widget".to_string(),
            description: None,
            quantity: 2,
            unit_price_cents: 2000,
        });

        db.save_cart(&cart).await.unwrap();
        let loaded = db.get_cart("u1").await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].quantity, 2);

        db.clear_cart("u1").await.unwrap();
        assert!(db.get_cart("u1").await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_stale_orders() {
        let db = db().await;

        let mut old = order("o1", "ORD-000001");
        old.created_at = Utc::now() - Duration::hours(2);
        db.insert_order(&old).await.unwrap();

        let fresh = order("o2", "ORD-000002");
        db.insert_order(&fresh).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(1);
        let stale = db.find_stale_orders(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "o1");
    }

    #[tokio::test]
    async fn test_stats_exclude_cancelled_revenue() {
        let db = db().await;

        db.insert_order(&order("o1", "ORD-000001")).await.unwrap();

        let mut cancelled = order("o2", "ORD-000002");
        cancelled.status = OrderStatus::Cancelled;
        db.insert_order(&cancelled).await.unwrap();

        let stats = db.order_stats().await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total_revenue_cents, 6600);
    }

    #[tokio::test]
    async fn test_sequence_allocation_sql() {
        let db = db().await;
        assert_eq!(db.next_sequence("ORDER").await.unwrap(), 1);
        assert_eq!(db.next_sequence("ORDER").await.unwrap(), 2);
    }
}
