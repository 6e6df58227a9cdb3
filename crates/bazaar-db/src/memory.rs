//! # In-Memory Store
//!
//! A full [`Store`] implementation backed by a single mutex-guarded state.
//! Used by engine tests and embedded callers that don't want SQLite.
//!
//! ## Concurrency Model
//! One coarse lock covers all state, so every operation is trivially
//! atomic - including reserve's check-and-upsert and the guarded order
//! update. This matches the transactional guarantees of the SQLite
//! implementation, just with less parallelism.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DbError, DbResult};
use crate::store::{ReserveOutcome, Store};
use bazaar_core::{
    Cart, Order, OrderStats, OrderStatus, PaymentStatus, Product, Reservation, ReservationKind,
    Seller,
};

#[derive(Debug, Default)]
struct State {
    carts: HashMap<String, Cart>,
    products: HashMap<String, Product>,
    sellers: HashMap<String, Seller>,
    // keyed by (user_id, product_id)
    reservations: HashMap<(String, String), Reservation>,
    orders: HashMap<String, Order>,
    counters: HashMap<String, i64>,
}

impl State {
    /// Active reservation total for a product as of `now`.
    fn reserved_for(&self, product_id: &str, now: DateTime<Utc>) -> i64 {
        self.reservations
            .values()
            .filter(|r| r.product_id == product_id && !r.is_expired(now))
            .map(|r| r.quantity)
            .sum()
    }
}

/// Mutex-guarded in-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| DbError::internal("memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_cart(&self, user_id: &str) -> DbResult<Option<Cart>> {
        Ok(self.lock()?.carts.get(user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> DbResult<()> {
        self.lock()?
            .carts
            .insert(cart.user_id.clone(), cart.clone());
        Ok(())
    }

    async fn clear_cart(&self, user_id: &str) -> DbResult<()> {
        if let Some(cart) = self.lock()?.carts.get_mut(user_id) {
            cart.items.clear();
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        Ok(self.lock()?.products.get(id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> DbResult<()> {
        let mut state = self.lock()?;
        if !state.sellers.contains_key(&product.seller_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("seller {} does not exist", product.seller_id),
            });
        }
        state.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn commit_stock(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        let mut state = self.lock()?;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        product.stock_count = (product.stock_count - quantity).max(0);
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn restore_stock(&self, product_id: &str, quantity: i64) -> DbResult<()> {
        let mut state = self.lock()?;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        product.stock_count += quantity;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn get_seller(&self, id: &str) -> DbResult<Option<Seller>> {
        Ok(self.lock()?.sellers.get(id).cloned())
    }

    async fn get_seller_by_email(&self, email: &str) -> DbResult<Option<Seller>> {
        Ok(self
            .lock()?
            .sellers
            .values()
            .find(|s| s.contact_email == email)
            .cloned())
    }

    async fn insert_seller(&self, seller: &Seller) -> DbResult<()> {
        let mut state = self.lock()?;
        if state
            .sellers
            .values()
            .any(|s| s.contact_email == seller.contact_email)
        {
            return Err(DbError::UniqueViolation {
                field: "sellers.contact_email".to_string(),
                value: seller.contact_email.clone(),
            });
        }
        state.sellers.insert(seller.id.clone(), seller.clone());
        Ok(())
    }

    async fn reserve(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        kind: ReservationKind,
        expires_at: Option<DateTime<Utc>>,
    ) -> DbResult<ReserveOutcome> {
        let now = Utc::now();
        let mut state = self.lock()?;

        state
            .reservations
            .retain(|_, r| !(r.product_id == product_id && r.is_expired(now)));

        let product = state
            .products
            .get(product_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        let stock = product.stock_count;

        let reserved = state.reserved_for(product_id, now);
        let key = (user_id.to_string(), product_id.to_string());
        let current_hold = state.reservations.get(&key).map_or(0, |r| r.quantity);

        let available = (stock - reserved).max(0);
        let additional_needed = quantity - current_hold;

        if additional_needed > available {
            return Ok(ReserveOutcome::Insufficient {
                available,
                requested: quantity,
            });
        }

        state.reservations.insert(
            key,
            Reservation {
                user_id: user_id.to_string(),
                product_id: product_id.to_string(),
                quantity,
                kind,
                order_id: None,
                created_at: now,
                expires_at,
            },
        );

        Ok(ReserveOutcome::Reserved)
    }

    async fn available_stock(&self, product_id: &str, now: DateTime<Utc>) -> DbResult<i64> {
        let state = self.lock()?;
        let product = state
            .products
            .get(product_id)
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        Ok((product.stock_count - state.reserved_for(product_id, now)).max(0))
    }

    async fn get_reservation(
        &self,
        user_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Reservation>> {
        let key = (user_id.to_string(), product_id.to_string());
        Ok(self
            .lock()?
            .reservations
            .get(&key)
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn release_reservation(&self, user_id: &str, product_id: &str) -> DbResult<()> {
        let key = (user_id.to_string(), product_id.to_string());
        self.lock()?.reservations.remove(&key);
        Ok(())
    }

    async fn release_order_reservations(&self, order_id: &str) -> DbResult<u64> {
        let mut state = self.lock()?;
        let before = state.reservations.len();
        state
            .reservations
            .retain(|_, r| r.order_id.as_deref() != Some(order_id));
        Ok((before - state.reservations.len()) as u64)
    }

    async fn promote_reservations(
        &self,
        user_id: &str,
        product_ids: &[String],
        order_id: &str,
    ) -> DbResult<()> {
        let now = Utc::now();
        let mut state = self.lock()?;

        // All-or-nothing: verify every hold is still live before retagging.
        for product_id in product_ids {
            let key = (user_id.to_string(), product_id.clone());
            match state.reservations.get(&key) {
                Some(r) if !r.is_expired(now) => {}
                _ => {
                    return Err(DbError::conflict(format!(
                        "reservation for product {product_id} expired during checkout"
                    )))
                }
            }
        }

        for product_id in product_ids {
            let key = (user_id.to_string(), product_id.clone());
            if let Some(r) = state.reservations.get_mut(&key) {
                r.kind = ReservationKind::Order;
                r.expires_at = None;
                r.order_id = Some(order_id.to_string());
            }
        }

        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> DbResult<()> {
        let mut state = self.lock()?;
        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(DbError::UniqueViolation {
                field: "orders.order_number".to_string(),
                value: order.order_number.clone(),
            });
        }
        state.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, id: &str) -> DbResult<Option<Order>> {
        Ok(self.lock()?.orders.get(id).cloned())
    }

    async fn get_order_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        Ok(self
            .lock()?
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_orders_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .lock()?
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders_by_seller(&self, seller_id: &str) -> DbResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .lock()?
            .orders
            .values()
            .filter(|o| o.has_seller(seller_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_stale_orders(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .lock()?
            .orders
            .values()
            .filter(|o| {
                matches!(
                    o.status,
                    OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
                ) && o.created_at <= cutoff
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn find_unsettled_cancellations(&self) -> DbResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .lock()?
            .orders
            .values()
            .filter(|o| {
                o.status == OrderStatus::Cancelled
                    && o.cancellation
                        .as_ref()
                        .is_some_and(|c| !c.stock_restored)
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn settle_cancelled_order(&self, order: &Order) -> DbResult<()> {
        let mut state = self.lock()?;

        match state.orders.get(&order.id) {
            Some(stored) if stored.status == OrderStatus::Cancelled => {}
            Some(_) | None => {
                return Err(DbError::conflict(format!(
                    "order {} is not cancelled",
                    order.id
                )))
            }
        }

        state
            .reservations
            .retain(|_, r| r.order_id.as_deref() != Some(order.id.as_str()));

        if order.payment_status == PaymentStatus::Paid {
            for item in &order.items {
                // A vanished product has no stock row left to return to.
                if let Some(product) = state.products.get_mut(&item.product_id) {
                    product.stock_count += item.quantity;
                    product.updated_at = Utc::now();
                }
            }
        }

        if let Some(stored) = state.orders.get_mut(&order.id) {
            if let Some(info) = stored.cancellation.as_mut() {
                info.stock_restored = true;
            }
            stored.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn update_order_if_status(&self, order: &Order, expected: OrderStatus) -> DbResult<()> {
        let mut state = self.lock()?;
        match state.orders.get_mut(&order.id) {
            Some(stored) if stored.status == expected => {
                // Items and pricing stay as inserted.
                stored.status = order.status;
                stored.payment_status = order.payment_status;
                stored.timestamps = order.timestamps.clone();
                stored.tracking = order.tracking.clone();
                stored.cancellation = order.cancellation.clone();
                stored.notes = order.notes.clone();
                stored.updated_at = order.updated_at;
                Ok(())
            }
            Some(_) | None => Err(DbError::conflict(format!(
                "order {} is no longer {}",
                order.id, expected
            ))),
        }
    }

    async fn delete_order(&self, id: &str) -> DbResult<()> {
        self.lock()?.orders.remove(id);
        Ok(())
    }

    async fn order_stats(&self) -> DbResult<OrderStats> {
        let state = self.lock()?;
        let mut stats = OrderStats::default();
        for order in state.orders.values() {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Confirmed => stats.confirmed += 1,
                OrderStatus::Processing => stats.processing += 1,
                OrderStatus::Shipped => stats.shipped += 1,
                OrderStatus::Delivered => stats.delivered += 1,
                OrderStatus::Completed => stats.completed += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
            }
            if order.status != OrderStatus::Cancelled {
                stats.total_revenue_cents += order.pricing.total_cents;
            }
        }
        Ok(stats)
    }

    async fn next_sequence(&self, domain: &str) -> DbResult<i64> {
        let mut state = self.lock()?;
        let seq = state.counters.entry(domain.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn seller() -> Seller {
        Seller {
            id: "s1".to_string(),
            company_name: "Widget Co".to_string(),
            contact_email: "sales@widget.example".to_string(),
        }
    }

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            name: "Widget".to_string(),
            description: None,
            price_cents: 1000,
            discount_bps: 0,
            stock_count: stock,
            seller_id: "s1".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn store_with_product(stock: i64) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_seller(&seller()).await.unwrap();
        store.insert_product(&product(stock)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_reserve_reduces_availability() {
        let store = store_with_product(10).await;
        let now = Utc::now();

        let outcome = store
            .reserve("u1", "p1", 4, ReservationKind::Cart, Some(now + Duration::minutes(30)))
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Reserved);

        assert_eq!(store.available_stock("p1", now).await.unwrap(), 6);
        // Durable stock untouched.
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_count, 10);
    }

    #[tokio::test]
    async fn test_reserve_is_absolute_not_additive() {
        let store = store_with_product(10).await;
        let now = Utc::now();
        let expiry = Some(now + Duration::minutes(30));

        store.reserve("u1", "p1", 4, ReservationKind::Cart, expiry).await.unwrap();
        // Raising the hold from 4 to 6 only needs 2 more units.
        store.reserve("u1", "p1", 6, ReservationKind::Cart, expiry).await.unwrap();

        assert_eq!(store.available_stock("p1", now).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_reserve_insufficient() {
        let store = store_with_product(5).await;
        let now = Utc::now();
        let expiry = Some(now + Duration::minutes(30));

        store.reserve("u1", "p1", 3, ReservationKind::Cart, expiry).await.unwrap();

        let outcome = store
            .reserve("u2", "p1", 4, ReservationKind::Cart, expiry)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReserveOutcome::Insufficient {
                available: 2,
                requested: 4
            }
        );
    }

    #[tokio::test]
    async fn test_expired_reservations_do_not_count() {
        let store = store_with_product(5).await;
        let now = Utc::now();

        store
            .reserve("u1", "p1", 5, ReservationKind::Cart, Some(now - Duration::seconds(1)))
            .await
            .unwrap();

        assert_eq!(store.available_stock("p1", now).await.unwrap(), 5);
        assert!(store.get_reservation("u1", "p1", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promote_clears_ttl_and_attaches_order() {
        let store = store_with_product(5).await;
        let now = Utc::now();
        let expiry = Some(now + Duration::minutes(30));

        store.reserve("u1", "p1", 2, ReservationKind::Cart, expiry).await.unwrap();
        store
            .promote_reservations("u1", &["p1".to_string()], "order-1")
            .await
            .unwrap();

        let held = store.get_reservation("u1", "p1", now).await.unwrap().unwrap();
        assert_eq!(held.kind, ReservationKind::Order);
        assert_eq!(held.order_id.as_deref(), Some("order-1"));
        assert!(held.expires_at.is_none());

        assert_eq!(store.release_order_reservations("order-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_promote_expired_hold_conflicts() {
        let store = store_with_product(5).await;
        let now = Utc::now();

        store
            .reserve("u1", "p1", 2, ReservationKind::Cart, Some(now - Duration::seconds(1)))
            .await
            .unwrap();

        let err = store
            .promote_reservations("u1", &["p1".to_string()], "order-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_commit_stock_floors_at_zero() {
        let store = store_with_product(3).await;

        store.commit_stock("p1", 5).await.unwrap();
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_count, 0);

        store.restore_stock("p1", 2).await.unwrap();
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_count, 2);
    }

    #[tokio::test]
    async fn test_next_sequence_is_monotonic() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sequence("ORDER").await.unwrap(), 1);
        assert_eq!(store.next_sequence("ORDER").await.unwrap(), 2);
        assert_eq!(store.next_sequence("INVOICE").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_seller_email_rejected() {
        let store = MemoryStore::new();
        store.insert_seller(&seller()).await.unwrap();

        let mut dup = seller();
        dup.id = "s2".to_string();
        let err = store.insert_seller(&dup).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
