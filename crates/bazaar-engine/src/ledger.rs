//! # Stock Ledger
//!
//! Movements against durable stock and effective availability.
//!
//! ## Two Numbers Per Product
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock_count   durable, on-hand units. Moves exactly twice in an        │
//! │                order's life: down at confirmation (commit), up on       │
//! │                paid-order cancellation (restore).                       │
//! │                                                                         │
//! │  available     stock_count − Σ active holds, floored at zero. This is   │
//! │                what shoppers compete over; it moves on every reserve    │
//! │                and release without touching stock_count.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use bazaar_core::{Order, ReservationKind};
use bazaar_db::{DbError, ReserveOutcome, Store};

use crate::error::{OrderError, OrderResult};

/// Bounded retries for storage-level write conflicts.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Stock movements over the store.
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn Store>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        StockLedger { store }
    }

    /// Effective availability right now.
    pub async fn available_stock(&self, product_id: &str) -> OrderResult<i64> {
        Ok(self.store.available_stock(product_id, Utc::now()).await?)
    }

    /// Sets the caller's hold to an absolute quantity, retried on
    /// storage conflicts.
    pub async fn reserve(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        kind: ReservationKind,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> OrderResult<()> {
        let mut attempt = 0;
        loop {
            match self
                .store
                .reserve(user_id, product_id, quantity, kind, expires_at)
                .await
            {
                Ok(ReserveOutcome::Reserved) => return Ok(()),
                Ok(ReserveOutcome::Insufficient {
                    available,
                    requested,
                }) => {
                    debug!(
                        product_id = %product_id,
                        available,
                        requested,
                        "Reservation rejected: insufficient availability"
                    );
                    return Err(OrderError::InsufficientInventory {
                        product_id: product_id.to_string(),
                        available,
                        requested,
                    });
                }
                Err(e @ DbError::Conflict(_)) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(
                        product_id = %product_id,
                        attempt,
                        error = %e,
                        "Reservation hit a write conflict, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Decrements durable stock for every line of a confirming order.
    /// Each decrement floors at zero.
    pub async fn commit(&self, order: &Order) -> OrderResult<()> {
        debug!(order_id = %order.id, items = order.items.len(), "Committing stock");

        for item in &order.items {
            self.store
                .commit_stock(&item.product_id, item.quantity)
                .await?;
        }
        Ok(())
    }

    /// Returns durable stock for every line of a cancelled paid order.
    pub async fn restore(&self, order: &Order) -> OrderResult<()> {
        debug!(order_id = %order.id, items = order.items.len(), "Restoring stock");

        for item in &order.items {
            self.store
                .restore_stock(&item.product_id, item.quantity)
                .await?;
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{Product, Seller};
    use bazaar_db::MemoryStore;
    use chrono::Duration;

    async fn store_with_product(stock: i64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .insert_seller(&Seller {
                id: "s1".to_string(),
                company_name: "Widget Co".to_string(),
                contact_email: "sales@widget.example".to_string(),
            })
            .await
            .unwrap();
        store
            .insert_product(&Product {
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
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_reserve_maps_insufficient() {
        let store = store_with_product(3).await;
        let ledger = StockLedger::new(store);

        let err = ledger
            .reserve(
                "u1",
                "p1",
                5,
                ReservationKind::Cart,
                Some(Utc::now() + Duration::minutes(30)),
            )
            .await
            .unwrap_err();

        match err {
            OrderError::InsufficientInventory {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientInventory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_oversell() {
        let store = store_with_product(10).await;
        let ledger_a = StockLedger::new(store.clone());
        let ledger_b = StockLedger::new(store.clone());

        let expiry = Some(Utc::now() + Duration::minutes(30));
        let a = tokio::spawn(async move {
            ledger_a
                .reserve("u1", "p1", 8, ReservationKind::Cart, expiry)
                .await
        });
        let b = tokio::spawn(async move {
            ledger_b
                .reserve("u2", "p1", 5, ReservationKind::Cart, expiry)
                .await
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        // Stock of 10 cannot satisfy 8 + 5; exactly one wins.
        assert!(a.is_ok() ^ b.is_ok(), "a={a:?} b={b:?}");

        let available = store.available_stock("p1", Utc::now()).await.unwrap();
        assert!(available == 2 || available == 5);
    }

    #[tokio::test]
    async fn test_commit_and_restore_move_durable_stock() {
        let store = store_with_product(10).await;
        let ledger = StockLedger::new(store.clone());

        let order = crate::testutil::order_with_items(vec![("p1", 4, 1000)]);
        ledger.commit(&order).await.unwrap();
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_count, 6);

        ledger.restore(&order).await.unwrap();
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock_count, 10);
    }
}
