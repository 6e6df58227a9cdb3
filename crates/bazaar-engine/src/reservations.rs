//! # Reservation Manager
//!
//! Cart holds, order holds, and the promotion between them.
//!
//! ## Hold Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add to cart ──► CART hold (TTL)                                        │
//! │                     │                                                    │
//! │         TTL lapses ─┤─ checkout ──► ORDER hold (no TTL, order id)        │
//! │         hold gone   │                   │                                │
//! │                     │        confirm ───┤── cancel ──► released          │
//! │                     │        commits    │                                │
//! │                     │        stock,     └─ released after commit         │
//! │                     ▼        hold released                               │
//! │                released                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use bazaar_core::{validation, ReservationKind};
use bazaar_db::Store;

use crate::error::{OrderError, OrderResult};
use crate::ledger::StockLedger;

/// Manages stock holds keyed by (user, product).
#[derive(Clone)]
pub struct ReservationManager {
    store: Arc<dyn Store>,
    ledger: StockLedger,
    cart_ttl: Duration,
}

impl ReservationManager {
    pub fn new(store: Arc<dyn Store>, cart_ttl: Duration) -> Self {
        let ledger = StockLedger::new(store.clone());
        ReservationManager {
            store,
            ledger,
            cart_ttl,
        }
    }

    /// Places or refreshes a cart hold at an absolute quantity.
    /// The TTL restarts from now on every call.
    pub async fn reserve_for_cart(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> OrderResult<()> {
        validation::validate_quantity(quantity)?;

        let ttl = ChronoDuration::from_std(self.cart_ttl)
            .map_err(|e| OrderError::internal(format!("cart TTL out of range: {e}")))?;
        let expires_at = Utc::now() + ttl;

        self.ledger
            .reserve(user_id, product_id, quantity, ReservationKind::Cart, Some(expires_at))
            .await
    }

    /// Drops a user's hold on one product. No-op if absent.
    pub async fn release(&self, user_id: &str, product_id: &str) -> OrderResult<()> {
        Ok(self.store.release_reservation(user_id, product_id).await?)
    }

    /// Drops every hold attached to an order. Returns the count removed.
    pub async fn release_all(&self, order_id: &str) -> OrderResult<u64> {
        let released = self.store.release_order_reservations(order_id).await?;
        debug!(order_id = %order_id, released, "Released order reservations");
        Ok(released)
    }

    /// Retags the user's cart holds as order holds: no TTL, order id
    /// attached. All-or-nothing across the given products.
    pub async fn promote_cart_to_order(
        &self,
        user_id: &str,
        product_ids: &[String],
        order_id: &str,
    ) -> OrderResult<()> {
        Ok(self
            .store
            .promote_reservations(user_id, product_ids, order_id)
            .await?)
    }

    /// Non-mutating availability check for a cart about to check out.
    ///
    /// A quantity is coverable when the user's existing hold plus the
    /// pool's free availability reaches it. Nothing is reserved or
    /// released here.
    pub async fn validate_cart(
        &self,
        user_id: &str,
        product_ids: &[String],
        quantities: &[i64],
    ) -> OrderResult<()> {
        validation::validate_cart_lists(product_ids, quantities)?;

        let now = Utc::now();
        for (product_id, &quantity) in product_ids.iter().zip(quantities) {
            let product = self
                .store
                .get_product(product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| OrderError::not_found("Product", product_id))?;

            let available = self.store.available_stock(&product.id, now).await?;
            let held = self
                .store
                .get_reservation(user_id, product_id, now)
                .await?
                .map_or(0, |r| r.quantity);

            if held + available < quantity {
                return Err(OrderError::InsufficientInventory {
                    product_id: product_id.clone(),
                    available: held + available,
                    requested: quantity,
                });
            }
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
