//! # Cart Service
//!
//! Cart line maintenance backed by cart holds.
//!
//! Adding to a cart never touches durable stock: it places a TTL'd hold
//! sized to the full line quantity, then snapshots the product into the
//! cart. If the hold can't be placed, the cart doesn't change.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use bazaar_core::{validation, Cart, CartItem};
use bazaar_db::Store;

use crate::error::{OrderError, OrderResult};
use crate::reservations::ReservationManager;

/// Cart maintenance operations.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    reservations: ReservationManager,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, reservations: ReservationManager) -> Self {
        CartService {
            store,
            reservations,
        }
    }

    /// The user's cart; an empty one if they've never had one.
    pub async fn get(&self, user_id: &str) -> OrderResult<Cart> {
        Ok(self
            .store
            .get_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id, Utc::now())))
    }

    /// Adds quantity to a cart line (creating it on first add), sized by
    /// a cart hold for the full line quantity.
    ///
    /// The product snapshot (name, price) freezes at first add; later
    /// additions only grow the quantity.
    pub async fn add_item(&self, user_id: &str, product_id: &str, quantity: i64) -> OrderResult<Cart> {
        validation::validate_quantity(quantity)?;

        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| OrderError::not_found("Product", product_id))?;

        let mut cart = self.get(user_id).await?;

        let new_quantity = match cart.item(product_id) {
            Some(line) => line.quantity + quantity,
            None => {
                validation::validate_cart_size(cart.items.len())?;
                quantity
            }
        };
        validation::validate_quantity(new_quantity)?;

        // Hold first; the cart only changes if the hold fits.
        self.reservations
            .reserve_for_cart(user_id, product_id, new_quantity)
            .await?;

        match cart.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(line) => line.quantity = new_quantity,
            None => cart.items.push(CartItem::from_product(&product, quantity)),
        }
        cart.updated_at = Utc::now();
        self.store.save_cart(&cart).await?;

        debug!(user_id = %user_id, product_id = %product_id, quantity = new_quantity, "Cart line updated");
        Ok(cart)
    }

    /// Sets a cart line to an absolute quantity. Zero removes the line
    /// and releases its hold.
    pub async fn update_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> OrderResult<Cart> {
        let mut cart = self.get(user_id).await?;

        if !cart.items.iter().any(|i| i.product_id == product_id) {
            return Err(OrderError::not_found("Cart item", product_id));
        }

        if quantity == 0 {
            cart.items.retain(|i| i.product_id != product_id);
            self.reservations.release(user_id, product_id).await?;
        } else {
            validation::validate_quantity(quantity)?;
            self.reservations
                .reserve_for_cart(user_id, product_id, quantity)
                .await?;
            if let Some(line) = cart.items.iter_mut().find(|i| i.product_id == product_id) {
                line.quantity = quantity;
            }
        }

        cart.updated_at = Utc::now();
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Empties the cart and releases all its holds.
    pub async fn clear(&self, user_id: &str) -> OrderResult<()> {
        let cart = self.get(user_id).await?;
        for line in &cart.items {
            self.reservations.release(user_id, &line.product_id).await?;
        }
        self.store.clear_cart(user_id).await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
