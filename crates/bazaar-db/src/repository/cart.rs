//! # Cart Repository
//!
//! One-cart-per-user persistence. Lines are stored as a JSON array of
//! frozen snapshots; the engine owns all line-level mutation rules.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bazaar_core::{Cart, CartItem};

/// Repository for cart persistence.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets a user's cart.
    ///
    /// ## Returns
    /// * `Ok(Some(Cart))` - Cart exists (possibly with zero lines)
    /// * `Ok(None)` - User has never had a cart
    pub async fn get(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row: Option<(String, String, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> =
            sqlx::query_as(
                "SELECT user_id, items, created_at, updated_at FROM carts WHERE user_id = ?1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((user_id, items_json, created_at, updated_at)) => {
                let items: Vec<CartItem> = serde_json::from_str(&items_json)?;
                Ok(Some(Cart {
                    user_id,
                    items,
                    created_at,
                    updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Upserts a user's cart, replacing its lines wholesale.
    pub async fn save(&self, cart: &Cart) -> DbResult<()> {
        debug!(user_id = %cart.user_id, lines = cart.items.len(), "Saving cart");

        let items_json = serde_json::to_string(&cart.items)?;

        sqlx::query(
            r#"
            INSERT INTO carts (user_id, items, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                items = excluded.items,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&cart.user_id)
        .bind(items_json)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Empties a user's cart. No-op if the cart doesn't exist.
    pub async fn clear(&self, user_id: &str) -> DbResult<()> {
        debug!(user_id = %user_id, "Clearing cart");

        let now = chrono::Utc::now();

        sqlx::query("UPDATE carts SET items = '[]', updated_at = ?2 WHERE user_id = ?1")
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
