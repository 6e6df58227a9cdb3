//! # Seller Repository
//!
//! Lookups against the seller directory. Seller identity is resolved by
//! contact email at the seller-facing transitions (process, ship).

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bazaar_core::Seller;

/// Repository for seller directory operations.
#[derive(Debug, Clone)]
pub struct SellerRepository {
    pool: SqlitePool,
}

impl SellerRepository {
    /// Creates a new SellerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SellerRepository { pool }
    }

    /// Gets a seller by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>(
            "SELECT id, company_name, contact_email FROM sellers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(seller)
    }

    /// Gets a seller by contact email.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>(
            "SELECT id, company_name, contact_email FROM sellers WHERE contact_email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(seller)
    }

    /// Inserts a new seller.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Contact email already registered
    pub async fn insert(&self, seller: &Seller) -> DbResult<()> {
        debug!(id = %seller.id, company = %seller.company_name, "Inserting seller");

        sqlx::query("INSERT INTO sellers (id, company_name, contact_email) VALUES (?1, ?2, ?3)")
            .bind(&seller.id)
            .bind(&seller.company_name)
            .bind(&seller.contact_email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
