//! # Sequence Repository
//!
//! Named monotonic counters. Order numbers draw from the `ORDER` domain.
//!
//! The increment is a single atomic upsert, so concurrent checkouts get
//! distinct values. Gaps are tolerated: a checkout that fails after
//! drawing a number simply burns it.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Repository for monotonic sequence allocation.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Atomically increments and returns the next value for a domain.
    /// The first call for a new domain returns 1.
    pub async fn next(&self, domain: &str) -> DbResult<i64> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (domain, seq) VALUES (?1, 1)
            ON CONFLICT(domain) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        debug!(domain = %domain, seq = %seq, "Allocated sequence value");
        Ok(seq)
    }
}
