//! # Engine Error Types
//!
//! The caller-facing error taxonomy for order operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  ValidationError (bazaar-core)  ─────►  OrderError::InvalidInput        │
//! │                                                                         │
//! │  DbError (bazaar-db)                                                    │
//! │    NotFound   ─────────────────────►  OrderError::NotFound              │
//! │    Conflict   ── bounded retry ────►  OrderError::Conflict              │
//! │    everything else ────────────────►  OrderError::Internal              │
//! │                                                                         │
//! │  Lifecycle table miss ─────────────►  OrderError::InvalidTransition     │
//! │  Availability check miss ──────────►  OrderError::InsufficientInventory │
//! │  Ownership check miss ─────────────►  OrderError::Forbidden             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use bazaar_core::{OrderStatus, ValidationError};
use bazaar_db::DbError;

/// Errors surfaced by order engine operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The referenced entity doesn't exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The actor isn't allowed to perform this operation on this order.
    ///
    /// ## When This Occurs
    /// - A user confirms or cancels someone else's order
    /// - A seller processes or ships an order with none of their items
    #[error("Not permitted: {0}")]
    Forbidden(String),

    /// The requested status change isn't in the transition table.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Not enough effective availability to satisfy the request.
    #[error("Insufficient inventory for product {product_id}: {available} available, {requested} requested")]
    InsufficientInventory {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// A request field failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Concurrent writers collided and bounded retries didn't resolve it.
    #[error("Conflicting concurrent update, try again")]
    Conflict,

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrderError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        OrderError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        OrderError::Forbidden(message.into())
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        OrderError::Internal(message.into())
    }
}

impl From<DbError> for OrderError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => OrderError::NotFound { entity, id },
            DbError::Conflict(_) => OrderError::Conflict,
            other => OrderError::Internal(other.to_string()),
        }
    }
}

/// Result type for order engine operations.
pub type OrderResult<T> = Result<T, OrderError>;
