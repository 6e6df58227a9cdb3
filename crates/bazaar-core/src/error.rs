//! # Error Types
//!
//! Validation error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  └── DbError          - Storage operation failures                     │
//! │                                                                         │
//! │  bazaar-engine errors (separate crate)                                 │
//! │  └── OrderError       - Lifecycle operation failures (the taxonomy     │
//! │                         callers see: NotFound, Forbidden, ...)         │
//! │                                                                         │
//! │  Flow: ValidationError → OrderError::InvalidInput → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field names, limits)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any lifecycle logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed payment transaction id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two parallel lists must be the same length.
    #[error("{left} and {right} must have the same length")]
    MismatchedLengths { left: String, right: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ValidationError::Required {
            field: "payment_transaction_id".to_string(),
        };
        assert_eq!(err.to_string(), "payment_transaction_id is required");

        let err = ValidationError::TooShort {
            field: "payment_transaction_id".to_string(),
            min: 6,
        };
        assert_eq!(
            err.to_string(),
            "payment_transaction_id must be at least 6 characters"
        );

        let err = ValidationError::MismatchedLengths {
            left: "product_ids".to_string(),
            right: "quantities".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "product_ids and quantities must have the same length"
        );
    }
}
