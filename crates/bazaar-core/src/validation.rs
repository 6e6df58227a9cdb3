//! # Validation Module
//!
//! Input validation rules for the order core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (web layer, out of scope)                             │
//! │  ├── Basic format checks, immediate user feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  ├── Payment transaction id format policy                              │
//! │  ├── Quantity and cart size limits                                     │
//! │  └── Address completeness                                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storage (SQLite)                                             │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (order_number)                                 │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use bazaar_core::validation::{validate_payment_transaction_id, validate_quantity};
//!
//! validate_payment_transaction_id("txn_12345678").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::{ValidationError, ValidationResult};
use crate::types::Address;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Payment Validators
// =============================================================================

/// Validates a payment transaction id.
///
/// The id is an opaque gateway reference; only its shape is policed here.
///
/// ## Rules
/// - 6 to 50 characters
/// - ASCII letters, digits, hyphens, underscores only
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_payment_transaction_id;
///
/// assert!(validate_payment_transaction_id("txn_2024-0001").is_ok());
/// assert!(validate_payment_transaction_id("short").is_err());
/// assert!(validate_payment_transaction_id("has space!").is_err());
/// ```
pub fn validate_payment_transaction_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "payment_transaction_id".to_string(),
        });
    }

    if id.len() < 6 {
        return Err(ValidationError::TooShort {
            field: "payment_transaction_id".to_string(),
            min: 6,
        });
    }

    if id.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "payment_transaction_id".to_string(),
            max: 50,
        });
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "payment_transaction_id".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of distinct line items).
///
/// ## Rules
/// - Must not exceed MAX_CART_ITEMS (100)
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates the parallel lists handed to the cart pre-flight check.
///
/// ## Rules
/// - `product_ids` and `quantities` must be equal length
/// - Neither list may be empty
/// - Every quantity must pass [`validate_quantity`]
pub fn validate_cart_lists(product_ids: &[String], quantities: &[i64]) -> ValidationResult<()> {
    if product_ids.len() != quantities.len() {
        return Err(ValidationError::MismatchedLengths {
            left: "product_ids".to_string(),
            right: "quantities".to_string(),
        });
    }

    if product_ids.is_empty() {
        return Err(ValidationError::Required {
            field: "product_ids".to_string(),
        });
    }

    for &qty in quantities {
        validate_quantity(qty)?;
    }

    Ok(())
}

// =============================================================================
// Address Validators
// =============================================================================

/// Validates that an address is complete enough to ship to.
///
/// ## Rules
/// - street, city, postal_code, and country must be non-empty
pub fn validate_address(address: &Address) -> ValidationResult<()> {
    let fields = [
        ("street", &address.street),
        ("city", &address.city),
        ("postal_code", &address.postal_code),
        ("country", &address.country),
    ];

    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: name.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            street: "1 Market St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62704".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_validate_payment_transaction_id() {
        // Valid ids
        assert!(validate_payment_transaction_id("txn_12345678").is_ok());
        assert!(validate_payment_transaction_id("ABC-123").is_ok());
        assert!(validate_payment_transaction_id(&"a".repeat(50)).is_ok());

        // Invalid ids
        assert!(validate_payment_transaction_id("").is_err());
        assert!(validate_payment_transaction_id("   ").is_err());
        assert!(validate_payment_transaction_id("short").is_err()); // 5 chars
        assert!(validate_payment_transaction_id(&"a".repeat(51)).is_err());
        assert!(validate_payment_transaction_id("has space!").is_err());
        assert!(validate_payment_transaction_id("txn@1234").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_cart_lists() {
        let ids = vec!["p1".to_string(), "p2".to_string()];
        assert!(validate_cart_lists(&ids, &[1, 2]).is_ok());

        // Mismatched lengths fail before anything else
        assert!(validate_cart_lists(&ids, &[1]).is_err());

        // Empty lists are rejected
        assert!(validate_cart_lists(&[], &[]).is_err());

        // Quantities are validated element-wise
        assert!(validate_cart_lists(&ids, &[1, 0]).is_err());
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address(&address()).is_ok());

        let mut missing_city = address();
        missing_city.city = "  ".to_string();
        assert!(validate_address(&missing_city).is_err());

        // State is optional; some countries have none
        let mut no_state = address();
        no_state.state = String::new();
        assert!(validate_address(&no_state).is_ok());
    }
}
