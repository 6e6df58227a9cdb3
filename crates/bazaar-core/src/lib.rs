//! # bazaar-core: Pure Business Logic for the Bazaar Order Core
//!
//! This crate is the **heart** of the order-fulfillment system. It contains
//! all business rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Bazaar Order Core Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 bazaar-engine (Orchestration)                   │   │
//! │  │   checkout, confirm, ship, cancel, reaper, event publisher     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ lifecycle │  │   │
//! │  │   │   Order   │  │   Money   │  │  totals   │  │  status   │  │   │
//! │  │   │  and co.  │  │  TaxCalc  │  │  formula  │  │   table   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Storage Layer)                    │   │
//! │  │            SQLite repositories + in-memory store                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Reservation, Product, Cart, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Order pricing calculation (subtotal/tax/shipping/total)
//! - [`lifecycle`] - The order status transition table
//! - [`events`] - Domain event record for the event bus
//! - [`error`] - Validation error types
//! - [`validation`] - Input validation rules
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::money::Money;
//! use bazaar_core::types::TaxRate;
//!
//! // Create money from cents (never from floats!)
//! let price = Money::from_cents(6000); // $60.00
//!
//! // Order tax is a flat 10%
//! let tax = price.calculate_tax(TaxRate::from_bps(1000));
//! assert_eq!(tax.cents(), 600);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use bazaar_core::Money` instead of
// `use bazaar_core::money::Money`

pub use error::ValidationError;
pub use events::{OrderEvent, OrderEventType};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct line items allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and keeps a single checkout to a reasonable size.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Sequence domain used when allocating order numbers.
pub const ORDER_SEQUENCE_DOMAIN: &str = "ORDER";

/// Seller name recorded on a line item when the directory has no entry.
pub const UNKNOWN_SELLER_NAME: &str = "Unknown Seller";

/// Formats an order number from its sequence value: `ORD-000042`.
///
/// Order numbers are human-readable business identifiers. They come from a
/// strictly increasing persisted sequence; gaps are tolerated (a failed
/// checkout may burn a number).
pub fn format_order_number(seq: i64) -> String {
    format!("ORD-{:06}", seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_order_number() {
        assert_eq!(format_order_number(1), "ORD-000001");
        assert_eq!(format_order_number(42), "ORD-000042");
        // Numbers past six digits keep growing rather than truncating
        assert_eq!(format_order_number(1_234_567), "ORD-1234567");
    }
}
