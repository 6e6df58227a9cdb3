//! # Pricing Calculator
//!
//! Pure pricing math for orders: line items in, pricing breakdown out.
//! No side effects, fully deterministic.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal = Σ line totals                                               │
//! │  tax      = subtotal × 10%                                              │
//! │  shipping = $0 if subtotal ≥ $50, else flat $5                          │
//! │  discount = $0 (placeholder until promotions land)                      │
//! │  total    = subtotal + tax + shipping − discount                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All arithmetic is integer cents; there is no binary floating point
//! anywhere in this module.

use crate::money::Money;
use crate::types::{OrderItem, OrderPricing, TaxRate};

// =============================================================================
// Constants
// =============================================================================

/// Flat order tax rate: 10%.
pub const ORDER_TAX_RATE_BPS: u32 = 1000;

/// Orders at or above this subtotal ship free.
pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_cents(5000);

/// Flat shipping fee below the free-shipping threshold.
pub const FLAT_SHIPPING_FEE: Money = Money::from_cents(500);

/// Currency fixed per order.
pub const DEFAULT_CURRENCY: &str = "USD";

// =============================================================================
// Calculator
// =============================================================================

/// Computes the pricing breakdown for a set of order line items.
///
/// Deterministic: identical items always yield an identical breakdown, and
/// `total == subtotal + tax + shipping - discount` holds by construction.
///
/// ## Example
/// ```rust
/// use bazaar_core::pricing::calculate;
/// use bazaar_core::types::OrderItem;
///
/// let items = vec![OrderItem {
///     product_id: "p1".to_string(),
///     name: "Widget".to_string(),
///     description: None,
///     quantity: 2,
///     unit_price_cents: 3000,
///     line_total_cents: 6000,
///     seller_id: "s1".to_string(),
///     seller_name: "Widget Co".to_string(),
/// }];
///
/// let pricing = calculate(&items);
/// assert_eq!(pricing.subtotal_cents, 6000); // $60.00
/// assert_eq!(pricing.tax_cents, 600);       // $6.00
/// assert_eq!(pricing.shipping_cents, 0);    // free, $60 ≥ $50
/// assert_eq!(pricing.total_cents, 6600);    // $66.00
/// ```
pub fn calculate(items: &[OrderItem]) -> OrderPricing {
    let subtotal = items
        .iter()
        .fold(Money::zero(), |acc, item| acc + item.line_total());

    let tax = subtotal.calculate_tax(TaxRate::from_bps(ORDER_TAX_RATE_BPS));

    // The ≥ $50 rule is authoritative; the fee applies strictly below it.
    let shipping = if subtotal >= FREE_SHIPPING_THRESHOLD {
        Money::zero()
    } else {
        FLAT_SHIPPING_FEE
    };

    // Placeholder until order-level promotions exist.
    let discount = Money::zero();

    let total = subtotal + tax + shipping - discount;

    OrderPricing {
        subtotal_cents: subtotal.cents(),
        tax_cents: tax.cents(),
        shipping_cents: shipping.cents(),
        discount_cents: discount.cents(),
        total_cents: total.cents(),
        currency: DEFAULT_CURRENCY.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(unit_price_cents: i64, quantity: i64) -> OrderItem {
        OrderItem {
            product_id: "p1".to_string(),
            name: "Widget".to_string(),
            description: None,
            quantity,
            unit_price_cents,
            line_total_cents: unit_price_cents * quantity,
            seller_id: "s1".to_string(),
            seller_name: "Widget Co".to_string(),
        }
    }

    #[test]
    fn test_sixty_dollar_order() {
        // 2 × $30 → subtotal $60, tax $6, free shipping, total $66
        let pricing = calculate(&[item(3000, 2)]);
        assert_eq!(pricing.subtotal_cents, 6000);
        assert_eq!(pricing.tax_cents, 600);
        assert_eq!(pricing.shipping_cents, 0);
        assert_eq!(pricing.discount_cents, 0);
        assert_eq!(pricing.total_cents, 6600);
        assert_eq!(pricing.currency, "USD");
    }

    #[test]
    fn test_flat_shipping_below_threshold() {
        // $40 order pays the flat $5 fee
        let pricing = calculate(&[item(2000, 2)]);
        assert_eq!(pricing.subtotal_cents, 4000);
        assert_eq!(pricing.tax_cents, 400);
        assert_eq!(pricing.shipping_cents, 500);
        assert_eq!(pricing.total_cents, 4900);
    }

    #[test]
    fn test_shipping_threshold_boundaries() {
        // Exactly $50 ships free
        let at = calculate(&[item(5000, 1)]);
        assert_eq!(at.shipping_cents, 0);

        // One cent under pays the fee
        let under = calculate(&[item(4999, 1)]);
        assert_eq!(under.shipping_cents, 500);
    }

    #[test]
    fn test_multiple_lines_sum_into_subtotal() {
        let pricing = calculate(&[item(1000, 3), item(250, 4)]);
        assert_eq!(pricing.subtotal_cents, 4000);
        assert_eq!(pricing.total_cents, 4000 + 400 + 500);
    }

    #[test]
    fn test_deterministic() {
        let items = vec![item(1234, 3), item(999, 1)];
        let a = calculate(&items);
        let b = calculate(&items);
        assert_eq!(a, b);
    }

    #[test]
    fn test_total_identity_holds() {
        for cents in [1, 99, 4999, 5000, 123_456] {
            let p = calculate(&[item(cents, 1)]);
            assert_eq!(
                p.total_cents,
                p.subtotal_cents + p.tax_cents + p.shipping_cents - p.discount_cents
            );
        }
    }

    #[test]
    fn test_empty_items() {
        // Degenerate case; checkout rejects empty carts before pricing runs
        let pricing = calculate(&[]);
        assert_eq!(pricing.subtotal_cents, 0);
        assert_eq!(pricing.tax_cents, 0);
        assert_eq!(pricing.shipping_cents, 500);
        assert_eq!(pricing.total_cents, 500);
    }
}
