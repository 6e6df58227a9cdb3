//! # Domain Types
//!
//! Core domain types for the Bazaar order core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │   Reservation   │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  user_id        │   │  id (UUID)      │       │
//! │  │  order_number   │   │  product_id     │   │  price_cents    │       │
//! │  │  status         │   │  quantity       │   │  stock_count    │       │
//! │  │  items, pricing │   │  kind, expires  │   │  seller_id      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  OrderStatus    │   │ PaymentStatus   │   │ ReservationKind │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Pending        │   │  Pending        │   │  Cart (TTL)     │       │
//! │  │  Confirmed      │   │  Paid           │   │  Order (no TTL) │       │
//! │  │  ... Cancelled  │   │  Refunded       │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! The order aggregate has:
//! - `id`: UUID v4 - immutable, used for storage relations and event keys
//! - `order_number`: human-readable business identifier (ORD-000042)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% (the flat order tax rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order in its fulfillment lifecycle.
///
/// Transitions between statuses are governed by the table in
/// [`crate::lifecycle`]; nothing else may move an order between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created from a cart, payment not yet confirmed.
    Pending,
    /// Payment confirmed, stock committed.
    Confirmed,
    /// A seller has started preparing the order.
    Processing,
    /// Handed to a carrier with tracking info.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Fulfilled end-to-end. Terminal.
    Completed,
    /// Cancelled before shipping. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Stable uppercase name, as used in events and storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment state of an order, tracked independently of fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Transaction reference recorded, not yet confirmed.
    Pending,
    /// Payment confirmed at order confirmation time.
    Paid,
    /// Payment attempt failed.
    Failed,
    /// Refund issued after cancellation.
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Why an order was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    CustomerRequest,
    PaymentFailed,
    InventoryUnavailable,
    /// Applied by the stale-order reaper.
    SystemTimeout,
    Other,
}

/// Who performed a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationActor {
    /// The order's owning customer.
    User,
    /// The stale-order reaper.
    System,
    /// Back-office staff via the generic transition entry point.
    Admin,
}

impl CancellationActor {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CancellationActor::User => "USER",
            CancellationActor::System => "SYSTEM",
            CancellationActor::Admin => "ADMIN",
        }
    }
}

/// Refund progress after a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    /// Refund owed, not yet processed (always the state at cancellation).
    Pending,
    Completed,
    Failed,
}

/// Embedded cancellation record, populated only by the cancel transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationInfo {
    pub reason: CancellationReason,
    /// Free-text details supplied by the cancelling actor.
    pub details: Option<String>,
    pub cancelled_by: CancellationActor,
    /// Id of the cancelling user, when the actor is a user.
    pub cancelled_by_id: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub refund_status: RefundStatus,
    /// Refund owed; equals the order total at cancellation time.
    pub refund_amount_cents: i64,
    /// True once the order's holds are released and, for paid orders,
    /// committed stock is back in the pool. False means settlement is
    /// still owed and the repair sweep will retry it.
    #[serde(default)]
    pub stock_restored: bool,
}

impl CancellationInfo {
    /// Returns the refund amount as Money.
    #[inline]
    pub fn refund_amount(&self) -> Money {
        Money::from_cents(self.refund_amount_cents)
    }
}

// =============================================================================
// Tracking
// =============================================================================

/// Embedded shipment record, populated only by the ship transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub carrier: String,
    pub shipped_at: DateTime<Utc>,
    /// Defaults to `shipped_at + 7 days`.
    pub estimated_delivery: DateTime<Utc>,
    /// Set by the deliver transition.
    pub actual_delivery: Option<DateTime<Utc>>,
    /// Who signed for the delivery.
    pub received_by: Option<String>,
}

// =============================================================================
// Address
// =============================================================================

/// Postal address value object, snapshotted onto orders at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

// =============================================================================
// Product & Seller
// =============================================================================

/// A product listed in the marketplace catalog.
///
/// `stock_count` is governed exclusively by the stock ledger's
/// conditional-update discipline; nothing else reads-then-writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown in listings and frozen onto order lines.
    pub name: String,

    /// Optional description, frozen onto order lines.
    pub description: Option<String>,

    /// List price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Discount in basis points applied to the list price (1000 = 10%).
    pub discount_bps: u32,

    /// Actual on-hand stock. Never negative.
    pub stock_count: i64,

    /// Owning seller.
    pub seller_id: String,

    /// Whether the product is purchasable (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the effective unit price after the product's discount.
    ///
    /// This is the price frozen into cart lines and order items.
    pub fn discounted_price(&self) -> Money {
        self.price().apply_percentage_discount(self.discount_bps)
    }
}

/// A seller in the marketplace directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Seller {
    pub id: String,
    pub company_name: String,
    pub contact_email: String,
}

// =============================================================================
// Cart
// =============================================================================

/// A line in a shopping cart.
/// Uses snapshot pattern to freeze product data at add-to-cart time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    /// Product name at add time (frozen).
    pub name: String,
    /// Product description at add time (frozen).
    pub description: Option<String>,
    pub quantity: i64,
    /// Discounted unit price in cents at add time (frozen).
    pub unit_price_cents: i64,
}

impl CartItem {
    /// Snapshots a product into a cart line at the current discounted price.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            quantity,
            unit_price_cents: product.discounted_price().cents(),
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// A shopper's cart. One per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: String,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Cart {
            user_id: user_id.into(),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks if the cart has no lines.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Finds a line by product id.
    pub fn item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// Whether a reservation backs a cart line or a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationKind {
    /// Expires automatically on its TTL.
    Cart,
    /// No TTL; released explicitly on cancellation or superseded by commit.
    Order,
}

/// A hold of N units of a product for one user.
///
/// Keyed by (user_id, product_id). Reduces the product's effective
/// availability without touching its durable stock count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub kind: ReservationKind,
    /// The order this hold backs, once promoted from cart to order.
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Absolute expiry instant. None for order-kind reservations.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Checks whether the reservation has passed its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze product and seller data at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub product_id: String,
    /// Product name at checkout (frozen).
    pub name: String,
    /// Product description at checkout (frozen).
    pub description: Option<String>,
    pub quantity: i64,
    /// Discounted unit price in cents at checkout (frozen).
    pub unit_price_cents: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
    pub seller_id: String,
    /// Seller company name at checkout (frozen).
    pub seller_name: String,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Pricing breakdown for an order. Immutable once set.
///
/// Invariant: `total = subtotal + tax + shipping − discount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Fixed per order, default "USD".
    pub currency: String,
}

impl OrderPricing {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// The timestamp bundle for an order. Each field is stamped exactly once,
/// by the transition of the same name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderTimestamps {
    pub confirmed: Option<DateTime<Utc>>,
    pub processed: Option<DateTime<Utc>>,
    pub shipped: Option<DateTime<Utc>>,
    pub delivered: Option<DateTime<Utc>>,
    pub cancelled: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
}

/// The order aggregate root.
///
/// Orders are mutated only through the lifecycle engine; callers never
/// write fields directly. Terminal states (CANCELLED, COMPLETED) are final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Human-readable business identifier (ORD-000042). Unique, monotonic.
    pub order_number: String,

    /// Owning customer.
    pub user_id: String,

    /// Customer contact snapshot (captured at creation, not live-linked).
    pub customer_email: String,
    pub customer_name: String,

    /// Frozen line items.
    pub items: Vec<OrderItem>,

    /// Pricing breakdown, immutable once set.
    pub pricing: OrderPricing,

    pub shipping_address: Address,
    pub billing_address: Address,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    /// Per-transition timestamps, each stamped once.
    pub timestamps: OrderTimestamps,

    /// Populated by the ship transition.
    pub tracking: Option<TrackingInfo>,

    /// Populated by the cancel transition.
    pub cancellation: Option<CancellationInfo>,

    /// Opaque payment gateway reference, validated for format only.
    pub payment_transaction_id: String,

    /// Free-text notes; `process` appends to this.
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across all line items.
    pub fn total_item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether any line item belongs to the given seller.
    pub fn has_seller(&self, seller_id: &str) -> bool {
        self.items.iter().any(|i| i.seller_id == seller_id)
    }

    /// Line items belonging to the given seller.
    pub fn seller_items(&self, seller_id: &str) -> Vec<&OrderItem> {
        self.items
            .iter()
            .filter(|i| i.seller_id == seller_id)
            .collect()
    }

    /// Cancellable = status ∈ {PENDING, CONFIRMED, PROCESSING}.
    #[inline]
    pub fn is_cancellable(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Shipped = status ∈ {SHIPPED, DELIVERED, COMPLETED}.
    #[inline]
    pub fn is_shipped(&self) -> bool {
        self.status.is_shipped()
    }

    /// Final = status ∈ {DELIVERED, COMPLETED, CANCELLED}.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}

// =============================================================================
// Order Statistics
// =============================================================================

/// Aggregate order statistics for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub processing: i64,
    pub shipped: i64,
    pub delivered: i64,
    pub completed: i64,
    pub cancelled: i64,
    /// Revenue over non-cancelled orders, in cents.
    pub total_revenue_cents: i64,
}

impl OrderStats {
    /// Average value of non-cancelled orders, in cents. Zero when empty.
    pub fn average_order_value_cents(&self) -> i64 {
        let counted = self.total_orders - self.cancelled;
        if counted <= 0 {
            return 0;
        }
        self.total_revenue_cents / counted
    }

    /// Share of all orders that were cancelled, in [0, 1].
    pub fn cancellation_rate(&self) -> f64 {
        if self.total_orders == 0 {
            return 0.0;
        }
        self.cancelled as f64 / self.total_orders as f64
    }

    /// Share of all orders that reached COMPLETED, in [0, 1].
    pub fn fulfillment_rate(&self) -> f64 {
        if self.total_orders == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total_orders as f64
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(seller_id: &str, quantity: i64) -> OrderItem {
        OrderItem {
            product_id: "p1".to_string(),
            name: "Widget".to_string(),
            description: None,
            quantity,
            unit_price_cents: 1000,
            line_total_cents: 1000 * quantity,
            seller_id: seller_id.to_string(),
            seller_name: "Widget Co".to_string(),
        }
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_order_status_as_str() {
        assert_eq!(OrderStatus::Pending.as_str(), "PENDING");
        assert_eq!(OrderStatus::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_discounted_price() {
        let product = Product {
            id: "p1".to_string(),
            name: "Widget".to_string(),
            description: None,
            price_cents: 10000,
            discount_bps: 1500, // 15% off
            stock_count: 10,
            seller_id: "s1".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(product.discounted_price().cents(), 8500);
    }

    #[test]
    fn test_cart_item_snapshot_freezes_price() {
        let mut product = Product {
            id: "p1".to_string(),
            name: "Widget".to_string(),
            description: Some("A widget".to_string()),
            price_cents: 3000,
            discount_bps: 0,
            stock_count: 10,
            seller_id: "s1".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let line = CartItem::from_product(&product, 2);
        product.price_cents = 9999; // later price change must not leak in

        assert_eq!(line.unit_price_cents, 3000);
        assert_eq!(line.line_total().cents(), 6000);
    }

    #[test]
    fn test_reservation_expiry() {
        let now = Utc::now();
        let res = Reservation {
            user_id: "u1".to_string(),
            product_id: "p1".to_string(),
            quantity: 2,
            kind: ReservationKind::Cart,
            order_id: None,
            created_at: now,
            expires_at: Some(now - chrono::Duration::seconds(1)),
        };
        assert!(res.is_expired(now));

        let permanent = Reservation {
            kind: ReservationKind::Order,
            expires_at: None,
            ..res
        };
        assert!(!permanent.is_expired(now));
    }

    #[test]
    fn test_order_seller_helpers() {
        let items = vec![item("s1", 2), item("s2", 1)];
        let count: i64 = items.iter().map(|i| i.quantity).sum();
        assert_eq!(count, 3);

        let has_s1 = items.iter().any(|i| i.seller_id == "s1");
        let has_s3 = items.iter().any(|i| i.seller_id == "s3");
        assert!(has_s1);
        assert!(!has_s3);
    }

    #[test]
    fn test_order_stats_rates() {
        let stats = OrderStats {
            total_orders: 10,
            completed: 4,
            cancelled: 2,
            total_revenue_cents: 80000,
            ..Default::default()
        };
        assert_eq!(stats.average_order_value_cents(), 10000);
        assert!((stats.cancellation_rate() - 0.2).abs() < f64::EPSILON);
        assert!((stats.fulfillment_rate() - 0.4).abs() < f64::EPSILON);

        let empty = OrderStats::default();
        assert_eq!(empty.average_order_value_cents(), 0);
        assert_eq!(empty.cancellation_rate(), 0.0);
    }
}
