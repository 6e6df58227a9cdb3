//! # Domain Events
//!
//! The event record emitted after committed lifecycle transitions.
//!
//! ## Event Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Order Event Schema                                  │
//! │                                                                         │
//! │  Lifecycle Engine ──► OrderEvent ──► bus.send(topic, order_id, event)  │
//! │                                                                         │
//! │  Keyed by order id so the transport preserves per-order ordering.      │
//! │  Consumers (notification, document generation) are passive              │
//! │  subscribers; this schema is the contract they depend on.              │
//! │                                                                         │
//! │  Events are immutable once built. Publish failures are logged and      │
//! │  swallowed - they never roll back the transition that produced them.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::Order;

/// Source tag stamped on every event this service emits.
pub const EVENT_SOURCE: &str = "ORDER_SERVICE";

// =============================================================================
// Event Type
// =============================================================================

/// The kind of lifecycle transition an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventType {
    OrderCreated,
    OrderConfirmed,
    /// Internal seller-audit event; not a customer notification.
    OrderProcessing,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
}

impl OrderEventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderEventType::OrderCreated => "ORDER_CREATED",
            OrderEventType::OrderConfirmed => "ORDER_CONFIRMED",
            OrderEventType::OrderProcessing => "ORDER_PROCESSING",
            OrderEventType::OrderShipped => "ORDER_SHIPPED",
            OrderEventType::OrderDelivered => "ORDER_DELIVERED",
            OrderEventType::OrderCancelled => "ORDER_CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Event Record
// =============================================================================

/// An immutable record of a committed order transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_type: OrderEventType,
    pub order_id: String,
    pub order_number: String,
    pub user_id: String,
    pub customer_email: String,
    /// Order status after the transition.
    pub order_status: String,
    pub total_cents: i64,
    pub currency: String,
    /// Free-form extras (tracking number, cancellation reason, ...).
    /// BTreeMap keeps serialization order stable.
    pub data: BTreeMap<String, Value>,
    /// Always [`EVENT_SOURCE`].
    pub source: String,
    /// Fresh per event; lets consumers correlate retries.
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    /// Builds an event snapshot from an order after a transition.
    pub fn for_order(event_type: OrderEventType, order: &Order) -> Self {
        OrderEvent {
            event_type,
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            user_id: order.user_id.clone(),
            customer_email: order.customer_email.clone(),
            order_status: order.status.as_str().to_string(),
            total_cents: order.pricing.total_cents,
            currency: order.pricing.currency.clone(),
            data: BTreeMap::new(),
            source: EVENT_SOURCE.to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Attaches an entry to the event's data bag.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Address, OrderPricing, OrderStatus, OrderTimestamps, PaymentStatus,
    };

    fn order() -> Order {
        let addr = Address {
            street: "1 Market St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62704".to_string(),
            country: "US".to_string(),
        };
        Order {
            id: "order-1".to_string(),
            order_number: "ORD-000001".to_string(),
            user_id: "user-1".to_string(),
            customer_email: "jo@example.com".to_string(),
            customer_name: "Jo Customer".to_string(),
            items: Vec::new(),
            pricing: OrderPricing {
                subtotal_cents: 6000,
                tax_cents: 600,
                shipping_cents: 0,
                discount_cents: 0,
                total_cents: 6600,
                currency: "USD".to_string(),
            },
            shipping_address: addr.clone(),
            billing_address: addr,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            timestamps: OrderTimestamps::default(),
            tracking: None,
            cancellation: None,
            payment_transaction_id: "txn_12345678".to_string(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_snapshots_order_fields() {
        let event = OrderEvent::for_order(OrderEventType::OrderCreated, &order());

        assert_eq!(event.order_id, "order-1");
        assert_eq!(event.order_number, "ORD-000001");
        assert_eq!(event.order_status, "PENDING");
        assert_eq!(event.total_cents, 6600);
        assert_eq!(event.source, EVENT_SOURCE);
        assert!(!event.correlation_id.is_empty());
    }

    #[test]
    fn test_correlation_ids_are_fresh() {
        let o = order();
        let a = OrderEvent::for_order(OrderEventType::OrderCreated, &o);
        let b = OrderEvent::for_order(OrderEventType::OrderCreated, &o);
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn test_with_data() {
        let event = OrderEvent::for_order(OrderEventType::OrderShipped, &order())
            .with_data("tracking_number", "TRK-42")
            .with_data("carrier", "FastShip");

        assert_eq!(event.data["tracking_number"], "TRK-42");
        assert_eq!(event.data["carrier"], "FastShip");
    }

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&OrderEventType::OrderCancelled).unwrap();
        assert_eq!(json, "\"ORDER_CANCELLED\"");
        assert_eq!(OrderEventType::OrderCreated.to_string(), "ORDER_CREATED");
    }
}
