//! # Event Publishing
//!
//! The bus seam and the fire-and-forget publisher.
//!
//! ## Publishing Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Event Publishing                                    │
//! │                                                                         │
//! │  transition commits ──► EventPublisher::publish(event)                  │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                    bus.send(topic, key = order_id, event)               │
//! │                              │                                          │
//! │              ┌───────────────┴──────────────┐                          │
//! │              ▼                              ▼                          │
//! │          Ok(())                        Err(BusError)                    │
//! │          debug log                     error log, SWALLOWED             │
//! │                                                                         │
//! │  Event delivery is best-effort. A dead broker must never fail or        │
//! │  roll back the order transition that already committed.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error};

use bazaar_core::OrderEvent;

/// Transport-level publish failure.
#[derive(Debug, Error)]
#[error("Event bus send failed: {0}")]
pub struct BusError(pub String);

/// Outbound event transport.
///
/// Keyed sends let the transport preserve per-order ordering.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn send(&self, topic: &str, key: &str, event: &OrderEvent) -> Result<(), BusError>;
}

/// Bus double that records every event it receives. For tests and
/// embedded use without a broker.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    sent: Mutex<Vec<(String, String, OrderEvent)>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        InMemoryBus::default()
    }

    /// Snapshot of everything sent so far, as (topic, key, event).
    pub fn sent(&self) -> Vec<(String, String, OrderEvent)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn send(&self, topic: &str, key: &str, event: &OrderEvent) -> Result<(), BusError> {
        self.sent
            .lock()
            .map_err(|_| BusError("bus lock poisoned".to_string()))?
            .push((topic.to_string(), key.to_string(), event.clone()));
        Ok(())
    }
}

/// Publishes order events to a topic, swallowing transport failures.
pub struct EventPublisher {
    bus: std::sync::Arc<dyn EventBus>,
    topic: String,
}

impl EventPublisher {
    pub fn new(bus: std::sync::Arc<dyn EventBus>, topic: impl Into<String>) -> Self {
        EventPublisher {
            bus,
            topic: topic.into(),
        }
    }

    /// Best-effort publish keyed by order id.
    ///
    /// Failures are logged and dropped; the transition this event
    /// describes has already committed.
    pub async fn publish(&self, event: OrderEvent) {
        match self.bus.send(&self.topic, &event.order_id, &event).await {
            Ok(()) => {
                debug!(
                    event_type = %event.event_type,
                    order_id = %event.order_id,
                    correlation_id = %event.correlation_id,
                    "Published order event"
                );
            }
            Err(e) => {
                error!(
                    ?e,
                    event_type = %event.event_type,
                    order_id = %event.order_id,
                    "Failed to publish order event; continuing"
                );
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{
        Address, Order, OrderEventType, OrderPricing, OrderStatus, OrderTimestamps, PaymentStatus,
    };
    use chrono::Utc;
    use std::sync::Arc;

    /// Bus that always fails, for exercising the swallow path.
    struct FailingBus;

    #[async_trait]
    impl EventBus for FailingBus {
        async fn send(&self, _: &str, _: &str, _: &OrderEvent) -> Result<(), BusError> {
            Err(BusError("broker unreachable".to_string()))
        }
    }

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
            user_id: "u1".to_string(),
            customer_email: "jo@example.com".to_string(),
            customer_name: "Jo".to_string(),
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

    #[tokio::test]
    async fn test_publish_records_topic_and_key() {
        let bus = Arc::new(InMemoryBus::new());
        let publisher = EventPublisher::new(bus.clone(), "order-events");

        publisher
            .publish(OrderEvent::for_order(OrderEventType::OrderCreated, &order()))
            .await;

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "order-events");
        assert_eq!(sent[0].1, "order-1");
        assert_eq!(sent[0].2.event_type, OrderEventType::OrderCreated);
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let publisher = EventPublisher::new(Arc::new(FailingBus), "order-events");

        // Must not panic or propagate the bus failure.
        publisher
            .publish(OrderEvent::for_order(OrderEventType::OrderCancelled, &order()))
            .await;
    }
}
