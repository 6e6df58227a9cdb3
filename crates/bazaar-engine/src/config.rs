//! # Engine Configuration

use std::time::Duration;

/// Tunables for the order engine.
///
/// ## Example
/// ```rust,ignore
/// let config = EngineConfig::default()
///     .cart_reservation_ttl(Duration::from_secs(15 * 60));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a cart hold blocks other shoppers before it lapses.
    /// Default: 30 minutes.
    pub cart_reservation_ttl: Duration,

    /// Topic order events are published to.
    /// Default: "order-events".
    pub event_topic: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cart_reservation_ttl: Duration::from_secs(30 * 60),
            event_topic: "order-events".to_string(),
        }
    }
}

impl EngineConfig {
    /// Sets the cart reservation TTL.
    pub fn cart_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.cart_reservation_ttl = ttl;
        self
    }

    /// Sets the event topic.
    pub fn event_topic(mut self, topic: impl Into<String>) -> Self {
        self.event_topic = topic.into();
        self
    }
}
