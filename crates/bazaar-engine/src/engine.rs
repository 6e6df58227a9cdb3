//! # Order Lifecycle Engine
//!
//! The order state machine and its orchestration.
//!
//! ## Transition Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   PENDING ──► CONFIRMED ──► PROCESSING ──► SHIPPED ──► DELIVERED       │
//! │      │            │             │                          │           │
//! │      │            │             │                          ▼           │
//! │      └────────────┴─────────────┴──► CANCELLED         COMPLETED       │
//! │                                                                         │
//! │   Each transition:                                                      │
//! │   1. loads the order and checks actor permissions                       │
//! │   2. consults the transition table (bazaar-core::lifecycle)             │
//! │   3. claims the move with a status-guarded update (loser → Conflict)    │
//! │   4. applies stock side effects (commit on confirm, restore on          │
//! │      paid-order cancel)                                                 │
//! │   5. publishes the event, best-effort                                   │
//! │                                                                         │
//! │   Claiming the row BEFORE moving stock means a racing cancel and        │
//! │   confirm can never both apply their stock effects.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bazaar_core::{
    format_order_number, pricing, validation, Address, CancellationActor, CancellationInfo,
    CancellationReason, Order, OrderEvent, OrderEventType, OrderItem, OrderStats, OrderStatus,
    OrderTimestamps, PaymentStatus, RefundStatus, TrackingInfo, ValidationError,
    ORDER_SEQUENCE_DOMAIN, UNKNOWN_SELLER_NAME,
};
use bazaar_db::Store;

use crate::config::EngineConfig;
use crate::error::{OrderError, OrderResult};
use crate::events::{EventBus, EventPublisher};
use crate::ledger::StockLedger;
use crate::reservations::ReservationManager;

/// Days until estimated delivery, counted from shipping.
const ESTIMATED_DELIVERY_DAYS: i64 = 7;

/// Checkout request: everything needed to turn a cart into an order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub user_id: String,
    /// Contact snapshot, frozen onto the order.
    pub customer_email: String,
    pub customer_name: String,
    pub shipping_address: Address,
    /// Defaults to the shipping address when absent.
    pub billing_address: Option<Address>,
    /// Opaque gateway reference; format-validated only.
    pub payment_transaction_id: String,
    pub notes: Option<String>,
}

/// Orchestrates the order lifecycle over a store and an event bus.
#[derive(Clone)]
pub struct OrderEngine {
    store: Arc<dyn Store>,
    ledger: StockLedger,
    reservations: ReservationManager,
    publisher: Arc<EventPublisher>,
}

impl OrderEngine {
    pub fn new(store: Arc<dyn Store>, bus: Arc<dyn EventBus>, config: EngineConfig) -> Self {
        let ledger = StockLedger::new(store.clone());
        let reservations = ReservationManager::new(store.clone(), config.cart_reservation_ttl);
        let publisher = Arc::new(EventPublisher::new(bus, config.event_topic));
        OrderEngine {
            store,
            ledger,
            reservations,
            publisher,
        }
    }

    /// The reservation manager this engine shares with cart maintenance.
    pub fn reservations(&self) -> &ReservationManager {
        &self.reservations
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Converts the user's cart into a PENDING order.
    ///
    /// ## Flow
    /// 1. Validate inputs and the cart's availability (non-mutating)
    /// 2. Freeze cart lines into order items (seller name resolved now)
    /// 3. Price, number, and persist the order
    /// 4. Promote cart holds to order holds, clear the cart
    /// 5. Emit ORDER_CREATED
    ///
    /// A failure after the order row lands is compensated by deleting it;
    /// no partial order is ever observable.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_from_cart(&self, request: CreateOrderRequest) -> OrderResult<Order> {
        validation::validate_payment_transaction_id(&request.payment_transaction_id)?;
        validation::validate_address(&request.shipping_address)?;
        if let Some(billing) = &request.billing_address {
            validation::validate_address(billing)?;
        }

        let cart = self
            .store
            .get_cart(&request.user_id)
            .await?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                OrderError::InvalidInput(ValidationError::Required {
                    field: "cart".to_string(),
                })
            })?;

        let product_ids: Vec<String> = cart.items.iter().map(|i| i.product_id.clone()).collect();
        let quantities: Vec<i64> = cart.items.iter().map(|i| i.quantity).collect();
        self.reservations
            .validate_cart(&request.user_id, &product_ids, &quantities)
            .await?;

        // Re-acquire the cart's holds before freezing the order. A hold
        // whose TTL lapsed while the shopper dawdled would otherwise be
        // missing at promotion time even though stock is still available;
        // quantities are absolute, so live holds just get their TTL
        // refreshed.
        for (product_id, &quantity) in product_ids.iter().zip(&quantities) {
            self.reservations
                .reserve_for_cart(&request.user_id, product_id, quantity)
                .await?;
        }

        // Freeze lines. Prices froze at add-to-cart time; seller identity
        // resolves now.
        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let product = self
                .store
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| OrderError::not_found("Product", &line.product_id))?;
            let seller_name = match self.store.get_seller(&product.seller_id).await? {
                Some(seller) => seller.company_name,
                None => UNKNOWN_SELLER_NAME.to_string(),
            };
            items.push(OrderItem {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                description: line.description.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.line_total().cents(),
                seller_id: product.seller_id,
                seller_name,
            });
        }

        let order_pricing = pricing::calculate(&items);
        let seq = self.store.next_sequence(ORDER_SEQUENCE_DOMAIN).await?;
        let now = Utc::now();

        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: format_order_number(seq),
            user_id: request.user_id.clone(),
            customer_email: request.customer_email,
            customer_name: request.customer_name,
            items,
            pricing: order_pricing,
            billing_address: request
                .billing_address
                .unwrap_or_else(|| request.shipping_address.clone()),
            shipping_address: request.shipping_address,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            timestamps: OrderTimestamps::default(),
            tracking: None,
            cancellation: None,
            payment_transaction_id: request.payment_transaction_id,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_order(&order).await?;

        // Everything past the insert compensates by removing the order
        // (and any holds already retagged to it).
        if let Err(e) = self
            .reservations
            .promote_cart_to_order(&request.user_id, &product_ids, &order.id)
            .await
        {
            self.compensate_failed_checkout(&order).await;
            return Err(e);
        }

        if let Err(e) = self.store.clear_cart(&request.user_id).await {
            self.compensate_failed_checkout(&order).await;
            return Err(e.into());
        }

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_cents = order.pricing.total_cents,
            "Order created"
        );

        self.publisher
            .publish(OrderEvent::for_order(OrderEventType::OrderCreated, &order))
            .await;

        Ok(order)
    }

    /// Best-effort rollback of a checkout that failed after insert.
    async fn compensate_failed_checkout(&self, order: &Order) {
        if let Err(e) = self.reservations.release_all(&order.id).await {
            warn!(order_id = %order.id, ?e, "Checkout compensation: releasing holds failed");
        }
        if let Err(e) = self.store.delete_order(&order.id).await {
            warn!(order_id = %order.id, ?e, "Checkout compensation: deleting order failed");
        }
    }

    // =========================================================================
    // Lifecycle Transitions
    // =========================================================================

    /// Confirms a PENDING order: commits stock, marks payment PAID.
    /// Owner-only.
    #[instrument(skip(self))]
    pub async fn confirm(&self, order_id: &str, user_id: &str) -> OrderResult<Order> {
        let order = self.load(order_id).await?;

        if order.user_id != user_id {
            return Err(OrderError::forbidden("only the owner can confirm an order"));
        }
        check_transition(&order, OrderStatus::Confirmed)?;

        // Re-check availability against durable stock before committing.
        // The order's own holds guarantee effective availability, but
        // durable stock may have drifted since reservation.
        for item in &order.items {
            let product = self
                .store
                .get_product(&item.product_id)
                .await?
                .ok_or_else(|| OrderError::not_found("Product", &item.product_id))?;
            if product.stock_count < item.quantity {
                return Err(OrderError::InsufficientInventory {
                    product_id: item.product_id.clone(),
                    available: product.stock_count,
                    requested: item.quantity,
                });
            }
        }

        let mut updated = order.clone();
        updated.status = OrderStatus::Confirmed;
        updated.payment_status = PaymentStatus::Paid;
        updated.timestamps.confirmed = Some(Utc::now());
        updated.updated_at = Utc::now();

        // Claim the transition first; a racing cancel sees Conflict and
        // neither side double-applies stock effects.
        self.store
            .update_order_if_status(&updated, OrderStatus::Pending)
            .await?;

        self.ledger.commit(&updated).await?;
        // The commit supersedes the order holds.
        self.reservations.release_all(&updated.id).await?;

        info!(order_id = %updated.id, "Order confirmed");
        self.publisher
            .publish(OrderEvent::for_order(
                OrderEventType::OrderConfirmed,
                &updated,
            ))
            .await;

        Ok(updated)
    }

    /// Marks a CONFIRMED order as in preparation by one of its sellers.
    #[instrument(skip(self, notes))]
    pub async fn process(
        &self,
        order_id: &str,
        seller_email: &str,
        notes: Option<&str>,
    ) -> OrderResult<Order> {
        let order = self.load(order_id).await?;
        let seller = self.seller_of_record(&order, seller_email).await?;
        check_transition(&order, OrderStatus::Processing)?;

        let mut updated = order;
        updated.status = OrderStatus::Processing;
        updated.timestamps.processed = Some(Utc::now());
        updated.updated_at = Utc::now();
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            let entry = format!("Processing Notes: {}", notes.trim());
            updated.notes = Some(match updated.notes.take() {
                Some(existing) => format!("{existing}\n{entry}"),
                None => entry,
            });
        }

        self.store
            .update_order_if_status(&updated, OrderStatus::Confirmed)
            .await?;

        info!(order_id = %updated.id, seller_id = %seller.id, "Order processing");
        self.publisher
            .publish(OrderEvent::for_order(
                OrderEventType::OrderProcessing,
                &updated,
            ))
            .await;

        Ok(updated)
    }

    /// Ships a PROCESSING order: attaches tracking with a 7-day estimate.
    #[instrument(skip(self))]
    pub async fn ship(
        &self,
        order_id: &str,
        tracking_number: &str,
        carrier: &str,
        seller_email: &str,
    ) -> OrderResult<Order> {
        if tracking_number.trim().is_empty() {
            return Err(OrderError::InvalidInput(ValidationError::Required {
                field: "tracking_number".to_string(),
            }));
        }

        let order = self.load(order_id).await?;
        let seller = self.seller_of_record(&order, seller_email).await?;
        check_transition(&order, OrderStatus::Shipped)?;

        let now = Utc::now();
        let mut updated = order;
        updated.status = OrderStatus::Shipped;
        updated.timestamps.shipped = Some(now);
        updated.updated_at = now;
        updated.tracking = Some(TrackingInfo {
            tracking_number: tracking_number.trim().to_string(),
            carrier: carrier.trim().to_string(),
            shipped_at: now,
            estimated_delivery: now + ChronoDuration::days(ESTIMATED_DELIVERY_DAYS),
            actual_delivery: None,
            received_by: None,
        });

        self.store
            .update_order_if_status(&updated, OrderStatus::Processing)
            .await?;

        info!(order_id = %updated.id, seller_id = %seller.id, tracking_number, "Order shipped");
        let event = OrderEvent::for_order(OrderEventType::OrderShipped, &updated)
            .with_data("tracking_number", tracking_number.trim())
            .with_data("carrier", carrier.trim());
        self.publisher.publish(event).await;

        Ok(updated)
    }

    /// Records delivery of a SHIPPED order.
    #[instrument(skip(self))]
    pub async fn deliver(&self, order_id: &str, received_by: &str) -> OrderResult<Order> {
        let order = self.load(order_id).await?;
        check_transition(&order, OrderStatus::Delivered)?;

        let now = Utc::now();
        let mut updated = order;
        updated.status = OrderStatus::Delivered;
        updated.timestamps.delivered = Some(now);
        updated.updated_at = now;
        if let Some(tracking) = updated.tracking.as_mut() {
            tracking.actual_delivery = Some(now);
            tracking.received_by = Some(received_by.to_string());
        }

        self.store
            .update_order_if_status(&updated, OrderStatus::Shipped)
            .await?;

        info!(order_id = %updated.id, received_by, "Order delivered");
        self.publisher
            .publish(OrderEvent::for_order(
                OrderEventType::OrderDelivered,
                &updated,
            ))
            .await;

        Ok(updated)
    }

    /// Cancels a cancellable order on the owner's behalf.
    #[instrument(skip(self, details))]
    pub async fn cancel(
        &self,
        order_id: &str,
        user_id: &str,
        reason: CancellationReason,
        details: Option<String>,
    ) -> OrderResult<Order> {
        let order = self.load(order_id).await?;
        if order.user_id != user_id {
            return Err(OrderError::forbidden("only the owner can cancel an order"));
        }
        self.cancel_order(
            order,
            CancellationActor::User,
            Some(user_id.to_string()),
            reason,
            details,
        )
        .await
    }

    /// Cancellation on behalf of the reaper. Reason is fixed.
    pub async fn cancel_as_system(&self, order_id: &str) -> OrderResult<Order> {
        let order = self.load(order_id).await?;
        self.cancel_order(
            order,
            CancellationActor::System,
            None,
            CancellationReason::SystemTimeout,
            Some("Order automatically cancelled due to timeout".to_string()),
        )
        .await
    }

    /// The one cancellation path. Every canceller converges here so the
    /// stock and reservation effects can't diverge.
    async fn cancel_order(
        &self,
        order: Order,
        actor: CancellationActor,
        actor_id: Option<String>,
        reason: CancellationReason,
        details: Option<String>,
    ) -> OrderResult<Order> {
        check_transition(&order, OrderStatus::Cancelled)?;

        let was_paid = order.payment_status == PaymentStatus::Paid;
        let previous_status = order.status;
        let now = Utc::now();

        let mut updated = order;
        updated.status = OrderStatus::Cancelled;
        updated.timestamps.cancelled = Some(now);
        updated.updated_at = now;
        updated.cancellation = Some(CancellationInfo {
            reason,
            details,
            cancelled_by: actor,
            cancelled_by_id: actor_id,
            cancelled_at: now,
            refund_status: RefundStatus::Pending,
            refund_amount_cents: updated.pricing.total_cents,
            // Settlement (hold release + paid-order restock) is owed
            // until the settle write below lands.
            stock_restored: false,
        });

        // Claim the transition before touching stock; a racing confirm
        // that wins makes this a Conflict instead of a double-restore.
        self.store
            .update_order_if_status(&updated, previous_status)
            .await?;

        // Settle atomically: drop holds, restock if payment reached PAID,
        // mark the record settled. On failure the order stays CANCELLED
        // with settlement owed and the repair sweep retries it; the
        // restore is never silently lost.
        match self.store.settle_cancelled_order(&updated).await {
            Ok(()) => {
                if let Some(info) = updated.cancellation.as_mut() {
                    info.stock_restored = true;
                }
            }
            Err(e) => {
                warn!(
                    order_id = %updated.id,
                    ?e,
                    "Cancellation settlement failed, repair sweep will retry"
                );
            }
        }

        info!(
            order_id = %updated.id,
            actor = %actor.as_str(),
            restored_stock = was_paid,
            "Order cancelled"
        );
        let event = OrderEvent::for_order(OrderEventType::OrderCancelled, &updated)
            .with_data("reason", serde_json::json!(reason))
            .with_data("cancelled_by", actor.as_str());
        self.publisher.publish(event).await;

        Ok(updated)
    }

    /// Back-office entry point: any transition the table allows, without
    /// owner/seller checks. Cancellation routes through the full cancel
    /// path so stock effects still apply.
    #[instrument(skip(self))]
    pub async fn admin_set_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
    ) -> OrderResult<Order> {
        let order = self.load(order_id).await?;
        check_transition(&order, new_status)?;

        match new_status {
            OrderStatus::Cancelled => {
                return self
                    .cancel_order(
                        order,
                        CancellationActor::Admin,
                        None,
                        CancellationReason::Other,
                        Some("Cancelled by administrator".to_string()),
                    )
                    .await;
            }
            OrderStatus::Confirmed => {
                // Confirmation has stock side effects; reuse them rather
                // than stamping the status bare.
                let user_id = order.user_id.clone();
                return self.confirm(order_id, &user_id).await;
            }
            _ => {}
        }

        let previous_status = order.status;
        let now = Utc::now();
        let mut updated = order;
        updated.status = new_status;
        updated.updated_at = now;

        let event_type = match new_status {
            OrderStatus::Processing => {
                updated.timestamps.processed = Some(now);
                Some(OrderEventType::OrderProcessing)
            }
            OrderStatus::Shipped => {
                updated.timestamps.shipped = Some(now);
                Some(OrderEventType::OrderShipped)
            }
            OrderStatus::Delivered => {
                updated.timestamps.delivered = Some(now);
                if let Some(tracking) = updated.tracking.as_mut() {
                    tracking.actual_delivery = Some(now);
                }
                Some(OrderEventType::OrderDelivered)
            }
            // Completion closes the order quietly.
            OrderStatus::Completed => {
                updated.timestamps.completed = Some(now);
                None
            }
            _ => None,
        };

        self.store
            .update_order_if_status(&updated, previous_status)
            .await?;

        info!(order_id = %updated.id, status = %new_status, "Admin status change");
        if let Some(event_type) = event_type {
            self.publisher
                .publish(OrderEvent::for_order(event_type, &updated))
                .await;
        }

        Ok(updated)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets an order by ID.
    pub async fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.load(order_id).await
    }

    /// Gets an order by business number.
    pub async fn get_order_by_number(&self, order_number: &str) -> OrderResult<Order> {
        self.store
            .get_order_by_number(order_number)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_number))
    }

    /// A customer's orders, newest first.
    pub async fn list_orders_for_user(&self, user_id: &str) -> OrderResult<Vec<Order>> {
        Ok(self.store.list_orders_by_user(user_id).await?)
    }

    /// Orders containing a seller's items, newest first. Seller resolved
    /// by contact email.
    pub async fn list_orders_for_seller(&self, seller_email: &str) -> OrderResult<Vec<Order>> {
        let seller = self
            .store
            .get_seller_by_email(seller_email)
            .await?
            .ok_or_else(|| OrderError::not_found("Seller", seller_email))?;
        Ok(self.store.list_orders_by_seller(&seller.id).await?)
    }

    /// Aggregate order statistics.
    pub async fn order_stats(&self) -> OrderResult<OrderStats> {
        Ok(self.store.order_stats().await?)
    }

    /// Orders eligible for the reaper as of the cutoff.
    pub(crate) async fn stale_orders(
        &self,
        cutoff: chrono::DateTime<Utc>,
    ) -> OrderResult<Vec<Order>> {
        Ok(self.store.find_stale_orders(cutoff).await?)
    }

    /// Cancelled orders still owing their hold release / restock.
    pub(crate) async fn unsettled_cancellations(&self) -> OrderResult<Vec<Order>> {
        Ok(self.store.find_unsettled_cancellations().await?)
    }

    /// Retries a cancellation's settlement. Atomic and marker-gated, so
    /// repeated attempts never double-restore.
    pub(crate) async fn settle_cancellation(&self, order: &Order) -> OrderResult<()> {
        Ok(self.store.settle_cancelled_order(order).await?)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn load(&self, order_id: &str) -> OrderResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    /// Resolves a seller by email and checks they own a line in the order.
    async fn seller_of_record(
        &self,
        order: &Order,
        seller_email: &str,
    ) -> OrderResult<bazaar_core::Seller> {
        let seller = self
            .store
            .get_seller_by_email(seller_email)
            .await?
            .ok_or_else(|| OrderError::not_found("Seller", seller_email))?;
        if !order.has_seller(&seller.id) {
            return Err(OrderError::forbidden(
                "seller has no line items in this order",
            ));
        }
        Ok(seller)
    }
}

/// Table check shared by every transition.
fn check_transition(order: &Order, target: OrderStatus) -> OrderResult<()> {
    if !order.status.can_transition_to(target) {
        return Err(OrderError::InvalidTransition {
            from: order.status,
            to: target,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryBus;
    use crate::testutil;
    use bazaar_db::MemoryStore;
    use chrono::Duration;

    struct Harness {
        store: Arc<MemoryStore>,
        bus: Arc<InMemoryBus>,
        engine: OrderEngine,
        carts: crate::cart::CartService,
    }

    async fn harness() -> Harness {
        harness_with_stock(10).await
    }

    async fn harness_with_stock(stock: i64) -> Harness {
        testutil::init_tracing();
        let store = testutil::seeded_store(3000, stock).await;
        let bus = Arc::new(InMemoryBus::new());
        let engine = OrderEngine::new(store.clone(), bus.clone(), EngineConfig::default());
        let carts =
            crate::cart::CartService::new(store.clone(), engine.reservations().clone());
        Harness {
            store,
            bus,
            engine,
            carts,
        }
    }

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: "u1".to_string(),
            customer_email: "jo@example.com".to_string(),
            customer_name: "Jo Customer".to_string(),
            shipping_address: testutil::address(),
            billing_address: None,
            payment_transaction_id: "txn_12345678".to_string(),
            notes: None,
        }
    }

    /// Cart with 2 × $30 → subtotal $60, tax $6, free shipping, total $66.
    async fn checkout(h: &Harness) -> Order {
        h.carts.add_item("u1", "p1", 2).await.unwrap();
        h.engine.create_from_cart(request()).await.unwrap()
    }

    fn event_types(h: &Harness) -> Vec<OrderEventType> {
        h.bus.sent().iter().map(|(_, _, e)| e.event_type).collect()
    }

    #[tokio::test]
    async fn test_checkout_prices_and_numbers_the_order() {
        let h = harness().await;
        let order = checkout(&h).await;

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.order_number, "ORD-000001");
        assert_eq!(order.pricing.subtotal_cents, 6000);
        assert_eq!(order.pricing.tax_cents, 600);
        assert_eq!(order.pricing.shipping_cents, 0);
        assert_eq!(order.pricing.total_cents, 6600);
        assert_eq!(order.items[0].seller_name, "s1 Trading Co");
        // Billing defaulted to shipping.
        assert_eq!(order.billing_address, order.shipping_address);

        // Cart is gone, hold is promoted, durable stock untouched.
        assert!(h.store.get_cart("u1").await.unwrap().unwrap().is_empty());
        let held = h
            .store
            .get_reservation("u1", "p1", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(held.order_id.as_deref(), Some(order.id.as_str()));
        assert!(held.expires_at.is_none());
        assert_eq!(h.store.get_product("p1").await.unwrap().unwrap().stock_count, 10);

        assert_eq!(event_types(&h), vec![OrderEventType::OrderCreated]);
    }

    #[tokio::test]
    async fn test_checkout_requires_a_cart() {
        let h = harness().await;
        let err = h.engine.create_from_cart(request()).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_checkout_recovers_a_lapsed_cart_hold() {
        let h = harness().await;
        h.carts.add_item("u1", "p1", 2).await.unwrap();

        // Let the shopper's hold lapse while stock is still plentiful.
        h.store
            .reserve(
                "u1",
                "p1",
                2,
                bazaar_core::ReservationKind::Cart,
                Some(Utc::now() - ChronoDuration::minutes(1)),
            )
            .await
            .unwrap();
        assert_eq!(h.store.available_stock("p1", Utc::now()).await.unwrap(), 10);

        // Checkout re-acquires the hold instead of failing on the
        // missing one.
        let order = h.engine.create_from_cart(request()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let held = h
            .store
            .get_reservation("u1", "p1", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(held.order_id.as_deref(), Some(order.id.as_str()));
    }

    #[tokio::test]
    async fn test_checkout_rejects_bad_transaction_id() {
        let h = harness().await;
        h.carts.add_item("u1", "p1", 1).await.unwrap();

        let mut req = request();
        req.payment_transaction_id = "bad id!".to_string();
        let err = h.engine.create_from_cart(req).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_confirm_commits_stock_and_pays() {
        let h = harness().await;
        let order = checkout(&h).await;

        let confirmed = h.engine.confirm(&order.id, "u1").await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert!(confirmed.timestamps.confirmed.is_some());

        // Stock committed, hold released: availability equals stock.
        let product = h.store.get_product("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 8);
        assert_eq!(h.store.available_stock("p1", Utc::now()).await.unwrap(), 8);

        assert_eq!(
            event_types(&h),
            vec![OrderEventType::OrderCreated, OrderEventType::OrderConfirmed]
        );
    }

    #[tokio::test]
    async fn test_confirm_is_owner_only() {
        let h = harness().await;
        let order = checkout(&h).await;

        let err = h.engine.confirm(&order.id, "intruder").await.unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_confirm_after_cancel_is_invalid_transition() {
        let h = harness().await;
        let order = checkout(&h).await;

        h.engine
            .cancel(&order.id, "u1", CancellationReason::CustomerRequest, None)
            .await
            .unwrap();

        let err = h.engine.confirm(&order.id, "u1").await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed
            }
        ));

        // Order unchanged by the failed attempt.
        let stored = h.engine.get_order(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(stored.timestamps.confirmed.is_none());
    }

    #[tokio::test]
    async fn test_cancel_before_payment_restores_nothing() {
        let h = harness().await;
        let order = checkout(&h).await;

        let cancelled = h
            .engine
            .cancel(&order.id, "u1", CancellationReason::CustomerRequest, None)
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let info = cancelled.cancellation.unwrap();
        assert_eq!(info.cancelled_by, CancellationActor::User);
        assert_eq!(info.refund_status, RefundStatus::Pending);
        assert_eq!(info.refund_amount_cents, 6600);
        assert!(info.stock_restored);

        // Nothing was committed, so durable stock never moved; the hold
        // is released so availability is back to full.
        let product = h.store.get_product("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 10);
        assert_eq!(h.store.available_stock("p1", Utc::now()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_cancel_after_payment_restores_committed_stock() {
        let h = harness().await;
        let order = checkout(&h).await;
        h.engine.confirm(&order.id, "u1").await.unwrap();

        let cancelled = h
            .engine
            .cancel(&order.id, "u1", CancellationReason::CustomerRequest, None)
            .await
            .unwrap();

        let product = h.store.get_product("p1").await.unwrap().unwrap();
        assert_eq!(product.stock_count, 10);
        assert!(cancelled.cancellation.unwrap().stock_restored);

        assert_eq!(
            event_types(&h),
            vec![
                OrderEventType::OrderCreated,
                OrderEventType::OrderConfirmed,
                OrderEventType::OrderCancelled
            ]
        );
    }

    #[tokio::test]
    async fn test_full_fulfillment_flow() {
        let h = harness().await;
        let order = checkout(&h).await;

        h.engine.confirm(&order.id, "u1").await.unwrap();
        let processed = h
            .engine
            .process(&order.id, "seller@widget.example", Some("packing today"))
            .await
            .unwrap();
        assert_eq!(processed.status, OrderStatus::Processing);
        assert_eq!(
            processed.notes.as_deref(),
            Some("Processing Notes: packing today")
        );

        let shipped = h
            .engine
            .ship(&order.id, "TRK-42", "FastShip", "seller@widget.example")
            .await
            .unwrap();
        let tracking = shipped.tracking.as_ref().unwrap();
        assert_eq!(tracking.tracking_number, "TRK-42");
        assert_eq!(
            tracking.estimated_delivery - tracking.shipped_at,
            Duration::days(7)
        );

        let delivered = h.engine.deliver(&order.id, "Jo Customer").await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(
            delivered.tracking.as_ref().unwrap().received_by.as_deref(),
            Some("Jo Customer")
        );

        let completed = h
            .engine
            .admin_set_status(&order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert!(completed.timestamps.completed.is_some());

        // Completion emits no event.
        assert_eq!(
            event_types(&h),
            vec![
                OrderEventType::OrderCreated,
                OrderEventType::OrderConfirmed,
                OrderEventType::OrderProcessing,
                OrderEventType::OrderShipped,
                OrderEventType::OrderDelivered,
            ]
        );
    }

    #[tokio::test]
    async fn test_process_requires_seller_of_record() {
        let h = harness().await;
        let order = checkout(&h).await;
        h.engine.confirm(&order.id, "u1").await.unwrap();

        h.store
            .insert_seller(&testutil::seller("s2", "other@seller.example"))
            .await
            .unwrap();

        let err = h
            .engine
            .process(&order.id, "other@seller.example", None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));

        let err = h
            .engine
            .process(&order.id, "ghost@seller.example", None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_shipped_orders_cannot_be_cancelled() {
        let h = harness().await;
        let order = checkout(&h).await;
        h.engine.confirm(&order.id, "u1").await.unwrap();
        h.engine
            .process(&order.id, "seller@widget.example", None)
            .await
            .unwrap();
        h.engine
            .ship(&order.id, "TRK-1", "FastShip", "seller@widget.example")
            .await
            .unwrap();

        let err = h
            .engine
            .cancel(&order.id, "u1", CancellationReason::CustomerRequest, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_admin_cancel_routes_through_stock_restore() {
        let h = harness().await;
        let order = checkout(&h).await;
        h.engine.confirm(&order.id, "u1").await.unwrap();

        let cancelled = h
            .engine
            .admin_set_status(&order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let info = cancelled.cancellation.unwrap();
        assert_eq!(info.cancelled_by, CancellationActor::Admin);
        assert_eq!(
            h.store.get_product("p1").await.unwrap().unwrap().stock_count,
            10
        );
    }

    #[tokio::test]
    async fn test_admin_rejects_table_misses() {
        let h = harness().await;
        let order = checkout(&h).await;

        let err = h
            .engine
            .admin_set_status(&order.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_order_numbers_are_sequential() {
        let h = harness().await;
        let first = checkout(&h).await;

        h.carts.add_item("u1", "p1", 1).await.unwrap();
        let second = h.engine.create_from_cart(request()).await.unwrap();

        assert_eq!(first.order_number, "ORD-000001");
        assert_eq!(second.order_number, "ORD-000002");
    }

    #[tokio::test]
    async fn test_queries_and_stats() {
        let h = harness().await;
        let order = checkout(&h).await;

        assert_eq!(
            h.engine.get_order_by_number("ORD-000001").await.unwrap().id,
            order.id
        );
        assert_eq!(h.engine.list_orders_for_user("u1").await.unwrap().len(), 1);
        assert_eq!(
            h.engine
                .list_orders_for_seller("seller@widget.example")
                .await
                .unwrap()
                .len(),
            1
        );

        let stats = h.engine.order_stats().await.unwrap();
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.total_revenue_cents, 6600);
    }
}
