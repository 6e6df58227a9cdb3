//! # Order Lifecycle Rules
//!
//! The order status transition table. This is the single source of truth for
//! which status moves are legal; the engine consults it before every write.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PENDING ──► CONFIRMED ──► PROCESSING ──► SHIPPED ──► DELIVERED        │
//! │     │             │             │                          │            │
//! │     │             │             │                          ▼            │
//! │     └─────────────┴─────────────┴──► CANCELLED        COMPLETED        │
//! │                                       (terminal)       (terminal)      │
//! │                                                                         │
//! │  Any move not drawn above is an invalid transition.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::types::OrderStatus;

impl OrderStatus {
    /// Statuses this status may legally move to.
    ///
    /// Terminal statuses return an empty slice.
    pub const fn allowed_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered => &[OrderStatus::Completed],
            OrderStatus::Completed => &[],
            OrderStatus::Cancelled => &[],
        }
    }

    /// Checks whether moving from `self` to `target` is allowed.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Cancellable = {PENDING, CONFIRMED, PROCESSING}.
    #[inline]
    pub const fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// Shipped family = {SHIPPED, DELIVERED, COMPLETED}.
    #[inline]
    pub const fn is_shipped(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Completed
        )
    }

    /// Final = {DELIVERED, COMPLETED, CANCELLED}.
    #[inline]
    pub const fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// Terminal = no outgoing transitions at all.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
