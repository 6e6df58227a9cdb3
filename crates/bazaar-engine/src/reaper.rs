//! # Stale-Order Reaper
//!
//! Background sweep that cancels abandoned orders so their stock goes
//! back on sale.
//!
//! ## Sweep Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Stale-Order Reaper                                 │
//! │                                                                         │
//! │  every `interval`:                                                      │
//! │                                                                         │
//! │  1. cutoff = now - timeout                  (default: 1 hour)           │
//! │                                                                         │
//! │  2. SELECT orders WHERE status IN                                       │
//! │       (PENDING, CONFIRMED, PROCESSING)                                  │
//! │     AND created_at <= cutoff                                            │
//! │                                                                         │
//! │  3. for each: engine.cancel_as_system(id)                               │
//! │       - actor SYSTEM, reason SYSTEM_TIMEOUT                             │
//! │       - releases holds, restores stock if the order was paid            │
//! │       - emits ORDER_CANCELLED                                           │
//! │                                                                         │
//! │  One order's failure never stops the sweep; the stragglers are          │
//! │  retried on the next tick.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::OrderEngine;
use crate::error::{OrderError, OrderResult};

// =============================================================================
// Configuration
// =============================================================================

/// Reaper tunables.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// How often the sweep runs. Default: 60 seconds.
    pub interval: Duration,

    /// How old an unshipped order must be before it is reaped.
    /// Default: 1 hour.
    pub timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        ReaperConfig {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl ReaperConfig {
    /// Sets the sweep interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the staleness timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Reaper
// =============================================================================

/// Cancels orders stuck before shipment for longer than the timeout.
pub struct StaleOrderReaper {
    engine: OrderEngine,
    config: ReaperConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a running reaper.
#[derive(Clone)]
pub struct ReaperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ReaperHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> OrderResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| OrderError::internal("reaper shutdown channel closed"))
    }
}

impl StaleOrderReaper {
    /// Creates a reaper and its control handle.
    pub fn new(engine: OrderEngine, config: ReaperConfig) -> (Self, ReaperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let reaper = StaleOrderReaper {
            engine,
            config,
            shutdown_rx,
        };

        (reaper, ReaperHandle { shutdown_tx })
    }

    /// Runs the reaper loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            timeout_secs = self.config.timeout.as_secs(),
            "Stale-order reaper starting"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(?e, "Stale-order sweep failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Stale-order reaper shutting down");
                    break;
                }
            }
        }

        info!("Stale-order reaper stopped");
    }

    /// One sweep: reap orders past the timeout, then settle any
    /// cancellations whose hold release / restock is still owed.
    async fn sweep(&self) -> OrderResult<()> {
        self.reap_stale().await?;
        self.repair_unsettled().await
    }

    async fn reap_stale(&self) -> OrderResult<()> {
        let timeout = ChronoDuration::from_std(self.config.timeout)
            .map_err(|e| OrderError::internal(format!("reaper timeout out of range: {e}")))?;
        let cutoff = Utc::now() - timeout;

        let stale = self.engine.stale_orders(cutoff).await?;
        if stale.is_empty() {
            debug!("No stale orders");
            return Ok(());
        }

        info!(count = stale.len(), "Reaping stale orders");

        for order in stale {
            match self.engine.cancel_as_system(&order.id).await {
                Ok(_) => {
                    info!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        status = %order.status,
                        "Stale order cancelled"
                    );
                }
                // Keep sweeping; this order is retried next tick.
                Err(e) => {
                    warn!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        ?e,
                        "Failed to cancel stale order"
                    );
                }
            }
        }

        Ok(())
    }

    /// Finishes cancellations whose settlement failed after the status
    /// was claimed. Settlement is atomic and marker-gated, so retrying
    /// here can never double-restore stock.
    async fn repair_unsettled(&self) -> OrderResult<()> {
        let unsettled = self.engine.unsettled_cancellations().await?;
        if unsettled.is_empty() {
            return Ok(());
        }

        info!(count = unsettled.len(), "Settling pending cancellations");

        for order in unsettled {
            match self.engine.settle_cancellation(&order).await {
                Ok(()) => {
                    info!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        "Cancellation settled"
                    );
                }
                Err(e) => {
                    warn!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        ?e,
                        "Failed to settle cancellation"
                    );
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
