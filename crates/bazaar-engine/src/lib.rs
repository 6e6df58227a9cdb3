//! # Bazaar Engine
//!
//! Order fulfillment core: carts, stock holds, checkout, and the order
//! lifecycle state machine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         bazaar-engine                                   │
//! │                                                                         │
//! │  ┌──────────────┐      ┌─────────────────────┐      ┌───────────────┐  │
//! │  │ CartService  │─────►│ ReservationManager  │─────►│  StockLedger  │  │
//! │  │              │      │                     │      │               │  │
//! │  │ add / update │      │ TTL'd cart holds,   │      │ availability, │  │
//! │  │ clear        │      │ promote to order    │      │ commit,       │  │
//! │  └──────────────┘      └─────────────────────┘      │ restore       │  │
//! │          │                       ▲                  └───────┬───────┘  │
//! │          ▼                       │                          │          │
//! │  ┌─────────────────────────────────────────────┐            │          │
//! │  │                 OrderEngine                 │◄───────────┘          │
//! │  │                                             │                       │
//! │  │  create_from_cart → confirm → process →     │      ┌─────────────┐  │
//! │  │  ship → deliver → complete  (or cancel)     │─────►│EventPublisher│ │
//! │  └─────────────────────────────────────────────┘      └─────────────┘  │
//! │          ▲                                                             │
//! │          │ cancel_as_system                                            │
//! │  ┌───────┴──────────┐                                                  │
//! │  │ StaleOrderReaper │  interval sweep over unshipped orders            │
//! │  └──────────────────┘                                                  │
//! │                                                                         │
//! │  Persistence goes through the bazaar-db Store trait; either the         │
//! │  SQLite Database or the MemoryStore plugs in.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cart;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod reaper;
pub mod reservations;

#[cfg(test)]
pub(crate) mod testutil;

pub use cart::CartService;
pub use config::EngineConfig;
pub use engine::{CreateOrderRequest, OrderEngine};
pub use error::{OrderError, OrderResult};
pub use events::{BusError, EventBus, EventPublisher, InMemoryBus};
pub use ledger::StockLedger;
pub use reaper::{ReaperConfig, ReaperHandle, StaleOrderReaper};
pub use reservations::ReservationManager;
