//! # Repository Module
//!
//! SQLite repository implementations for the Bazaar order core.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Engine Operation                                                       │
//! │       │                                                                 │
//! │       │  db.orders().get_by_id(order_id)                                │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  OrderRepository                                                        │
//! │  ├── insert(&self, order)                                               │
//! │  ├── get_by_id(&self, id)                                               │
//! │  ├── update_if_status(&self, order, expected)  ← guarded write         │
//! │  └── find_stale(&self, cutoff)                                          │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place                                         │
//! │  • The engine talks to the `Store` trait, never to SQL                  │
//! │  • Can swap in the in-memory store for tests                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog reads and durable stock writes
//! - [`seller::SellerRepository`] - Seller directory lookups
//! - [`cart::CartRepository`] - One-cart-per-user persistence
//! - [`reservation::ReservationRepository`] - Atomic stock holds
//! - [`order::OrderRepository`] - Order aggregate persistence
//! - [`sequence::SequenceRepository`] - Monotonic order-number sequences

pub mod cart;
pub mod order;
pub mod product;
pub mod reservation;
pub mod seller;
pub mod sequence;
