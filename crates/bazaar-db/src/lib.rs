//! # bazaar-db: Storage Layer for the Bazaar Order Core
//!
//! This crate provides persistence for the order core. Production runs on
//! SQLite via sqlx; tests and embedded callers can use the in-memory store.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bazaar Order Core Data Flow                        │
//! │                                                                         │
//! │  Engine operation (checkout, confirm, cancel, reaper sweep)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bazaar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │              Arc<dyn Store>  ← the engine's seam                │   │
//! │  │              ┌───────┴────────┐                                 │   │
//! │  │              ▼                ▼                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  MemoryStore  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (memory.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool +  │    │ Mutex<State>  │    │ 0001_*.sql   │  │   │
//! │  │   │ repositories  │    │ for tests     │    │ 0002_*.sql   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage error types
//! - [`store`] - The `Store` trait the engine depends on
//! - [`repository`] - SQLite repository implementations
//! - [`memory`] - In-memory `Store` for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig, Store};
//!
//! let db = Database::new(DbConfig::new("path/to/bazaar.db")).await?;
//! let order = db.get_order("uuid-here").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use pool::{Database, DbConfig};
pub use store::{ReserveOutcome, Store};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::reservation::ReservationRepository;
pub use repository::seller::SellerRepository;
pub use repository::sequence::SequenceRepository;
