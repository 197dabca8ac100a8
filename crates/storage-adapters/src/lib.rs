//! # storage-adapters
//!
//! Implementations of the `ContentStore` port.
//!
//! - `MemoryStore`: always compiled, used for local runs and tests.
//! - `PgStore`: PostgreSQL with one JSONB document per row (feature `db-postgres`).

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
