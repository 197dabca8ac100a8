//! rovel/crates/domains/src/lib.rs
//!
//! The central domain model and interface definitions for Rovel.

pub mod error;
pub mod models;
pub mod ports;
pub mod title;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
pub use title::normalize_title;
