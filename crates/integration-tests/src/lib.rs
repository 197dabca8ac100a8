//! Shared harness for the end-to-end tests.
//!
//! - `contracts`: behaviour every `ContentStore` adapter must share
//! - `TestApp` (feature `web-axum`): the HTTP surface over a store

pub mod contracts;

#[cfg(feature = "web-axum")]
mod app;

#[cfg(feature = "web-axum")]
pub use app::TestApp;
