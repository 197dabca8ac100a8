//! # services
//!
//! Application logic on top of the `ContentStore` port: id assignment,
//! chapter bookkeeping, the aggregate view, the ad gate, guest users, the ad
//! config singleton and startup seeding.

pub mod ad_gate;
pub mod ads;
pub mod aggregate;
pub mod bootstrap;
pub mod context;
pub mod ledger;
pub mod registry;
pub mod users;

pub use ad_gate::{AdGate, CompletionOutcome};
pub use ads::AdsConfigService;
pub use aggregate::AggregateView;
pub use bootstrap::{seed_if_empty, SeedReport};
pub use context::{AppContext, ContextOptions};
pub use ledger::ChapterLedger;
pub use registry::WorkRegistry;
pub use users::UserDirectory;
