use std::sync::Arc;

use domains::ContentStore;

use crate::ad_gate::AdGate;
use crate::ads::AdsConfigService;
use crate::aggregate::AggregateView;
use crate::ledger::ChapterLedger;
use crate::registry::WorkRegistry;
use crate::users::UserDirectory;

/// Tunables the binary maps from its settings.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Total insert attempts per work creation when ids collide.
    pub create_attempts: u32,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self { create_attempts: 3 }
    }
}

/// The process-wide handle every request works through. It owns the only
/// shared mutable state (the aggregate snapshot and the ad-gate flags), both
/// empty until the first write or rebuild.
pub struct AppContext {
    pub store: Arc<dyn ContentStore>,
    pub aggregate: Arc<AggregateView>,
    pub works: WorkRegistry,
    pub chapters: ChapterLedger,
    pub ad_gate: AdGate,
    pub users: UserDirectory,
    pub ads: AdsConfigService,
}

impl AppContext {
    pub fn new(store: Arc<dyn ContentStore>, options: ContextOptions) -> Self {
        let aggregate = Arc::new(AggregateView::new(Arc::clone(&store)));
        let works = WorkRegistry::new(
            Arc::clone(&store),
            Arc::clone(&aggregate),
            options.create_attempts,
        );
        let chapters = ChapterLedger::new(Arc::clone(&store), works.clone(), Arc::clone(&aggregate));

        Self {
            aggregate,
            works,
            chapters,
            ad_gate: AdGate::new(Arc::clone(&store)),
            users: UserDirectory::new(Arc::clone(&store)),
            ads: AdsConfigService::new(Arc::clone(&store)),
            store,
        }
    }
}
