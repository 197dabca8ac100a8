//! # Aggregate View
//!
//! The union of every work, manga first. Rebuilt from the store after each
//! mutation and before each aggregate read; readers between rebuilds get the
//! last snapshot. Rebuilds replace the snapshot wholesale, so concurrent
//! rebuilds resolve as last-writer-wins.

use std::sync::Arc;

use domains::{ContentStore, Result, Work, WorkKind};
use tokio::sync::RwLock;

pub struct AggregateView {
    store: Arc<dyn ContentStore>,
    snapshot: RwLock<Arc<Vec<Work>>>,
}

impl AggregateView {
    /// Starts empty; nothing is read until the first rebuild.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub async fn rebuild(&self) -> Result<Arc<Vec<Work>>> {
        let (manga, novels) = tokio::try_join!(
            self.store.list_works(WorkKind::Manga),
            self.store.list_works(WorkKind::Novel),
        )?;

        let mut works = manga;
        works.extend(novels);
        let works = Arc::new(works);

        *self.snapshot.write().await = Arc::clone(&works);
        tracing::debug!(works = works.len(), "aggregate view rebuilt");
        Ok(works)
    }

    pub async fn snapshot(&self) -> Arc<Vec<Work>> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Post-write rebuild. The write is already committed, so a failure here
    /// only leaves the snapshot stale until the next rebuild.
    pub(crate) async fn refresh(&self) {
        if let Err(err) = self.rebuild().await {
            tracing::warn!(error = %err, "aggregate view rebuild failed after write");
        }
    }
}
