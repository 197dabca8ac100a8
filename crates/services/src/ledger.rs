//! # Chapter Ledger
//!
//! Chapters are keyed by the owning work's normalized title, never by the
//! work id. A work is always resolved first and its key derived from its
//! current title, so renaming a work orphans the chapters stored under the
//! old title. After every chapter write the owning work's `chapters_count`
//! is recomputed from the ledger.

use std::sync::Arc;

use domains::{
    AppError, Chapter, ChapterBody, ChapterKey, ChapterMap, ChapterUpsert, ContentStore, Result,
    Work,
};

use crate::aggregate::AggregateView;
use crate::registry::WorkRegistry;

#[derive(Clone)]
pub struct ChapterLedger {
    store: Arc<dyn ContentStore>,
    works: WorkRegistry,
    view: Arc<AggregateView>,
}

impl ChapterLedger {
    pub fn new(store: Arc<dyn ContentStore>, works: WorkRegistry, view: Arc<AggregateView>) -> Self {
        Self { store, works, view }
    }

    pub async fn list_for_work(&self, work_id: i64) -> Result<ChapterMap> {
        let work = self.works.get(work_id).await?;
        let chapters = self.store.list_chapters(&work.normalized_title()).await?;
        Ok(chapters
            .into_iter()
            .map(|chapter| (chapter.key.chapter_id, chapter.body))
            .collect())
    }

    /// Adds the chapter or replaces an existing one with the same id.
    /// Returns the work's new chapter count.
    pub async fn upsert(&self, work_id: i64, request: ChapterUpsert) -> Result<u64> {
        let work = self.works.get(work_id).await?;
        let (chapter_id, body) = request.into_parts()?;
        let key = ChapterKey::for_work(&work, chapter_id);

        if self.store.find_chapter(&key).await?.is_some() {
            self.replace(&key, body).await?;
        } else {
            let chapter = Chapter {
                key: key.clone(),
                body: body.clone(),
            };
            match self.store.insert_chapter(chapter).await {
                Ok(()) => tracing::info!(work_id, chapter = %key, "chapter added"),
                // another request inserted the same chapter in between
                Err(err) if err.is_duplicate_key() => self.replace(&key, body).await?,
                Err(err) => return Err(err),
            }
        }

        let count = self.recount(&work).await?;
        self.view.refresh().await;
        Ok(count)
    }

    /// Removes one chapter. Returns the work's new chapter count.
    pub async fn delete(&self, work_id: i64, chapter_id: &str) -> Result<u64> {
        let work = self.works.get(work_id).await?;
        let key = ChapterKey::for_work(&work, chapter_id);

        if !self.store.delete_chapter(&key).await? {
            return Err(AppError::not_found("Chapter", &key));
        }
        tracing::info!(work_id, chapter = %key, "chapter deleted");

        let count = self.recount(&work).await?;
        self.view.refresh().await;
        Ok(count)
    }

    /// Direct lookup by the reader-facing key.
    pub async fn fetch(&self, normalized_title: &str, chapter_id: &str) -> Result<ChapterBody> {
        let key = ChapterKey::new(normalized_title, chapter_id);
        self.store
            .find_chapter(&key)
            .await?
            .map(|chapter| chapter.body)
            .ok_or_else(|| AppError::not_found("Chapter", &key))
    }

    async fn replace(&self, key: &ChapterKey, body: ChapterBody) -> Result<()> {
        if !self.store.replace_chapter(key, body).await? {
            return Err(AppError::not_found("Chapter", key));
        }
        tracing::info!(chapter = %key, "chapter replaced");
        Ok(())
    }

    async fn recount(&self, work: &Work) -> Result<u64> {
        let count = self.store.count_chapters(&work.normalized_title()).await?;
        if !self.store.set_chapters_count(work.kind, work.id, count).await? {
            tracing::warn!(id = work.id, "work vanished before its chapter count was saved");
        }
        Ok(count)
    }
}
