//! # Work Registry
//!
//! Owns the shared id space of manga and novels and resolves works by id
//! across both collections.

use std::sync::Arc;

use chrono::Utc;
use domains::{normalize_title, AppError, ContentStore, NewWork, Result, Work, WorkKind, WorkPatch};

use crate::aggregate::AggregateView;

#[derive(Clone)]
pub struct WorkRegistry {
    store: Arc<dyn ContentStore>,
    view: Arc<AggregateView>,
    create_attempts: u32,
}

impl WorkRegistry {
    pub fn new(store: Arc<dyn ContentStore>, view: Arc<AggregateView>, create_attempts: u32) -> Self {
        Self {
            store,
            view,
            create_attempts: create_attempts.max(1),
        }
    }

    /// Looks the id up in both collections. The lookups are independent, so
    /// they run concurrently; a manga hit wins over a novel hit.
    pub async fn resolve(&self, id: i64) -> Result<Option<Work>> {
        let (manga, novel) = tokio::try_join!(
            self.store.find_work(WorkKind::Manga, id),
            self.store.find_work(WorkKind::Novel, id),
        )?;
        Ok(manga.or(novel))
    }

    pub async fn get(&self, id: i64) -> Result<Work> {
        self.resolve(id)
            .await?
            .ok_or_else(|| AppError::not_found("Content", id))
    }

    /// `1 + max(id)` over both collections, or 1 when both are empty.
    pub async fn next_id(&self) -> Result<i64> {
        let (manga, novel) = tokio::try_join!(
            self.store.max_work_id(WorkKind::Manga),
            self.store.max_work_id(WorkKind::Novel),
        )?;
        Ok(manga.unwrap_or(0).max(novel.unwrap_or(0)).max(0) + 1)
    }

    /// Assigns an id and inserts into the collection named by the payload
    /// type.
    ///
    /// Two concurrent creates can compute the same id; the store rejects the
    /// loser with `DuplicateKey`, which is retried with a fresh id until
    /// `create_attempts` is spent.
    pub async fn create(&self, payload: NewWork) -> Result<Work> {
        // Chapters left behind by an earlier work with the same title count.
        let chapters_count = self
            .store
            .count_chapters(&normalize_title(&payload.title))
            .await?;

        let mut attempt = 1;
        loop {
            let id = self.next_id().await?;
            let work = payload.clone().into_work(id, Utc::now(), chapters_count);

            match self.store.insert_work(work.clone()).await {
                Ok(()) => {
                    tracing::info!(id, kind = %work.kind, title = %work.title, "work created");
                    self.view.refresh().await;
                    return Ok(work);
                }
                Err(err) if err.is_duplicate_key() && attempt < self.create_attempts => {
                    tracing::warn!(id, attempt, "work id taken by a concurrent create, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Tries the manga collection first, then novels.
    pub async fn update(&self, id: i64, patch: WorkPatch) -> Result<()> {
        if patch.id().is_some_and(|patched| patched != id) {
            return Err(AppError::validation("work id cannot be changed"));
        }

        for kind in WorkKind::ALL {
            if patch.kind().is_some_and(|target| target != kind) {
                if self.store.find_work(kind, id).await?.is_some() {
                    return Err(AppError::validation(format!(
                        "work {id} is a {kind} and cannot change type"
                    )));
                }
                continue;
            }
            if self.store.update_work(kind, id, &patch).await? {
                if let Some(title) = patch.title() {
                    tracing::info!(id, title, "work title changed, chapters stay keyed by the old title");
                }
                self.view.refresh().await;
                return Ok(());
            }
        }
        Err(AppError::not_found("Content", id))
    }

    /// Deletes the work only; its chapters stay in the ledger.
    pub async fn delete(&self, id: i64) -> Result<()> {
        for kind in WorkKind::ALL {
            if self.store.delete_work(kind, id).await? {
                tracing::info!(id, %kind, "work deleted");
                self.view.refresh().await;
                return Ok(());
            }
        }
        Err(AppError::not_found("Content", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use domains::{AdsConfig, Chapter, ChapterBody, ChapterKey, MockContentStore, User};
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use storage_adapters::MemoryStore;

    fn registry_over(store: Arc<dyn ContentStore>, attempts: u32) -> WorkRegistry {
        let view = Arc::new(AggregateView::new(Arc::clone(&store)));
        WorkRegistry::new(store, view, attempts)
    }

    fn payload(value: serde_json::Value) -> NewWork {
        NewWork::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn ids_increase_across_both_kinds() {
        let registry = registry_over(Arc::new(MemoryStore::new()), 3);

        let first = registry
            .create(payload(json!({"title": "My Manga", "type": "manga"})))
            .await
            .unwrap();
        let second = registry
            .create(payload(json!({"title": "A Novel", "type": "novel"})))
            .await
            .unwrap();
        let third = registry
            .create(payload(json!({"title": "Another", "type": "manga"})))
            .await
            .unwrap();

        assert_eq!((first.id, second.id, third.id), (1, 2, 3));
        assert_eq!(second.kind, WorkKind::Novel);
        assert!(first.created_at.is_some());
        assert_eq!(registry.get(2).await.unwrap().title, "A Novel");
    }

    #[tokio::test]
    async fn resolve_prefers_manga_on_id_collision() {
        // legacy data can still hold the same id in both collections
        let mut store = MockContentStore::new();
        store.expect_find_work().returning(|kind, id| {
            Ok((id == 5).then(|| NewWork::new(format!("{kind} five"), kind).into_work(5, Utc::now(), 0)))
        });
        let registry = registry_over(Arc::new(store), 1);
        assert_eq!(registry.get(5).await.unwrap().kind, WorkKind::Manga);
        assert!(matches!(registry.get(6).await, Err(AppError::NotFound(..))));
    }

    /// Yields before answering id lookups so concurrent creates interleave
    /// between reading the max id and inserting.
    struct YieldingStore(MemoryStore);

    #[async_trait::async_trait]
    impl ContentStore for YieldingStore {
        async fn find_work(&self, kind: WorkKind, id: i64) -> Result<Option<Work>> {
            self.0.find_work(kind, id).await
        }
        async fn list_works(&self, kind: WorkKind) -> Result<Vec<Work>> {
            self.0.list_works(kind).await
        }
        async fn max_work_id(&self, kind: WorkKind) -> Result<Option<i64>> {
            let max = self.0.max_work_id(kind).await;
            tokio::task::yield_now().await;
            max
        }
        async fn insert_work(&self, work: Work) -> Result<()> {
            self.0.insert_work(work).await
        }
        async fn update_work(&self, kind: WorkKind, id: i64, patch: &WorkPatch) -> Result<bool> {
            self.0.update_work(kind, id, patch).await
        }
        async fn set_chapters_count(&self, kind: WorkKind, id: i64, count: u64) -> Result<bool> {
            self.0.set_chapters_count(kind, id, count).await
        }
        async fn delete_work(&self, kind: WorkKind, id: i64) -> Result<bool> {
            self.0.delete_work(kind, id).await
        }
        async fn count_works(&self, kind: WorkKind) -> Result<u64> {
            self.0.count_works(kind).await
        }
        async fn find_chapter(&self, key: &ChapterKey) -> Result<Option<Chapter>> {
            self.0.find_chapter(key).await
        }
        async fn list_chapters(&self, normalized_title: &str) -> Result<Vec<Chapter>> {
            self.0.list_chapters(normalized_title).await
        }
        async fn insert_chapter(&self, chapter: Chapter) -> Result<()> {
            self.0.insert_chapter(chapter).await
        }
        async fn replace_chapter(&self, key: &ChapterKey, body: ChapterBody) -> Result<bool> {
            self.0.replace_chapter(key, body).await
        }
        async fn delete_chapter(&self, key: &ChapterKey) -> Result<bool> {
            self.0.delete_chapter(key).await
        }
        async fn count_chapters(&self, normalized_title: &str) -> Result<u64> {
            self.0.count_chapters(normalized_title).await
        }
        async fn count_all_chapters(&self) -> Result<u64> {
            self.0.count_all_chapters().await
        }
        async fn insert_user(&self, user: User) -> Result<()> {
            self.0.insert_user(user).await
        }
        async fn list_users(&self) -> Result<Vec<User>> {
            self.0.list_users().await
        }
        async fn touch_user(&self, id: &str, seen_at: DateTime<Utc>) -> Result<bool> {
            self.0.touch_user(id, seen_at).await
        }
        async fn delete_user(&self, id: &str) -> Result<bool> {
            self.0.delete_user(id).await
        }
        async fn count_users(&self) -> Result<u64> {
            self.0.count_users().await
        }
        async fn load_ads_config(&self) -> Result<Option<AdsConfig>> {
            self.0.load_ads_config().await
        }
        async fn save_ads_config(&self, config: AdsConfig) -> Result<()> {
            self.0.save_ads_config(config).await
        }
    }

    #[tokio::test]
    async fn racing_manga_and_novel_creates_get_distinct_ids() {
        let registry = registry_over(Arc::new(YieldingStore(MemoryStore::new())), 3);

        let (manga, novel) = tokio::join!(
            registry.create(payload(json!({"title": "Race Manga", "type": "manga"}))),
            registry.create(payload(json!({"title": "Race Novel", "type": "novel"}))),
        );
        let (manga, novel) = (manga.unwrap(), novel.unwrap());
        assert_ne!(manga.id, novel.id);

        assert_eq!(registry.get(manga.id).await.unwrap().title, "Race Manga");
        assert_eq!(registry.get(novel.id).await.unwrap().title, "Race Novel");
    }

    #[tokio::test]
    async fn duplicate_key_is_retried_with_a_fresh_id() {
        let max_id = Arc::new(AtomicI64::new(4));
        let inserts = Arc::new(AtomicUsize::new(0));

        let mut store = MockContentStore::new();
        store.expect_count_chapters().returning(|_| Ok(0));
        let seen = Arc::clone(&max_id);
        store.expect_max_work_id().returning(move |kind| match kind {
            WorkKind::Manga => Ok(Some(seen.load(Ordering::SeqCst))),
            WorkKind::Novel => Ok(None),
        });
        let bump = Arc::clone(&max_id);
        let calls = Arc::clone(&inserts);
        store.expect_insert_work().times(2).returning(move |work| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                // a concurrent create landed on the same id first
                bump.store(work.id, Ordering::SeqCst);
                Err(AppError::DuplicateKey(format!("id {} taken", work.id)))
            } else {
                Ok(())
            }
        });
        store.expect_list_works().returning(|_| Ok(Vec::new()));

        let registry = registry_over(Arc::new(store), 3);
        let work = registry
            .create(payload(json!({"title": "Race", "type": "manga"})))
            .await
            .unwrap();
        assert_eq!(work.id, 6);
        assert_eq!(inserts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_attempt_surfaces_duplicate_key() {
        let mut store = MockContentStore::new();
        store.expect_count_chapters().returning(|_| Ok(0));
        store.expect_max_work_id().returning(|_| Ok(None));
        store
            .expect_insert_work()
            .times(1)
            .returning(|work| Err(AppError::DuplicateKey(format!("id {} taken", work.id))));

        let registry = registry_over(Arc::new(store), 1);
        let err = registry
            .create(payload(json!({"title": "Race", "type": "novel"})))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn update_falls_back_to_novels_and_guards_type() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_over(store.clone(), 1);
        let novel = registry
            .create(payload(json!({"title": "Quiet", "type": "novel"})))
            .await
            .unwrap();

        let patch = WorkPatch::try_from(json!({"title": "Quieter", "id": novel.id})).unwrap();
        registry.update(novel.id, patch).await.unwrap();
        assert_eq!(registry.get(novel.id).await.unwrap().title, "Quieter");

        let retype = WorkPatch::try_from(json!({"type": "manga"})).unwrap();
        assert!(matches!(
            registry.update(novel.id, retype).await,
            Err(AppError::ValidationError(_))
        ));

        let rekey = WorkPatch::try_from(json!({"id": 42})).unwrap();
        assert!(matches!(
            registry.update(novel.id, rekey).await,
            Err(AppError::ValidationError(_))
        ));

        let missing = WorkPatch::try_from(json!({"title": "Ghost"})).unwrap();
        assert!(matches!(
            registry.update(99, missing).await,
            Err(AppError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn delete_reports_missing_works() {
        let registry = registry_over(Arc::new(MemoryStore::new()), 1);
        let work = registry
            .create(payload(json!({"title": "Gone", "type": "manga"})))
            .await
            .unwrap();

        registry.delete(work.id).await.unwrap();
        assert!(matches!(
            registry.delete(work.id).await,
            Err(AppError::NotFound(..))
        ));
    }
}
