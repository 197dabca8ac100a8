//! # In-memory `ContentStore`
//!
//! One concurrent map per collection. Every operation touches a single map
//! entry, which gives the same single-document atomicity a document
//! database provides; there are no multi-document transactions. The one
//! exception is work insertion, which first claims the id in a map shared by
//! both kinds so manga and novels never share an id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    AdsConfig, AppError, Chapter, ChapterBody, ChapterKey, ContentStore, Result, User, Work,
    WorkKind, WorkPatch,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    manga: DashMap<i64, Work>,
    novels: DashMap<i64, Work>,
    /// Owner of every live work id, across both kinds.
    work_ids: DashMap<i64, WorkKind>,
    chapters: DashMap<ChapterKey, ChapterBody>,
    users: DashMap<String, User>,
    ads_config: RwLock<Option<AdsConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn works(&self, kind: WorkKind) -> &DashMap<i64, Work> {
        match kind {
            WorkKind::Manga => &self.manga,
            WorkKind::Novel => &self.novels,
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_work(&self, kind: WorkKind, id: i64) -> Result<Option<Work>> {
        Ok(self.works(kind).get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_works(&self, kind: WorkKind) -> Result<Vec<Work>> {
        let mut works: Vec<Work> = self
            .works(kind)
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        works.sort_by_key(|work| work.id);
        Ok(works)
    }

    async fn max_work_id(&self, kind: WorkKind) -> Result<Option<i64>> {
        Ok(self.works(kind).iter().map(|entry| *entry.key()).max())
    }

    async fn insert_work(&self, work: Work) -> Result<()> {
        match self.work_ids.entry(work.id) {
            Entry::Occupied(owner) => Err(AppError::DuplicateKey(format!(
                "work id {} already taken by a {}",
                work.id,
                owner.get()
            ))),
            Entry::Vacant(claim) => {
                // the claim guard is held until the work is visible
                let claim = claim.insert(work.kind);
                self.works(work.kind).insert(work.id, work);
                drop(claim);
                Ok(())
            }
        }
    }

    async fn update_work(&self, kind: WorkKind, id: i64, patch: &WorkPatch) -> Result<bool> {
        match self.works(kind).get_mut(&id) {
            Some(mut entry) => {
                entry.apply_patch(patch)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_chapters_count(&self, kind: WorkKind, id: i64, count: u64) -> Result<bool> {
        match self.works(kind).get_mut(&id) {
            Some(mut entry) => {
                entry.chapters_count = count;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_work(&self, kind: WorkKind, id: i64) -> Result<bool> {
        if self.works(kind).remove(&id).is_none() {
            return Ok(false);
        }
        self.work_ids.remove_if(&id, |_, owner| *owner == kind);
        Ok(true)
    }

    async fn count_works(&self, kind: WorkKind) -> Result<u64> {
        Ok(self.works(kind).len() as u64)
    }

    async fn find_chapter(&self, key: &ChapterKey) -> Result<Option<Chapter>> {
        Ok(self.chapters.get(key).map(|entry| Chapter {
            key: key.clone(),
            body: entry.value().clone(),
        }))
    }

    async fn list_chapters(&self, normalized_title: &str) -> Result<Vec<Chapter>> {
        let mut chapters: Vec<Chapter> = self
            .chapters
            .iter()
            .filter(|entry| entry.key().normalized_title == normalized_title)
            .map(|entry| Chapter {
                key: entry.key().clone(),
                body: entry.value().clone(),
            })
            .collect();
        chapters.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(chapters)
    }

    async fn insert_chapter(&self, chapter: Chapter) -> Result<()> {
        match self.chapters.entry(chapter.key) {
            Entry::Occupied(slot) => Err(AppError::DuplicateKey(format!(
                "chapter {} already exists",
                slot.key()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(chapter.body);
                Ok(())
            }
        }
    }

    async fn replace_chapter(&self, key: &ChapterKey, body: ChapterBody) -> Result<bool> {
        match self.chapters.get_mut(key) {
            Some(mut entry) => {
                *entry = body;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_chapter(&self, key: &ChapterKey) -> Result<bool> {
        Ok(self.chapters.remove(key).is_some())
    }

    async fn count_chapters(&self, normalized_title: &str) -> Result<u64> {
        Ok(self
            .chapters
            .iter()
            .filter(|entry| entry.key().normalized_title == normalized_title)
            .count() as u64)
    }

    async fn count_all_chapters(&self) -> Result<u64> {
        Ok(self.chapters.len() as u64)
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        match self.users.entry(user.id.clone()) {
            Entry::Occupied(slot) => Err(AppError::DuplicateKey(format!(
                "user {} already exists",
                slot.key()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(())
            }
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn touch_user(&self, id: &str, seen_at: DateTime<Utc>) -> Result<bool> {
        match self.users.get_mut(id) {
            Some(mut entry) => {
                entry.last_seen = Some(seen_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: &str) -> Result<bool> {
        Ok(self.users.remove(id).is_some())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.users.len() as u64)
    }

    async fn load_ads_config(&self) -> Result<Option<AdsConfig>> {
        Ok(self.ads_config.read().await.clone())
    }

    async fn save_ads_config(&self, config: AdsConfig) -> Result<()> {
        *self.ads_config.write().await = Some(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn work(id: i64, title: &str, kind: WorkKind) -> Work {
        Work {
            id,
            title: title.to_string(),
            kind,
            chapters_count: 0,
            created_at: None,
            extra: Default::default(),
        }
    }

    fn chapter(title: &str, id: &str) -> Chapter {
        Chapter {
            key: ChapterKey::new(title, id),
            body: ChapterBody {
                title: format!("Chapter {id}"),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn insert_routes_by_kind_and_rejects_duplicates() {
        let store = MemoryStore::new();
        store.insert_work(work(1, "A", WorkKind::Manga)).await.unwrap();
        store.insert_work(work(2, "B", WorkKind::Novel)).await.unwrap();

        assert!(store.find_work(WorkKind::Manga, 1).await.unwrap().is_some());
        assert!(store.find_work(WorkKind::Novel, 1).await.unwrap().is_none());
        assert_eq!(store.max_work_id(WorkKind::Novel).await.unwrap(), Some(2));

        let err = store
            .insert_work(work(1, "A again", WorkKind::Manga))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(store.find_work(WorkKind::Manga, 1).await.unwrap().unwrap().title, "A");
    }

    #[tokio::test]
    async fn concurrent_inserts_of_one_id_have_a_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let (left, right) = tokio::join!(
            store.insert_work(work(7, "Left", WorkKind::Manga)),
            store.insert_work(work(7, "Right", WorkKind::Manga)),
        );
        let outcomes = [left, right];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(e) if e.is_duplicate_key()))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn work_ids_are_unique_across_kinds() {
        let store = Arc::new(MemoryStore::new());
        let (manga, novel) = tokio::join!(
            store.insert_work(work(3, "Manga", WorkKind::Manga)),
            store.insert_work(work(3, "Novel", WorkKind::Novel)),
        );
        assert_eq!([&manga, &novel].iter().filter(|r| r.is_ok()).count(), 1);
        assert!(manga.err().or(novel.err()).unwrap().is_duplicate_key());
        let total = store.count_works(WorkKind::Manga).await.unwrap()
            + store.count_works(WorkKind::Novel).await.unwrap();
        assert_eq!(total, 1);

        // deleting frees the id for either kind
        let (owner, other) = match store.find_work(WorkKind::Manga, 3).await.unwrap() {
            Some(_) => (WorkKind::Manga, WorkKind::Novel),
            None => (WorkKind::Novel, WorkKind::Manga),
        };
        assert!(!store.delete_work(other, 3).await.unwrap());
        assert!(store.delete_work(owner, 3).await.unwrap());
        store.insert_work(work(3, "Reborn", other)).await.unwrap();
    }

    #[tokio::test]
    async fn update_merges_and_reports_misses_without_side_effects() {
        let store = MemoryStore::new();
        store.insert_work(work(1, "A", WorkKind::Manga)).await.unwrap();

        let patch = WorkPatch::try_from(json!({"title": "A2", "cover": "a.png"})).unwrap();
        assert!(store.update_work(WorkKind::Manga, 1, &patch).await.unwrap());
        assert!(!store.update_work(WorkKind::Novel, 1, &patch).await.unwrap());

        let stored = store.find_work(WorkKind::Manga, 1).await.unwrap().unwrap();
        assert_eq!(stored.title, "A2");
        assert_eq!(stored.extra["cover"], "a.png");
        assert_eq!(store.count_works(WorkKind::Novel).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn chapters_are_unique_per_title_and_id() {
        let store = MemoryStore::new();
        store.insert_chapter(chapter("my-manga", "1")).await.unwrap();
        store.insert_chapter(chapter("my-manga", "2")).await.unwrap();
        store.insert_chapter(chapter("other", "1")).await.unwrap();

        assert!(store
            .insert_chapter(chapter("my-manga", "1"))
            .await
            .unwrap_err()
            .is_duplicate_key());
        assert_eq!(store.count_chapters("my-manga").await.unwrap(), 2);
        assert_eq!(store.count_all_chapters().await.unwrap(), 3);

        let listed = store.list_chapters("my-manga").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.key.chapter_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);

        let key = ChapterKey::new("my-manga", "2");
        let replaced = ChapterBody {
            title: "Two".into(),
            ..Default::default()
        };
        assert!(store.replace_chapter(&key, replaced).await.unwrap());
        assert_eq!(store.find_chapter(&key).await.unwrap().unwrap().body.title, "Two");
        assert!(store.delete_chapter(&key).await.unwrap());
        assert!(!store.delete_chapter(&key).await.unwrap());
    }

    #[tokio::test]
    async fn users_and_config_round_trip() {
        let store = MemoryStore::new();
        let guest = User::guest(Some("test-agent"), Utc::now());
        let id = guest.id.clone();
        store.insert_user(guest.clone()).await.unwrap();
        assert!(store.insert_user(guest).await.unwrap_err().is_duplicate_key());

        let later = Utc::now() + chrono::Duration::minutes(5);
        assert!(store.touch_user(&id, later).await.unwrap());
        assert!(!store.touch_user("nobody", later).await.unwrap());
        assert_eq!(store.list_users().await.unwrap()[0].last_seen, Some(later));
        assert!(store.delete_user(&id).await.unwrap());
        assert_eq!(store.count_users().await.unwrap(), 0);

        assert_eq!(store.load_ads_config().await.unwrap(), None);
        store.save_ads_config(AdsConfig::default()).await.unwrap();
        assert_eq!(store.load_ads_config().await.unwrap(), Some(AdsConfig::default()));
    }
}
