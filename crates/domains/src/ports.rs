//! # Core Traits (Ports)
//!
//! Any storage adapter must implement this trait to back the services.
//! Uniqueness is the adapter's job: `id` for works and users, the
//! `(normalizedTitle, chapterId)` pair for chapters. Violations surface as
//! `AppError::DuplicateKey`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AdsConfig, Chapter, ChapterBody, ChapterKey, User, Work, WorkKind, WorkPatch};

/// Document persistence contract for works, chapters, users and ad config.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    // Work Operations
    async fn find_work(&self, kind: WorkKind, id: i64) -> Result<Option<Work>>;
    /// All works of one kind, ordered by ascending id.
    async fn list_works(&self, kind: WorkKind) -> Result<Vec<Work>>;
    /// Highest id in the collection, `None` when empty.
    async fn max_work_id(&self, kind: WorkKind) -> Result<Option<i64>>;
    /// Inserts into the collection named by `work.kind`.
    async fn insert_work(&self, work: Work) -> Result<()>;
    /// Merges `patch` into the matching work; `false` when nothing matched.
    async fn update_work(&self, kind: WorkKind, id: i64, patch: &WorkPatch) -> Result<bool>;
    async fn set_chapters_count(&self, kind: WorkKind, id: i64, count: u64) -> Result<bool>;
    async fn delete_work(&self, kind: WorkKind, id: i64) -> Result<bool>;
    async fn count_works(&self, kind: WorkKind) -> Result<u64>;

    // Chapter Operations
    async fn find_chapter(&self, key: &ChapterKey) -> Result<Option<Chapter>>;
    async fn list_chapters(&self, normalized_title: &str) -> Result<Vec<Chapter>>;
    async fn insert_chapter(&self, chapter: Chapter) -> Result<()>;
    /// Overwrites title, pages and content; `false` when the key is absent.
    async fn replace_chapter(&self, key: &ChapterKey, body: ChapterBody) -> Result<bool>;
    async fn delete_chapter(&self, key: &ChapterKey) -> Result<bool>;
    async fn count_chapters(&self, normalized_title: &str) -> Result<u64>;
    async fn count_all_chapters(&self) -> Result<u64>;

    // User Operations
    async fn insert_user(&self, user: User) -> Result<()>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Sets `last_seen`; `false` when no user has this id.
    async fn touch_user(&self, id: &str, seen_at: DateTime<Utc>) -> Result<bool>;
    async fn delete_user(&self, id: &str) -> Result<bool>;
    async fn count_users(&self) -> Result<u64>;

    // Config Operations
    async fn load_ads_config(&self) -> Result<Option<AdsConfig>>;
    /// Creates the singleton on first write, replaces it afterwards.
    async fn save_ads_config(&self, config: AdsConfig) -> Result<()>;
}
