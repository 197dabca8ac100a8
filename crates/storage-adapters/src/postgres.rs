//! # PostgreSQL `ContentStore`
//!
//! Each collection is a table holding the record as a JSONB `doc`, with the
//! record's key columns pulled out so that primary keys enforce uniqueness.
//! Partial work updates use the JSONB `||` merge, which is atomic per row.
//! Work ids are claimed in `work_ids` by the same statement that inserts the
//! work, so one id never lands in both `manga` and `novels`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    AdsConfig, AppError, Chapter, ChapterBody, ChapterKey, ContentStore, Result, User, Work,
    WorkKind, WorkPatch,
};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS manga (id BIGINT PRIMARY KEY, doc JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS novels (id BIGINT PRIMARY KEY, doc JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS work_ids (id BIGINT PRIMARY KEY, kind TEXT NOT NULL)",
    "INSERT INTO work_ids (id, kind) SELECT id, 'manga' FROM manga ON CONFLICT DO NOTHING",
    "INSERT INTO work_ids (id, kind) SELECT id, 'novel' FROM novels ON CONFLICT DO NOTHING",
    "CREATE TABLE IF NOT EXISTS chapters (
        normalized_title TEXT NOT NULL,
        chapter_id TEXT NOT NULL,
        doc JSONB NOT NULL,
        PRIMARY KEY (normalized_title, chapter_id)
    )",
    "CREATE TABLE IF NOT EXISTS users (id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS ads_config (
        singleton BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (singleton),
        doc JSONB NOT NULL
    )",
];

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and creates any missing tables.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(store_error)?;
        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
        }
        tracing::debug!(statements = SCHEMA.len(), "postgres schema ready");
        Ok(())
    }
}

fn table(kind: WorkKind) -> &'static str {
    match kind {
        WorkKind::Manga => "manga",
        WorkKind::Novel => "novels",
    }
}

/// Maps driver failures onto the domain taxonomy.
fn store_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::DuplicateKey(db.message().to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::StoreUnavailable(err.to_string()),
        _ => AppError::Internal(err.to_string()),
    }
}

fn encode<T: serde::Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|err| AppError::Internal(format!("encode document: {err}")))
}

fn to_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or_default()
}

#[async_trait]
impl ContentStore for PgStore {
    async fn find_work(&self, kind: WorkKind, id: i64) -> Result<Option<Work>> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", table(kind));
        let row: Option<Json<Work>> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(|Json(work)| work))
    }

    async fn list_works(&self, kind: WorkKind) -> Result<Vec<Work>> {
        let sql = format!("SELECT doc FROM {} ORDER BY id", table(kind));
        let rows: Vec<Json<Work>> = sqlx::query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(|Json(work)| work).collect())
    }

    async fn max_work_id(&self, kind: WorkKind) -> Result<Option<i64>> {
        let sql = format!("SELECT MAX(id) FROM {}", table(kind));
        sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn insert_work(&self, work: Work) -> Result<()> {
        let sql = format!(
            "WITH claimed AS (INSERT INTO work_ids (id, kind) VALUES ($1, $3) RETURNING id)
             INSERT INTO {} (id, doc) SELECT id, $2::JSONB FROM claimed",
            table(work.kind)
        );
        sqlx::query(&sql)
            .bind(work.id)
            .bind(encode(&work)?)
            .bind(work.kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_work(&self, kind: WorkKind, id: i64, patch: &WorkPatch) -> Result<bool> {
        let sql = format!("UPDATE {} SET doc = doc || $2 WHERE id = $1", table(kind));
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(patch.fields().clone()))
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_chapters_count(&self, kind: WorkKind, id: i64, count: u64) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET doc = jsonb_set(doc, '{{chapters_count}}', to_jsonb($2::BIGINT)) WHERE id = $1",
            table(kind)
        );
        let count = i64::try_from(count)
            .map_err(|_| AppError::Internal(format!("chapter count {count} overflows")))?;
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(count)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_work(&self, kind: WorkKind, id: i64) -> Result<bool> {
        let sql = format!(
            "WITH gone AS (DELETE FROM {} WHERE id = $1 RETURNING id),
                  released AS (DELETE FROM work_ids WHERE id IN (SELECT id FROM gone) AND kind = $2)
             SELECT COUNT(*) FROM gone",
            table(kind)
        );
        let deleted: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(deleted > 0)
    }

    async fn count_works(&self, kind: WorkKind) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table(kind));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(to_count(count))
    }

    async fn find_chapter(&self, key: &ChapterKey) -> Result<Option<Chapter>> {
        let row: Option<Json<Chapter>> = sqlx::query_scalar(
            "SELECT doc FROM chapters WHERE normalized_title = $1 AND chapter_id = $2",
        )
        .bind(&key.normalized_title)
        .bind(&key.chapter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(|Json(chapter)| chapter))
    }

    async fn list_chapters(&self, normalized_title: &str) -> Result<Vec<Chapter>> {
        let rows: Vec<Json<Chapter>> = sqlx::query_scalar(
            "SELECT doc FROM chapters WHERE normalized_title = $1 ORDER BY chapter_id",
        )
        .bind(normalized_title)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(|Json(chapter)| chapter).collect())
    }

    async fn insert_chapter(&self, chapter: Chapter) -> Result<()> {
        sqlx::query("INSERT INTO chapters (normalized_title, chapter_id, doc) VALUES ($1, $2, $3)")
            .bind(&chapter.key.normalized_title)
            .bind(&chapter.key.chapter_id)
            .bind(encode(&chapter)?)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn replace_chapter(&self, key: &ChapterKey, body: ChapterBody) -> Result<bool> {
        let doc = encode(&Chapter {
            key: key.clone(),
            body,
        })?;
        let result = sqlx::query(
            "UPDATE chapters SET doc = $3 WHERE normalized_title = $1 AND chapter_id = $2",
        )
        .bind(&key.normalized_title)
        .bind(&key.chapter_id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_chapter(&self, key: &ChapterKey) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM chapters WHERE normalized_title = $1 AND chapter_id = $2")
                .bind(&key.normalized_title)
                .bind(&key.chapter_id)
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_chapters(&self, normalized_title: &str) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE normalized_title = $1")
                .bind(normalized_title)
                .fetch_one(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(to_count(count))
    }

    async fn count_all_chapters(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(to_count(count))
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, doc) VALUES ($1, $2)")
            .bind(&user.id)
            .bind(encode(&user)?)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<Json<User>> =
            sqlx::query_scalar("SELECT doc FROM users ORDER BY doc->>'created_at', id")
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(rows.into_iter().map(|Json(user)| user).collect())
    }

    async fn touch_user(&self, id: &str, seen_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET doc = jsonb_set(doc, '{last_seen}', $2) WHERE id = $1",
        )
        .bind(id)
        .bind(encode(&seen_at)?)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(to_count(count))
    }

    async fn load_ads_config(&self) -> Result<Option<AdsConfig>> {
        let row: Option<Json<AdsConfig>> =
            sqlx::query_scalar("SELECT doc FROM ads_config WHERE singleton")
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(row.map(|Json(config)| config))
    }

    async fn save_ads_config(&self, config: AdsConfig) -> Result<()> {
        sqlx::query(
            "INSERT INTO ads_config (singleton, doc) VALUES (TRUE, $1)
             ON CONFLICT (singleton) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(encode(&config)?)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }
}
