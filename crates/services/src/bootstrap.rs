//! # Bootstrap
//!
//! Loads seed data into collections that are empty at startup:
//!
//! - `manga.json`, `novels.json`, `users.json`: arrays of records
//! - `chapters.json`: `{ normalizedTitle: { chapterId: {title, pages, content} } }`
//! - `ads-config.json`: a single object
//!
//! A missing file counts as empty. A file or record that does not parse is
//! logged and skipped so a bad seed never keeps the server down; store
//! failures are returned to the caller.

use std::collections::BTreeMap;
use std::path::Path;

use domains::{AdsConfig, Chapter, ChapterBody, ChapterKey, ContentStore, Result, User, Work, WorkKind};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// What each collection received during seeding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub manga: usize,
    pub novels: usize,
    pub chapters: usize,
    pub users: usize,
    pub ads_config: bool,
}

type ChapterSeed = BTreeMap<String, BTreeMap<String, Value>>;

pub async fn seed_if_empty(store: &dyn ContentStore, seed_dir: &Path) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (kind, file) in [(WorkKind::Manga, "manga.json"), (WorkKind::Novel, "novels.json")] {
        if store.count_works(kind).await? > 0 {
            continue;
        }
        let Some(records) = read_seed::<Vec<Map<String, Value>>>(&seed_dir.join(file)).await else {
            continue;
        };
        let mut inserted = 0;
        for mut record in records {
            // the collection decides the type
            record.insert("type".to_string(), Value::String(kind.as_str().to_string()));
            match serde_json::from_value::<Work>(Value::Object(record)) {
                Ok(work) => inserted += insert_seed(store.insert_work(work).await, file)?,
                Err(err) => tracing::warn!(file, error = %err, "skipping malformed work seed"),
            }
        }
        match kind {
            WorkKind::Manga => report.manga = inserted,
            WorkKind::Novel => report.novels = inserted,
        }
        tracing::info!(%kind, inserted, "work collection seeded");
    }

    if store.count_all_chapters().await? == 0 {
        if let Some(seed) = read_seed::<ChapterSeed>(&seed_dir.join("chapters.json")).await {
            for (normalized_title, chapters) in seed {
                for (chapter_id, raw) in chapters {
                    let key = ChapterKey::new(normalized_title.clone(), chapter_id);
                    match serde_json::from_value::<ChapterBody>(raw) {
                        Ok(body) => {
                            let outcome = store.insert_chapter(Chapter { key, body }).await;
                            report.chapters += insert_seed(outcome, "chapters.json")?;
                        }
                        Err(err) => {
                            tracing::warn!(chapter = %key, error = %err, "skipping malformed chapter seed")
                        }
                    }
                }
            }
            tracing::info!(inserted = report.chapters, "chapter collection seeded");
        }
    }

    if store.count_users().await? == 0 {
        if let Some(records) = read_seed::<Vec<Value>>(&seed_dir.join("users.json")).await {
            for record in records {
                match serde_json::from_value::<User>(record) {
                    Ok(user) => report.users += insert_seed(store.insert_user(user).await, "users.json")?,
                    Err(err) => tracing::warn!(error = %err, "skipping malformed user seed"),
                }
            }
            tracing::info!(inserted = report.users, "user collection seeded");
        }
    }

    if store.load_ads_config().await?.is_none() {
        if let Some(doc) = read_seed::<Map<String, Value>>(&seed_dir.join("ads-config.json")).await {
            // an empty object carries nothing beyond the defaults
            if !doc.is_empty() {
                match serde_json::from_value::<AdsConfig>(Value::Object(doc)) {
                    Ok(config) => {
                        store.save_ads_config(config).await?;
                        report.ads_config = true;
                        tracing::info!("ads config seeded");
                    }
                    Err(err) => tracing::warn!(error = %err, "skipping malformed ads config seed"),
                }
            }
        }
    }

    Ok(report)
}

/// Duplicate ids inside a seed file are skipped; other failures propagate.
fn insert_seed(outcome: Result<()>, file: &str) -> Result<usize> {
    match outcome {
        Ok(()) => Ok(1),
        Err(err) if err.is_duplicate_key() => {
            tracing::warn!(file, error = %err, "skipping duplicate seed record");
            Ok(0)
        }
        Err(err) => Err(err),
    }
}

async fn read_seed<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no seed file");
            return None;
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot read seed file");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot parse seed file");
            None
        }
    }
}
