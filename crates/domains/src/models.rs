//! # Domain Models
//!
//! These structs represent the core entities of Rovel. Works carry their
//! free-form display fields in a flattened JSON map so that whatever the
//! admin panel stores round-trips untouched.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::title::normalize_title;

/// Which collection a work lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Manga,
    Novel,
}

impl WorkKind {
    /// Resolution order for id lookups; a manga hit wins over a novel hit.
    pub const ALL: [WorkKind; 2] = [WorkKind::Manga, WorkKind::Novel];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkKind::Manga => "manga",
            WorkKind::Novel => "novel",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "manga" => Ok(WorkKind::Manga),
            "novel" => Ok(WorkKind::Novel),
            other => Err(AppError::validation(format!(
                "unknown work type {other:?}, expected \"manga\" or \"novel\""
            ))),
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manga or novel entry, the top-level content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: WorkKind,
    /// Denormalized count of chapters stored under `normalized_title()`
    #[serde(default)]
    pub chapters_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Display fields (cover, author, description, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Work {
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Merges `patch` into this work. Leaves `self` untouched on error.
    pub fn apply_patch(&mut self, patch: &WorkPatch) -> Result<()> {
        let mut doc = serde_json::to_value(&*self)
            .map_err(|err| AppError::Internal(format!("encode work {}: {err}", self.id)))?;
        if let Value::Object(fields) = &mut doc {
            for (key, value) in patch.fields() {
                fields.insert(key.clone(), value.clone());
            }
        }
        let patched: Work = serde_json::from_value(doc)
            .map_err(|err| AppError::validation(format!("invalid work patch: {err}")))?;
        *self = patched;
        Ok(())
    }
}

/// A validated create-work payload. Server-assigned fields are stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWork {
    pub title: String,
    pub kind: WorkKind,
    pub extra: Map<String, Value>,
}

impl NewWork {
    pub fn new(title: impl Into<String>, kind: WorkKind) -> Self {
        Self {
            title: title.into(),
            kind,
            extra: Map::new(),
        }
    }

    pub fn into_work(self, id: i64, created_at: DateTime<Utc>, chapters_count: u64) -> Work {
        Work {
            id,
            title: self.title,
            kind: self.kind,
            chapters_count,
            created_at: Some(created_at),
            extra: self.extra,
        }
    }
}

impl TryFrom<Value> for NewWork {
    type Error = AppError;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(AppError::validation("work payload must be a JSON object"));
        };

        let kind = match fields.remove("type") {
            Some(Value::String(raw)) => WorkKind::parse(&raw)?,
            _ => {
                return Err(AppError::validation(
                    "work type must be \"manga\" or \"novel\"",
                ))
            }
        };
        let title = match fields.remove("title") {
            Some(Value::String(title)) if !title.trim().is_empty() => title,
            _ => return Err(AppError::validation("work title must be a non-empty string")),
        };

        for assigned in ["id", "created_at", "chapters_count"] {
            fields.remove(assigned);
        }

        Ok(Self {
            title,
            kind,
            extra: fields,
        })
    }
}

/// A validated partial update for a work.
///
/// `id` is split out so callers can reject patches that try to re-key a
/// work; every other field (including `type`) stays in `fields`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkPatch {
    id: Option<i64>,
    kind: Option<WorkKind>,
    fields: Map<String, Value>,
}

impl WorkPatch {
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn kind(&self) -> Option<WorkKind> {
        self.kind
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }
}

impl TryFrom<Value> for WorkPatch {
    type Error = AppError;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(AppError::validation("work patch must be a JSON object"));
        };

        let id = match fields.remove("id") {
            None => None,
            Some(raw) => Some(
                raw.as_i64()
                    .ok_or_else(|| AppError::validation("work id must be an integer"))?,
            ),
        };
        let kind = match fields.get("type") {
            None => None,
            Some(Value::String(raw)) => Some(WorkKind::parse(raw)?),
            Some(_) => return Err(AppError::validation("work type must be a string")),
        };
        if fields.get("title").is_some_and(|title| !title.is_string()) {
            return Err(AppError::validation("work title must be a string"));
        }
        if fields
            .get("chapters_count")
            .is_some_and(|count| count.as_u64().is_none())
        {
            return Err(AppError::validation(
                "chapters_count must be a non-negative integer",
            ));
        }
        match fields.get("created_at") {
            None | Some(Value::Null) => {}
            Some(Value::String(raw)) if DateTime::parse_from_rfc3339(raw).is_ok() => {}
            Some(_) => {
                return Err(AppError::validation(
                    "created_at must be an RFC 3339 timestamp",
                ))
            }
        }

        Ok(Self { id, kind, fields })
    }
}

/// Composite key of a chapter: the owning work's normalized title plus the
/// chapter id. Unique across the chapter collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterKey {
    #[serde(rename = "normalizedTitle")]
    pub normalized_title: String,
    #[serde(rename = "chapterId", deserialize_with = "lenient_id::required")]
    pub chapter_id: String,
}

impl ChapterKey {
    pub fn new(normalized_title: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            normalized_title: normalized_title.into(),
            chapter_id: chapter_id.into(),
        }
    }

    /// Keys a chapter under the work's *current* title.
    pub fn for_work(work: &Work, chapter_id: impl Into<String>) -> Self {
        Self::new(work.normalized_title(), chapter_id)
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.normalized_title, self.chapter_id)
    }
}

/// A page is either an image path or a structured object (e.g. with dimensions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Page {
    Path(String),
    Detailed(Map<String, Value>),
}

/// What readers see of a chapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChapterBody {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(flatten)]
    pub key: ChapterKey,
    #[serde(flatten)]
    pub body: ChapterBody,
}

/// Chapters of one work folded by chapter id.
pub type ChapterMap = BTreeMap<String, ChapterBody>;

/// Body of an add-or-replace chapter request. `chapterId` is kept verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChapterUpsert {
    #[serde(rename = "chapterId", deserialize_with = "lenient_id::required")]
    pub chapter_id: String,
    /// Missing or null stores an empty title.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pages: Option<Vec<Page>>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChapterUpsert {
    /// Splits into the chapter id and the stored body, defaulting `pages`.
    pub fn into_parts(self) -> Result<(String, ChapterBody)> {
        if self.chapter_id.is_empty() {
            return Err(AppError::validation("chapterId must not be empty"));
        }
        Ok((
            self.chapter_id,
            ChapterBody {
                title: self.title.unwrap_or_default(),
                pages: self.pages.unwrap_or_default(),
                content: self.content,
            },
        ))
    }
}

pub const GUEST_ROLE: &str = "guest";
pub const UNKNOWN_USER_AGENT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "lenient_id::required")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default = "unknown_user_agent")]
    pub user_agent: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// A freshly registered guest with a random UUID v4 id.
    pub fn guest(user_agent: Option<&str>, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4().to_string();
        let name = format!("Guest-{}", &id[..8]);
        Self {
            id,
            name,
            role: GUEST_ROLE.to_string(),
            created_at: Some(now),
            last_seen: Some(now),
            user_agent: user_agent.unwrap_or(UNKNOWN_USER_AGENT).to_string(),
            extra: Map::new(),
        }
    }
}

fn unknown_user_agent() -> String {
    UNKNOWN_USER_AGENT.to_string()
}

/// The singleton ad configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdsConfig {
    pub enabled: bool,
    pub ad_units: BTreeMap<String, String>,
    pub ad_frequency: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AdsConfig {
    fn default() -> Self {
        let ad_units = [
            ("BANNER", "ca-app-pub-3940256099942544/9257395921"),
            ("INTERSTITIAL", "ca-app-pub-3940256099942544/1033173712"),
            ("REWARDED", "ca-app-pub-3940256099942544/5224354917"),
            ("REWARDED_INTERSTITIAL", "ca-app-pub-3940256099942544/5354046379"),
        ]
        .into_iter()
        .map(|(unit, placement)| (unit.to_string(), placement.to_string()))
        .collect();
        let ad_frequency = [("TAB_SWITCH", 0.3), ("CHAPTER_UNLOCK", 1.0)]
            .into_iter()
            .map(|(event, probability)| (event.to_string(), probability))
            .collect();

        Self {
            enabled: true,
            ad_units,
            ad_frequency,
            extra: Map::new(),
        }
    }
}

impl AdsConfig {
    /// Replaces `enabled` when given and merges the two maps key by key.
    pub fn merge(&mut self, update: AdsConfigUpdate) {
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(units) = update.ad_units {
            self.ad_units.extend(units);
        }
        if let Some(frequency) = update.ad_frequency {
            self.ad_frequency.extend(frequency);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdsConfigUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub ad_units: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub ad_frequency: Option<BTreeMap<String, f64>>,
}

/// Body of an ad-completion report. Every field is optional because the
/// gate never rejects a report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCompletion {
    #[serde(default, deserialize_with = "lenient_id::optional")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id::optional")]
    pub manga: Option<String>,
    #[serde(default, deserialize_with = "lenient_id::optional")]
    pub chapter_id: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Page>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Page>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Clients send ids both as strings and as bare numbers.
mod lenient_id {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdText {
        Text(String),
        Number(serde_json::Number),
    }

    impl IdText {
        fn into_string(self) -> String {
            match self {
                IdText::Text(text) => text,
                IdText::Number(number) => number.to_string(),
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        IdText::deserialize(deserializer).map(IdText::into_string)
    }

    pub fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<IdText>::deserialize(deserializer)?.map(IdText::into_string))
    }
}
