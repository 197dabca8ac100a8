//! # Ad-Gate
//!
//! Advisory completion tracking for ad-gated chapters. Flags live in process
//! memory only and are lost on restart. Entries are never pruned, so the map
//! grows by one per distinct (user, work, chapter) report for the life of the
//! process.
//!
//! The gate never denies anything: reports with missing fields and reports
//! that hit a store error still succeed, and chapter reads ignore the flag
//! apart from logging a miss.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use domains::{AdCompletion, ContentStore};

/// How a completion report was handled. Always a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Recorded,
    /// A required field was missing.
    Bypassed,
    /// Updating the user's `last_seen` failed.
    BypassedOnError,
}

impl CompletionOutcome {
    pub fn message(self) -> &'static str {
        match self {
            CompletionOutcome::Recorded => "Ad marked as completed",
            CompletionOutcome::Bypassed => "Ad marked as completed (bypassed)",
            CompletionOutcome::BypassedOnError => "Ad verification bypassed due to error",
        }
    }
}

pub struct AdGate {
    store: Arc<dyn ContentStore>,
    /// One entry per reported triple, kept until the process exits.
    completions: DashMap<String, bool>,
}

impl AdGate {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            completions: DashMap::new(),
        }
    }

    pub async fn record_completion(&self, report: AdCompletion) -> CompletionOutcome {
        let (Some(user_id), Some(work_key), Some(chapter_id)) = (
            present(report.user_id),
            present(report.manga),
            present(report.chapter_id),
        ) else {
            tracing::info!("ad completion reported with missing fields, bypassing");
            return CompletionOutcome::Bypassed;
        };

        self.completions
            .insert(completion_key(&user_id, &work_key, &chapter_id), true);

        match self.store.touch_user(&user_id, Utc::now()).await {
            Ok(_) => CompletionOutcome::Recorded,
            Err(err) => {
                tracing::warn!(error = %err, user_id = %user_id, "ad completion bookkeeping failed, bypassing");
                CompletionOutcome::BypassedOnError
            }
        }
    }

    /// Whether a completion was recorded. Callers must not deny access on
    /// `false`.
    pub fn check_completion(&self, user_id: &str, work_key: &str, chapter_id: &str) -> bool {
        let key = completion_key(user_id, work_key, chapter_id);
        let completed = self.completions.contains_key(&key);
        if !completed {
            tracing::debug!(key = %key, "ad not completed, allowing access anyway");
        }
        completed
    }
}

fn completion_key(user_id: &str, work_key: &str, chapter_id: &str) -> String {
    format!("{user_id}-{work_key}-{chapter_id}")
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}
