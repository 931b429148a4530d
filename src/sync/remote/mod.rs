//! Remote word document service
//!
//! Documents live at `users/{user_id}/words/{word_id}`. The sync layer only
//! needs point create/update/delete, a collection read, a collection-wide
//! delete and a live feed of full collection snapshots.

mod file;
mod memory;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::practice::{AttemptSnapshot, WordPracticeRecord, MAX_INPUT_TIMES};

pub use file::JsonFileRemote;
pub use memory::InMemoryRemote;

/// Collection holding a user's words
pub const WORDS_COLLECTION: &str = "words";

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Address of a word document, for logs and error messages
pub fn document_path(user_id: &str, word_id: &str) -> String {
    format!("users/{}/{}/{}", user_id, WORDS_COLLECTION, word_id)
}

/// A word document as stored remotely.
///
/// Counter fields are optional because older documents predate them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDocument {
    #[serde(default)]
    pub id: String,
    pub word: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_times: Option<Vec<f64>>,
    /// Legacy practice counter from before attempts were tracked.
    /// A present `null` is kept as `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<serde_json::Value>,
    #[serde(default)]
    pub last_practiced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `Some` whenever the field appears, including as `null`
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl WordDocument {
    /// A fresh, unpracticed word document
    pub fn new(word: &str, translation: &str) -> Self {
        Self {
            id: String::new(),
            word: word.to_string(),
            translation: translation.to_string(),
            correct_count: Some(0),
            total_attempts: Some(0),
            input_times: Some(Vec::new()),
            frequency: None,
            last_practiced_at: None,
            created_at: Some(Utc::now()),
        }
    }

    fn is_legacy(&self) -> bool {
        self.frequency.is_some() && self.correct_count.is_none()
    }

    /// `(correct_count, total_attempts)` after legacy migration.
    ///
    /// Legacy documents only kept input times, one per successful recall,
    /// so their count stands in for both counters.
    pub fn counters(&self) -> (u32, u32) {
        if self.is_legacy() {
            let recalls = self.input_times.as_ref().map_or(0, Vec::len) as u32;
            return (recalls, recalls);
        }
        let correct = self.correct_count.unwrap_or(0);
        let total = self.total_attempts.unwrap_or(0).max(correct);
        (correct, total)
    }

    /// Convert into a local practice record, migrating old shapes
    pub fn into_record(self) -> WordPracticeRecord {
        let (correct_count, total_attempts) = self.counters();
        let mut input_times = self.input_times.unwrap_or_default();
        if input_times.len() > MAX_INPUT_TIMES {
            input_times.drain(..input_times.len() - MAX_INPUT_TIMES);
        }

        WordPracticeRecord {
            word: self.word,
            translation: self.translation,
            correct_count,
            total_attempts,
            input_times,
            last_practiced_at: self.last_practiced_at,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            id: self.id,
        }
    }
}

/// Field subset written by a point update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordUpdate {
    pub translation: Option<String>,
    pub correct_count: Option<u32>,
    pub total_attempts: Option<u32>,
    pub input_times: Option<Vec<f64>>,
    /// `Some(None)` clears the timestamp
    pub last_practiced_at: Option<Option<DateTime<Utc>>>,
}

impl WordUpdate {
    pub fn translation(translation: &str) -> Self {
        Self {
            translation: Some(translation.to_string()),
            ..Default::default()
        }
    }

    /// Counters and timings from a queued attempt, stamped with `practiced_at`
    pub fn attempt(data: &AttemptSnapshot, practiced_at: DateTime<Utc>) -> Self {
        Self {
            translation: None,
            correct_count: Some(data.correct_count),
            total_attempts: Some(data.total_attempts),
            input_times: Some(data.input_times.clone()),
            last_practiced_at: Some(Some(practiced_at)),
        }
    }

    /// Zeroed practice fields
    pub fn reset() -> Self {
        Self {
            translation: None,
            correct_count: Some(0),
            total_attempts: Some(0),
            input_times: Some(Vec::new()),
            last_practiced_at: Some(None),
        }
    }

    pub fn apply_to(&self, doc: &mut WordDocument) {
        if let Some(translation) = &self.translation {
            doc.translation = translation.clone();
        }
        if let Some(correct) = self.correct_count {
            doc.correct_count = Some(correct);
        }
        if let Some(total) = self.total_attempts {
            doc.total_attempts = Some(total);
        }
        if let Some(times) = &self.input_times {
            doc.input_times = Some(times.clone());
        }
        if let Some(last) = self.last_practiced_at {
            doc.last_practiced_at = last;
        }
    }
}

/// The remote document store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a document, returning its new id
    async fn create_word(&self, user_id: &str, doc: WordDocument) -> Result<String, RemoteError>;

    async fn update_word(&self, user_id: &str, word_id: &str, update: WordUpdate) -> Result<(), RemoteError>;

    async fn delete_word(&self, user_id: &str, word_id: &str) -> Result<(), RemoteError>;

    async fn list_words(&self, user_id: &str) -> Result<Vec<WordDocument>, RemoteError>;

    async fn delete_all_words(&self, user_id: &str) -> Result<(), RemoteError>;

    /// Live feed of the full collection, re-sent after every change
    fn subscribe(&self, user_id: &str) -> Result<watch::Receiver<Vec<WordDocument>>, RemoteError>;
}

/// Type alias for a shared remote store
pub type SharedRemote = Arc<dyn RemoteStore>;

/// One user's documents, keyed by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct WordCollection {
    docs: BTreeMap<String, WordDocument>,
}

impl WordCollection {
    pub(crate) fn from_docs(docs: Vec<WordDocument>) -> Self {
        Self {
            docs: docs.into_iter().map(|doc| (doc.id.clone(), doc)).collect(),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<WordDocument> {
        self.docs.values().cloned().collect()
    }

    pub(crate) fn create(&mut self, mut doc: WordDocument) -> String {
        let id = Uuid::new_v4().simple().to_string();
        doc.id = id.clone();
        self.docs.insert(id.clone(), doc);
        id
    }

    /// Insert or overwrite a document under its own id
    pub(crate) fn put(&mut self, doc: WordDocument) -> String {
        let id = doc.id.clone();
        self.docs.insert(id.clone(), doc);
        id
    }

    pub(crate) fn update(&mut self, user_id: &str, word_id: &str, update: &WordUpdate) -> Result<(), RemoteError> {
        let doc = self
            .docs
            .get_mut(word_id)
            .ok_or_else(|| RemoteError::NotFound(document_path(user_id, word_id)))?;
        update.apply_to(doc);
        Ok(())
    }

    pub(crate) fn delete(&mut self, word_id: &str) {
        self.docs.remove(word_id);
    }

    pub(crate) fn clear(&mut self) {
        self.docs.clear();
    }
}

/// Snapshot feeds per user
#[derive(Debug, Default)]
pub(crate) struct SnapshotFeeds {
    senders: HashMap<String, watch::Sender<Vec<WordDocument>>>,
}

impl SnapshotFeeds {
    pub(crate) fn subscribe(&mut self, user_id: &str, current: Vec<WordDocument>) -> watch::Receiver<Vec<WordDocument>> {
        match self.senders.get(user_id) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(current);
                self.senders.insert(user_id.to_string(), sender);
                receiver
            }
        }
    }

    pub(crate) fn publish(&self, user_id: &str, snapshot: Vec<WordDocument>) {
        if let Some(sender) = self.senders.get(user_id) {
            sender.send_replace(snapshot);
        }
    }
}
