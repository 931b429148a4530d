use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use crate::practice::AttemptSnapshot;

use super::remote::WordDocument;

#[derive(Error, Debug)]
pub enum QueueSlotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable storage for the serialized queue, surviving restarts
pub trait QueueSlot: Send {
    fn load(&self) -> Result<Vec<QueueItem>, QueueSlotError>;
    fn save(&self, items: &[QueueItem]) -> Result<(), QueueSlotError>;
}

/// Queue slot backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileQueueSlot {
    path: PathBuf,
}

impl FileQueueSlot {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl QueueSlot for FileQueueSlot {
    fn load(&self) -> Result<Vec<QueueItem>, QueueSlotError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, items: &[QueueItem]) -> Result<(), QueueSlotError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

/// In-memory queue slot. Clones share the same serialized value, so a
/// queue rebuilt from a clone behaves like one reloaded from disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueSlot {
    value: Arc<Mutex<Option<String>>>,
}

impl MemoryQueueSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueSlot for MemoryQueueSlot {
    fn load(&self) -> Result<Vec<QueueItem>, QueueSlotError> {
        let value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        match value.as_deref() {
            Some(data) => Ok(serde_json::from_str(data)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, items: &[QueueItem]) -> Result<(), QueueSlotError> {
        let data = serde_json::to_string(items)?;
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }
}

/// Kinds of remote mutation that can be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueItemKind {
    /// Counter and timing update after a practice attempt
    Attempt,
}

/// A single pending remote mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique ID for this queue entry
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: QueueItemKind,
    pub word: String,
    /// Remote document the write targets
    pub word_id: String,
    /// Field values to write, captured at enqueue time
    pub data: AttemptSnapshot,
    /// Number of failed flush attempts
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    /// Last error message if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueItem {
    /// True when the remote document already holds at least this progress
    pub fn is_absorbed_by(&self, remote: &WordDocument) -> bool {
        let (correct, total) = remote.counters();
        total >= self.data.total_attempts && correct >= self.data.correct_count
    }
}

/// Queue of pending remote writes, at most one per target document
pub struct SyncQueue {
    items: Vec<QueueItem>,
    slot: Box<dyn QueueSlot>,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue").field("items", &self.items).finish()
    }
}

impl SyncQueue {
    /// Open the queue, restoring whatever the slot holds
    pub fn open(slot: Box<dyn QueueSlot>) -> Result<Self, QueueSlotError> {
        let items = slot.load()?;
        Ok(Self { items, slot })
    }

    /// Open the queue, starting empty if the slot cannot be read
    pub fn open_or_empty(slot: Box<dyn QueueSlot>) -> Self {
        match slot.load() {
            Ok(items) => Self { items, slot },
            Err(e) => {
                log::warn!("Sync queue: could not restore pending items, starting empty: {}", e);
                Self {
                    items: Vec::new(),
                    slot,
                }
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.slot.save(&self.items) {
            log::warn!(
                "Sync queue: failed to persist {} item(s), keeping them in memory: {}",
                self.items.len(),
                e
            );
        }
    }

    /// Queue a snapshot for a word, replacing any pending one for the same target.
    ///
    /// A replacement gets a fresh entry id but keeps the retry count.
    pub fn enqueue(&mut self, word: &str, word_id: &str, data: AttemptSnapshot) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();

        if let Some(existing) = self.items.iter_mut().find(|item| item.word_id == word_id) {
            existing.id = id;
            existing.word = word.to_string();
            existing.data = data;
            existing.created_at = now;
        } else {
            self.items.push(QueueItem {
                id,
                kind: QueueItemKind::Attempt,
                word: word.to_string(),
                word_id: word_id.to_string(),
                data,
                retry_count: 0,
                created_at: now,
                last_error: None,
            });
        }

        self.persist();
        id
    }

    pub fn all(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn replace_all(&mut self, items: Vec<QueueItem>) {
        self.items = items;
        self.persist();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.persist();
    }

    /// Mark a flush attempt of an entry as failed
    pub fn increment_retry(&mut self, item_id: Uuid, error: Option<String>) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) else {
            return false;
        };
        item.retry_count += 1;
        if error.is_some() {
            item.last_error = error;
        }
        self.persist();
        true
    }

    /// Remove entries by id, returning how many were removed
    pub fn remove(&mut self, item_ids: &[Uuid]) -> usize {
        let ids: HashSet<&Uuid> = item_ids.iter().collect();
        let before = self.items.len();
        self.items.retain(|item| !ids.contains(&item.id));
        let removed = before - self.items.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Remove entries targeting the given remote documents
    pub fn remove_targets(&mut self, word_ids: &[String]) -> usize {
        let targets: HashSet<&str> = word_ids.iter().map(String::as_str).collect();
        let ids: Vec<Uuid> = self
            .items
            .iter()
            .filter(|item| targets.contains(item.word_id.as_str()))
            .map(|item| item.id)
            .collect();
        self.remove(&ids)
    }

    /// Number of distinct target documents with pending changes
    pub fn unique_target_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.word_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop entries the remote snapshot has already caught up with.
    ///
    /// Only the counters are compared; timing data is not. Entries whose
    /// target is missing from the snapshot are kept.
    pub fn reconcile_against_remote(&mut self, snapshot: &[WordDocument]) -> usize {
        if self.items.is_empty() {
            return 0;
        }

        let remote: HashMap<&str, &WordDocument> =
            snapshot.iter().map(|doc| (doc.id.as_str(), doc)).collect();

        let stale: Vec<Uuid> = self
            .items
            .iter()
            .filter(|item| {
                remote
                    .get(item.word_id.as_str())
                    .is_some_and(|doc| item.is_absorbed_by(doc))
            })
            .map(|item| item.id)
            .collect();

        if stale.is_empty() {
            return 0;
        }

        let removed = self.remove(&stale);
        log::info!(
            "Sync queue: dropped {} item(s) already reflected remotely, {} pending",
            removed,
            self.items.len()
        );
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(correct: u32, total: u32) -> AttemptSnapshot {
        AttemptSnapshot {
            correct_count: correct,
            total_attempts: total,
            input_times: vec![1.0; correct as usize],
        }
    }

    fn remote_doc(id: &str, correct: u32, total: u32) -> WordDocument {
        let mut doc = WordDocument::new("word", "translation");
        doc.id = id.to_string();
        doc.correct_count = Some(correct);
        doc.total_attempts = Some(total);
        doc
    }

    fn memory_queue() -> SyncQueue {
        SyncQueue::open(Box::new(MemoryQueueSlot::new())).unwrap()
    }

    #[test]
    fn test_queue_deduplication() {
        let mut queue = memory_queue();

        queue.enqueue("gato", "w1", snapshot(3, 3));
        queue.enqueue("gato", "w1", snapshot(5, 6));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.all()[0].data.correct_count, 5);
        assert_eq!(queue.all()[0].data.total_attempts, 6);
    }

    #[test]
    fn test_queue_different_targets() {
        let mut queue = memory_queue();

        queue.enqueue("gato", "w1", snapshot(1, 1));
        queue.enqueue("perro", "w2", snapshot(1, 1));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.unique_target_count(), 2);
    }

    #[test]
    fn test_replacement_keeps_retry_count() {
        let mut queue = memory_queue();
        let first = queue.enqueue("gato", "w1", snapshot(1, 1));
        assert!(queue.increment_retry(first, Some("offline".to_string())));

        let second = queue.enqueue("gato", "w1", snapshot(2, 2));

        assert_ne!(first, second);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.all()[0].retry_count, 1);
        assert_eq!(queue.all()[0].last_error.as_deref(), Some("offline"));
        // The old entry id no longer exists
        assert!(!queue.increment_retry(first, None));
    }

    #[test]
    fn test_new_target_starts_with_zero_retries() {
        let mut queue = memory_queue();
        queue.enqueue("gato", "w1", snapshot(1, 1));

        assert_eq!(queue.all()[0].retry_count, 0);
        assert_eq!(queue.all()[0].kind, QueueItemKind::Attempt);
    }

    #[test]
    fn test_reconcile_drops_absorbed_items() {
        let mut queue = memory_queue();
        queue.enqueue("gato", "w1", snapshot(3, 4));
        queue.enqueue("perro", "w2", snapshot(3, 4));
        queue.enqueue("pez", "w3", snapshot(3, 4));
        queue.enqueue("ave", "w4", snapshot(3, 4));

        let removed = queue.reconcile_against_remote(&[
            // Equal: absorbed
            remote_doc("w1", 3, 4),
            // Behind on total: kept
            remote_doc("w2", 3, 3),
            // Behind on correct: kept
            remote_doc("w3", 2, 9),
            // w4 missing from snapshot: kept
        ]);

        assert_eq!(removed, 1);
        let remaining: Vec<&str> = queue.all().iter().map(|i| i.word_id.as_str()).collect();
        assert_eq!(remaining, vec!["w2", "w3", "w4"]);
    }

    #[test]
    fn test_reconcile_ignores_input_times() {
        let mut queue = memory_queue();
        queue.enqueue("gato", "w1", snapshot(2, 2));

        let mut doc = remote_doc("w1", 2, 2);
        doc.input_times = Some(vec![9.0]);

        assert_eq!(queue.reconcile_against_remote(&[doc]), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_targets() {
        let mut queue = memory_queue();
        queue.enqueue("gato", "w1", snapshot(1, 1));
        queue.enqueue("perro", "w2", snapshot(1, 1));

        assert_eq!(queue.remove_targets(&["w2".to_string()]), 1);
        assert_eq!(queue.all()[0].word_id, "w1");
    }

    #[test]
    fn test_replace_all_persists_new_contents() {
        let slot = MemoryQueueSlot::new();
        let mut queue = SyncQueue::open(Box::new(slot.clone())).unwrap();
        queue.enqueue("gato", "w1", snapshot(1, 1));
        queue.enqueue("perro", "w2", snapshot(1, 1));

        let mut kept = queue.all()[1].clone();
        kept.retry_count = 3;
        queue.replace_all(vec![kept.clone()]);

        let reopened = SyncQueue::open(Box::new(slot)).unwrap();
        assert_eq!(reopened.all(), &[kept][..]);
        assert_eq!(reopened.unique_target_count(), 1);
    }

    #[test]
    fn test_memory_slot_survives_reopen() {
        let slot = MemoryQueueSlot::new();
        let mut queue = SyncQueue::open(Box::new(slot.clone())).unwrap();
        queue.enqueue("gato", "w1", snapshot(1, 2));

        let reopened = SyncQueue::open(Box::new(slot)).unwrap();
        assert_eq!(reopened.all(), queue.all());
    }

    #[test]
    fn test_file_slot_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("sync_queue.json");

        let mut queue = SyncQueue::open(Box::new(FileQueueSlot::new(path.clone()))).unwrap();
        assert!(queue.is_empty());
        queue.enqueue("gato", "w1", snapshot(1, 2));
        queue.enqueue("perro", "w2", snapshot(0, 1));

        let reopened = SyncQueue::open(Box::new(FileQueueSlot::new(path.clone()))).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.all()[1].word, "perro");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"wordId\": \"w1\""));
        assert!(raw.contains("\"type\": \"attempt\""));
    }

    #[test]
    fn test_unreadable_slot_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_queue.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(SyncQueue::open(Box::new(FileQueueSlot::new(path.clone()))).is_err());
        let queue = SyncQueue::open_or_empty(Box::new(FileQueueSlot::new(path)));
        assert!(queue.is_empty());
    }
}
