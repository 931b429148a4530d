//! Practice session
//!
//! Ties the local record store to the remote word collection and the sync
//! queue. Practice results are applied locally first and queued; word
//! management (add, delete, translate, reset) goes to the remote store
//! directly and needs a signed-in user.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::identity::SharedIdentity;
use crate::practice::{
    calculate_mastery, select_words, AttemptSnapshot, MasteryResult, PracticeRecordStore, SharedRecords,
};
use crate::sync::{
    FlushOutcome, RemoteError, SharedRemote, SyncCoordinator, SyncError, SyncQueue, SyncStatus, WordDocument,
    WordUpdate,
};

/// Per-word summary for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordStats {
    pub word: String,
    pub translation: String,
    pub correct_count: u32,
    pub total_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_input_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_practiced_at: Option<DateTime<Utc>>,
    pub mastery: MasteryResult,
}

pub struct PracticeSession {
    records: SharedRecords,
    coordinator: Arc<SyncCoordinator>,
    remote: SharedRemote,
    identity: SharedIdentity,
}

impl PracticeSession {
    pub fn new(queue: SyncQueue, remote: SharedRemote, identity: SharedIdentity) -> Self {
        let coordinator = Arc::new(SyncCoordinator::new(
            queue,
            Arc::clone(&remote),
            Arc::clone(&identity),
        ));
        Self {
            records: PracticeRecordStore::new().shared(),
            coordinator,
            remote,
            identity,
        }
    }

    fn store(&self) -> MutexGuard<'_, PracticeRecordStore> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn records(&self) -> SharedRecords {
        Arc::clone(&self.records)
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.coordinator)
    }

    fn user_id(&self) -> Result<String, SyncError> {
        self.identity.user_id().ok_or(SyncError::NotAuthenticated)
    }

    // ==================== Remote snapshots ====================

    /// Read the whole remote collection into the store
    pub async fn load(&self) -> Result<usize, SyncError> {
        let user_id = self.user_id()?;
        let docs = self.remote.list_words(&user_id).await?;
        let count = docs.len();
        self.apply_snapshot(docs);
        log::info!("Loaded {} word(s) for {}", count, user_id);
        Ok(count)
    }

    /// Replace local records with a remote snapshot.
    ///
    /// Queue entries the snapshot already reflects are dropped first. Entries
    /// still pending are laid over the remote values, so progress that has not
    /// been written yet stays visible. Returns the number of dropped entries.
    pub fn apply_snapshot(&self, docs: Vec<WordDocument>) -> usize {
        // Lock order: store, then queue
        let mut store = self.store();
        let (dropped, pending) = {
            let mut queue = self.coordinator.queue();
            let dropped = queue.reconcile_against_remote(&docs);
            let pending: HashMap<String, AttemptSnapshot> = queue
                .all()
                .iter()
                .map(|item| (item.word_id.clone(), item.data.clone()))
                .collect();
            (dropped, pending)
        };

        let records = docs
            .into_iter()
            .map(|doc| {
                let mut record = doc.into_record();
                if let Some(snapshot) = pending.get(&record.id) {
                    record.apply_attempt_snapshot(snapshot);
                }
                record
            })
            .collect();
        store.set_all(records);
        dropped
    }

    /// Apply every snapshot the remote feed publishes until it closes
    pub fn follow_remote(self: &Arc<Self>) -> Result<JoinHandle<()>, SyncError> {
        let user_id = self.user_id()?;
        let mut feed = self.remote.subscribe(&user_id).map_err(|e| {
            log::warn!("Could not subscribe to words of {}: {}", user_id, e);
            e
        })?;
        let session = Arc::clone(self);

        Ok(tokio::spawn(async move {
            loop {
                let docs = feed.borrow_and_update().clone();
                session.apply_snapshot(docs);
                if feed.changed().await.is_err() {
                    log::info!("Remote word feed for {} closed", user_id);
                    break;
                }
            }
        }))
    }

    // ==================== Word management ====================

    /// Create a word remotely, then locally under the new document id
    pub async fn add_word(&self, word: &str, translation: &str) -> Result<String, SyncError> {
        let user_id = self.user_id()?;
        let id = self
            .remote
            .create_word(&user_id, WordDocument::new(word, translation))
            .await?;
        self.store().add(word, translation, &id);
        Ok(id)
    }

    /// Delete every document for `word`, returning how many were removed
    pub async fn delete_word(&self, word: &str) -> Result<usize, SyncError> {
        let user_id = self.user_id()?;
        let local_id = self.store().word_id(word).map(str::to_string);

        let mut ids: Vec<String> = self
            .remote
            .list_words(&user_id)
            .await?
            .into_iter()
            .filter(|doc| doc.word == word)
            .map(|doc| doc.id)
            .collect();
        if ids.is_empty() && local_id.is_none() {
            return Err(SyncError::NotFound(word.to_string()));
        }

        let deletes = ids.iter().map(|id| self.remote.delete_word(&user_id, id));
        let results = join_all(deletes).await;
        let removed = results.iter().filter(|r| r.is_ok()).count();
        if let Some(e) = results.into_iter().find_map(Result::err) {
            log::warn!(
                "Deleting '{}' for {} removed {} of {} document(s): {}",
                word,
                user_id,
                removed,
                ids.len(),
                e
            );
            return Err(e.into());
        }

        self.store().delete(word);
        ids.extend(local_id);
        self.coordinator.queue().remove_targets(&ids);
        Ok(removed)
    }

    pub async fn update_translation(&self, word: &str, translation: &str) -> Result<(), SyncError> {
        let word_id = self
            .store()
            .word_id(word)
            .map(str::to_string)
            .ok_or_else(|| SyncError::NotFound(word.to_string()))?;
        let user_id = self.user_id()?;

        self.remote
            .update_word(&user_id, &word_id, WordUpdate::translation(translation))
            .await?;
        self.store().update_translation(word, translation);
        Ok(())
    }

    /// Delete the whole collection, locally and remotely, with its pending writes
    pub async fn remove_all_words(&self) -> Result<(), SyncError> {
        let user_id = self.user_id()?;
        self.remote.delete_all_words(&user_id).await?;
        self.store().clear();
        self.coordinator.queue().clear();
        log::info!("Removed all words for {}", user_id);
        Ok(())
    }

    // ==================== Practice ====================

    /// Record a correct recall and queue it. False if the word is unknown.
    pub fn record_correct(&self, word: &str, input_time_seconds: f64) -> bool {
        let mut store = self.store();
        if !store.record_correct(word, input_time_seconds) {
            log::debug!("Ignoring correct answer for unknown word '{}'", word);
            return false;
        }
        self.enqueue(&store, word)
    }

    /// Record a failed recall and queue it. False if the word is unknown.
    pub fn record_incorrect(&self, word: &str) -> bool {
        let mut store = self.store();
        if !store.record_incorrect(word) {
            log::debug!("Ignoring missed answer for unknown word '{}'", word);
            return false;
        }
        self.enqueue(&store, word)
    }

    /// Queue the current snapshot of `word`. The caller keeps the store
    /// locked, so concurrent answers reach the queue in the order they were
    /// counted.
    fn enqueue(&self, store: &PracticeRecordStore, word: &str) -> bool {
        let Some(record) = store.get(word) else {
            return false;
        };
        self.coordinator
            .queue()
            .enqueue(word, &record.id, record.attempt_snapshot());
        true
    }

    pub async fn reset_word(&self, word: &str) -> Result<(), SyncError> {
        let user_id = self.user_id()?;
        let word_id = {
            let mut store = self.store();
            let word_id = store
                .word_id(word)
                .map(str::to_string)
                .ok_or_else(|| SyncError::NotFound(word.to_string()))?;
            store.reset(word);
            word_id
        };

        self.coordinator.queue().remove_targets(&[word_id.clone()]);
        self.remote
            .update_word(&user_id, &word_id, WordUpdate::reset())
            .await?;
        Ok(())
    }

    /// Reset every word. Remote resets run concurrently; the first failure
    /// is returned after all of them finish.
    pub async fn reset_practice_records(&self) -> Result<usize, SyncError> {
        let user_id = self.user_id()?;
        let word_ids: Vec<String> = {
            let mut store = self.store();
            store.reset_all();
            store.records().map(|r| r.id.clone()).collect()
        };
        self.coordinator.queue().remove_targets(&word_ids);

        let resets = word_ids
            .iter()
            .map(|id| self.remote.update_word(&user_id, id, WordUpdate::reset()));
        let errors: Vec<RemoteError> = join_all(resets)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if let Some(e) = errors.into_iter().next() {
            log::warn!("Resetting practice records for {} failed: {}", user_id, e);
            return Err(e.into());
        }
        Ok(word_ids.len())
    }

    // ==================== Reads ====================

    /// Pick up to `max` distinct `(word, translation)` pairs, favouring
    /// weak and stale words
    pub fn random_words(&self, max: usize) -> Vec<(String, String)> {
        select_words(&self.store(), max, Utc::now(), &mut rand::thread_rng())
    }

    pub fn mastery(&self, word: &str) -> Option<MasteryResult> {
        let store = self.store();
        let record = store.get(word)?;
        Some(calculate_mastery(record, store.speed_reference(word)))
    }

    pub fn word_stats(&self) -> Vec<WordStats> {
        let store = self.store();
        store
            .records()
            .map(|record| WordStats {
                word: record.word.clone(),
                translation: record.translation.clone(),
                correct_count: record.correct_count,
                total_attempts: record.total_attempts,
                average_input_time: record.average_input_time(),
                last_practiced_at: record.last_practiced_at,
                mastery: calculate_mastery(record, store.speed_reference(&record.word)),
            })
            .collect()
    }

    /// Words whose changes are still waiting in the queue
    pub fn pending_words(&self) -> HashSet<String> {
        self.coordinator
            .queue()
            .all()
            .iter()
            .map(|item| item.word.clone())
            .collect()
    }

    pub fn status(&self) -> SyncStatus {
        self.coordinator.status()
    }

    pub async fn flush(&self) -> FlushOutcome {
        self.coordinator.flush().await
    }
}
