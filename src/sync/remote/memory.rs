use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{document_path, RemoteError, RemoteStore, SnapshotFeeds, WordCollection, WordDocument, WordUpdate};

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, WordCollection>,
    feeds: SnapshotFeeds,
}

impl State {
    fn publish(&self, user_id: &str) {
        let snapshot = self
            .collections
            .get(user_id)
            .map(WordCollection::snapshot)
            .unwrap_or_default();
        self.feeds.publish(user_id, snapshot);
    }
}

/// Process-local remote store with fault injection, used by tests and demos
#[derive(Debug)]
pub struct InMemoryRemote {
    state: Mutex<State>,
    offline: AtomicBool,
    failing: Mutex<HashSet<String>>,
    held: watch::Sender<bool>,
    update_calls: AtomicUsize,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemote {
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            state: Mutex::new(State::default()),
            offline: AtomicBool::new(false),
            failing: Mutex::new(HashSet::new()),
            held,
            update_calls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failing(&self) -> MutexGuard<'_, HashSet<String>> {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every operation fail as if the network were down
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make writes to one document fail until cleared
    pub fn fail_document(&self, word_id: &str) {
        self.failing().insert(word_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing().clear();
    }

    /// Park updates until `release_updates` is called
    pub fn hold_updates(&self) {
        self.held.send_replace(true);
    }

    pub fn release_updates(&self) {
        self.held.send_replace(false);
    }

    /// Number of update calls received, including failed ones
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Seed a document as if written by another device
    pub fn insert_document(&self, user_id: &str, doc: WordDocument) -> String {
        let mut state = self.state();
        let collection = state.collections.entry(user_id.to_string()).or_default();
        let id = if doc.id.is_empty() {
            collection.create(doc)
        } else {
            collection.put(doc)
        };
        state.publish(user_id);
        id
    }

    /// Current copy of a document, bypassing fault injection
    pub fn document(&self, user_id: &str, word_id: &str) -> Option<WordDocument> {
        self.state()
            .collections
            .get(user_id)?
            .snapshot()
            .into_iter()
            .find(|doc| doc.id == word_id)
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("network offline".to_string()));
        }
        Ok(())
    }

    fn check_document(&self, user_id: &str, word_id: &str) -> Result<(), RemoteError> {
        self.check_online()?;
        if self.failing().contains(word_id) {
            return Err(RemoteError::Unavailable(format!(
                "write to {} rejected",
                document_path(user_id, word_id)
            )));
        }
        Ok(())
    }

    async fn wait_released(&self) {
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn create_word(&self, user_id: &str, doc: WordDocument) -> Result<String, RemoteError> {
        self.check_online()?;
        let mut state = self.state();
        let id = state.collections.entry(user_id.to_string()).or_default().create(doc);
        state.publish(user_id);
        Ok(id)
    }

    async fn update_word(&self, user_id: &str, word_id: &str, update: WordUpdate) -> Result<(), RemoteError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_released().await;
        self.check_document(user_id, word_id)?;

        let mut state = self.state();
        state
            .collections
            .entry(user_id.to_string())
            .or_default()
            .update(user_id, word_id, &update)?;
        state.publish(user_id);
        Ok(())
    }

    async fn delete_word(&self, user_id: &str, word_id: &str) -> Result<(), RemoteError> {
        self.check_document(user_id, word_id)?;
        let mut state = self.state();
        if let Some(collection) = state.collections.get_mut(user_id) {
            collection.delete(word_id);
        }
        state.publish(user_id);
        Ok(())
    }

    async fn list_words(&self, user_id: &str) -> Result<Vec<WordDocument>, RemoteError> {
        self.check_online()?;
        Ok(self
            .state()
            .collections
            .get(user_id)
            .map(WordCollection::snapshot)
            .unwrap_or_default())
    }

    async fn delete_all_words(&self, user_id: &str) -> Result<(), RemoteError> {
        self.check_online()?;
        let mut state = self.state();
        if let Some(collection) = state.collections.get_mut(user_id) {
            collection.clear();
        }
        state.publish(user_id);
        Ok(())
    }

    fn subscribe(&self, user_id: &str) -> Result<watch::Receiver<Vec<WordDocument>>, RemoteError> {
        self.check_online()?;
        let mut state = self.state();
        let current = state
            .collections
            .get(user_id)
            .map(WordCollection::snapshot)
            .unwrap_or_default();
        Ok(state.feeds.subscribe(user_id, current))
    }
}
