//! Remote store kept as JSON files on disk
//!
//! Directory structure:
//! ```text
//! {root}/
//! └── {user-id}/
//!     └── words.json    # Array of word documents
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{RemoteError, RemoteStore, SnapshotFeeds, WordCollection, WordDocument, WordUpdate, WORDS_COLLECTION};

/// Remote store backed by one JSON file per user
#[derive(Debug)]
pub struct JsonFileRemote {
    root: PathBuf,
    feeds: Mutex<SnapshotFeeds>,
    /// Serializes load-modify-save cycles
    writes: Mutex<()>,
}

impl JsonFileRemote {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            feeds: Mutex::new(SnapshotFeeds::default()),
            writes: Mutex::new(()),
        }
    }

    fn feeds(&self) -> MutexGuard<'_, SnapshotFeeds> {
        self.feeds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn collection_path(&self, user_id: &str) -> Result<PathBuf, RemoteError> {
        let valid = !user_id.is_empty()
            && user_id != "."
            && user_id != ".."
            && !user_id.contains(['/', '\\']);
        if !valid {
            return Err(RemoteError::InvalidUserId(user_id.to_string()));
        }
        Ok(self
            .root
            .join(user_id)
            .join(format!("{}.json", WORDS_COLLECTION)))
    }

    fn load(&self, user_id: &str) -> Result<WordCollection, RemoteError> {
        let path = self.collection_path(user_id)?;
        if !path.exists() {
            return Ok(WordCollection::default());
        }
        let content = fs::read_to_string(&path)?;
        let docs: Vec<WordDocument> = serde_json::from_str(&content)?;
        Ok(WordCollection::from_docs(docs))
    }

    fn save(&self, user_id: &str, collection: &WordCollection) -> Result<(), RemoteError> {
        let path = self.collection_path(user_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = collection.snapshot();
        fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        self.feeds().publish(user_id, snapshot);
        Ok(())
    }

    fn modify<T>(
        &self,
        user_id: &str,
        change: impl FnOnce(&mut WordCollection) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let _write = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut collection = self.load(user_id)?;
        let result = change(&mut collection)?;
        self.save(user_id, &collection)?;
        Ok(result)
    }
}

#[async_trait]
impl RemoteStore for JsonFileRemote {
    async fn create_word(&self, user_id: &str, doc: WordDocument) -> Result<String, RemoteError> {
        self.modify(user_id, |collection| Ok(collection.create(doc)))
    }

    async fn update_word(&self, user_id: &str, word_id: &str, update: WordUpdate) -> Result<(), RemoteError> {
        self.modify(user_id, |collection| collection.update(user_id, word_id, &update))
    }

    async fn delete_word(&self, user_id: &str, word_id: &str) -> Result<(), RemoteError> {
        self.modify(user_id, |collection| {
            collection.delete(word_id);
            Ok(())
        })
    }

    async fn list_words(&self, user_id: &str) -> Result<Vec<WordDocument>, RemoteError> {
        Ok(self.load(user_id)?.snapshot())
    }

    async fn delete_all_words(&self, user_id: &str) -> Result<(), RemoteError> {
        self.modify(user_id, |collection| {
            collection.clear();
            Ok(())
        })
    }

    fn subscribe(&self, user_id: &str) -> Result<watch::Receiver<Vec<WordDocument>>, RemoteError> {
        let current = self.load(user_id)?.snapshot();
        Ok(self.feeds().subscribe(user_id, current))
    }
}
