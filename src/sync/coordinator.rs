use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::SharedIdentity;

use super::config::{FlushOutcome, SyncState, SyncStatus};
use super::queue::{QueueItem, QueueSlotError, SyncQueue};
use super::remote::{document_path, RemoteError, SharedRemote, WordDocument, WordUpdate};

/// Type alias for the shared sync queue
pub type SharedQueue = Arc<Mutex<SyncQueue>>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Word not found: {0}")]
    NotFound(String),
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Queue storage error: {0}")]
    Slot(#[from] QueueSlotError),
}

#[derive(Debug, Default)]
struct Progress {
    state: SyncState,
    last_sync: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Puts the coordinator back to idle even if a flush future is dropped mid-flight
struct SyncingGuard<'a> {
    progress: &'a Mutex<Progress>,
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state = SyncState::Idle;
    }
}

/// Queue entries sharing one remote target
struct TargetWrite<'a> {
    item: &'a QueueItem,
    entry_ids: Vec<Uuid>,
}

/// Flushes the sync queue to the remote store and prunes it against
/// remote snapshots
pub struct SyncCoordinator {
    queue: SharedQueue,
    remote: SharedRemote,
    identity: SharedIdentity,
    progress: Mutex<Progress>,
}

impl SyncCoordinator {
    pub fn new(queue: SyncQueue, remote: SharedRemote, identity: SharedIdentity) -> Self {
        Self {
            queue: Arc::new(Mutex::new(queue)),
            remote,
            identity,
            progress: Mutex::new(Progress::default()),
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the queue
    pub fn queue(&self) -> MutexGuard<'_, SyncQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SyncState {
        self.progress().state
    }

    /// Number of words with pending changes
    pub fn pending_changes(&self) -> usize {
        self.queue().unique_target_count()
    }

    pub fn status(&self) -> SyncStatus {
        let pending_changes = self.pending_changes();
        let progress = self.progress();
        SyncStatus {
            status: progress.state,
            last_sync: progress.last_sync,
            pending_changes,
            error: progress.last_error.clone(),
        }
    }

    /// Drop queued writes the remote snapshot already reflects
    pub fn reconcile(&self, snapshot: &[WordDocument]) -> usize {
        self.queue().reconcile_against_remote(snapshot)
    }

    /// Send every queued write to the remote store.
    ///
    /// Writes to different words run concurrently and independently.
    /// Entries whose write succeeded are removed; the rest stay queued with
    /// their retry count bumped by one.
    pub async fn flush(&self) -> FlushOutcome {
        let Some(user_id) = self.identity.user_id() else {
            log::debug!("Sync: no signed-in user, skipping flush");
            return FlushOutcome::Paused;
        };

        let items = {
            let mut progress = self.progress();
            if progress.state == SyncState::Syncing {
                log::debug!("Sync: flush already in progress");
                return FlushOutcome::AlreadySyncing;
            }
            let queue = self.queue();
            if queue.is_empty() {
                return FlushOutcome::Empty;
            }
            progress.state = SyncState::Syncing;
            queue.all().to_vec()
        };
        let _guard = SyncingGuard {
            progress: &self.progress,
        };

        let targets = group_by_target(&items);
        log::info!(
            "Sync: flushing {} queued item(s) for {} word(s)",
            items.len(),
            targets.len()
        );

        let practiced_at = Utc::now();
        let writes = targets.iter().map(|target| {
            let update = WordUpdate::attempt(&target.item.data, practiced_at);
            self.remote.update_word(&user_id, &target.item.word_id, update)
        });
        let results = join_all(writes).await;

        let mut succeeded = Vec::new();
        let mut pushed = 0;
        let mut failures = Vec::new();
        {
            let mut queue = self.queue();
            for (target, result) in targets.iter().zip(results) {
                match result {
                    Ok(()) => {
                        pushed += 1;
                        succeeded.extend(target.entry_ids.iter().copied());
                    }
                    Err(e) => {
                        log::warn!(
                            "Sync: write to {} ('{}') failed: {}",
                            document_path(&user_id, &target.item.word_id),
                            target.item.word,
                            e
                        );
                        for id in &target.entry_ids {
                            queue.increment_retry(*id, Some(e.to_string()));
                        }
                        failures.push(e.to_string());
                    }
                }
            }
            queue.remove(&succeeded);
        }

        let failed = failures.len();
        {
            let mut progress = self.progress();
            if failed == 0 {
                progress.last_sync = Some(Utc::now());
                progress.last_error = None;
                log::info!("Sync: flush completed, {} word(s) written", pushed);
            } else {
                progress.last_error = Some(format!(
                    "{} of {} write(s) failed: {}",
                    failed,
                    targets.len(),
                    failures[0]
                ));
                log::warn!(
                    "Sync: flush finished with {} failure(s), {} item(s) left for retry",
                    failed,
                    self.queue().len()
                );
            }
        }

        FlushOutcome::Completed { pushed, failed }
    }
}

/// One write per target document, carrying the newest queued snapshot
fn group_by_target(items: &[QueueItem]) -> Vec<TargetWrite<'_>> {
    let mut targets: Vec<TargetWrite<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in items {
        match index.get(item.word_id.as_str()) {
            Some(&i) => {
                targets[i].item = item;
                targets[i].entry_ids.push(item.id);
            }
            None => {
                index.insert(item.word_id.as_str(), targets.len());
                targets.push(TargetWrite {
                    item,
                    entry_ids: vec![item.id],
                });
            }
        }
    }

    targets
}
