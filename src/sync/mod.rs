pub mod config;
pub mod coordinator;
pub mod queue;
pub mod remote;
pub mod scheduler;

pub use config::{FlushOutcome, SyncConfig, SyncState, SyncStatus, DEFAULT_SYNC_INTERVAL_SECS};
pub use coordinator::{SharedQueue, SyncCoordinator, SyncError};
pub use queue::{FileQueueSlot, MemoryQueueSlot, QueueItem, QueueItemKind, QueueSlot, QueueSlotError, SyncQueue};
pub use remote::{
    document_path, InMemoryRemote, JsonFileRemote, RemoteError, RemoteStore, SharedRemote, WordDocument, WordUpdate,
};
pub use scheduler::{start_sync_scheduler, SyncScheduler, SyncSchedulerMessage, SyncTrigger, TriggerSource};
