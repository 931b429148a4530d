use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::config::FlushOutcome;
use super::coordinator::SyncCoordinator;

/// Messages to control the sync scheduler
#[derive(Debug)]
pub enum SyncSchedulerMessage {
    /// The practice view became visible or hidden
    VisibilityChanged { visible: bool },
    /// Network connectivity changed
    ConnectivityChanged { online: bool },
    /// Manual sync request
    SyncNow,
    /// Session ending: flush what is pending, then stop
    Teardown,
    /// Stop without flushing
    Shutdown,
}

/// What caused a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Interval,
    Visible,
    Online,
    Manual,
    Teardown,
}

/// Cloneable handle for feeding environment events to the scheduler
#[derive(Debug, Clone)]
pub struct TriggerSource {
    sender: mpsc::Sender<SyncSchedulerMessage>,
}

impl TriggerSource {
    pub fn visibility_changed(&self, visible: bool) {
        let _ = self
            .sender
            .try_send(SyncSchedulerMessage::VisibilityChanged { visible });
    }

    pub fn connectivity_changed(&self, online: bool) {
        let _ = self
            .sender
            .try_send(SyncSchedulerMessage::ConnectivityChanged { online });
    }

    pub fn sync_now(&self) {
        let _ = self.sender.try_send(SyncSchedulerMessage::SyncNow);
    }

    pub fn teardown(&self) {
        let _ = self.sender.try_send(SyncSchedulerMessage::Teardown);
    }

    pub fn shutdown(&self) {
        let _ = self.sender.try_send(SyncSchedulerMessage::Shutdown);
    }
}

/// Handle for the sync scheduler task
pub struct SyncScheduler {
    source: TriggerSource,
    task: JoinHandle<()>,
}

impl SyncScheduler {
    pub fn trigger_source(&self) -> TriggerSource {
        self.source.clone()
    }

    /// Flush pending changes one last time and wait for the loop to end
    pub async fn teardown(self) {
        let _ = self.source.sender.send(SyncSchedulerMessage::Teardown).await;
        self.join().await;
    }

    /// Stop the loop without flushing and wait for it to end
    pub async fn shutdown(self) {
        let _ = self.source.sender.send(SyncSchedulerMessage::Shutdown).await;
        self.join().await;
    }

    async fn join(self) {
        if let Err(e) = self.task.await {
            log::error!("Sync scheduler task failed: {}", e);
        }
    }
}

/// Start the sync scheduler.
///
/// Spawns a loop that flushes the coordinator's queue right away, then every
/// `period`, and whenever a trigger arrives through the returned handle.
pub fn start_sync_scheduler(coordinator: Arc<SyncCoordinator>, period: Duration) -> SyncScheduler {
    let (tx, rx) = mpsc::channel(32);

    let task = tokio::spawn(async move {
        sync_scheduler_loop(coordinator, period, rx).await;
    });

    SyncScheduler {
        source: TriggerSource { sender: tx },
        task,
    }
}

async fn run_flush(coordinator: &SyncCoordinator, trigger: SyncTrigger) {
    match coordinator.flush().await {
        FlushOutcome::Completed { pushed, failed } if failed > 0 => {
            log::warn!(
                "Sync scheduler: {:?} flush left {} write(s) for retry ({} pushed)",
                trigger,
                failed,
                pushed
            );
        }
        outcome => {
            log::debug!("Sync scheduler: {:?} flush -> {:?}", trigger, outcome);
        }
    }
}

/// Main scheduler loop
async fn sync_scheduler_loop(
    coordinator: Arc<SyncCoordinator>,
    period: Duration,
    mut receiver: mpsc::Receiver<SyncSchedulerMessage>,
) {
    log::info!(
        "Sync scheduler started, flushing every {:.0}s",
        period.as_secs_f64()
    );

    // First tick completes immediately
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut online = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_flush(&coordinator, SyncTrigger::Interval).await;
            }

            msg = receiver.recv() => {
                match msg {
                    Some(SyncSchedulerMessage::VisibilityChanged { visible }) => {
                        if visible {
                            run_flush(&coordinator, SyncTrigger::Visible).await;
                        }
                    }
                    Some(SyncSchedulerMessage::ConnectivityChanged { online: now_online }) => {
                        let reconnected = now_online && !online;
                        online = now_online;
                        if reconnected {
                            log::info!("Sync scheduler: back online, flushing");
                            run_flush(&coordinator, SyncTrigger::Online).await;
                        }
                    }
                    Some(SyncSchedulerMessage::SyncNow) => {
                        run_flush(&coordinator, SyncTrigger::Manual).await;
                    }
                    Some(SyncSchedulerMessage::Teardown) => {
                        if coordinator.pending_changes() > 0 {
                            let outcome = coordinator.flush().await;
                            if !outcome.is_clean() {
                                log::error!(
                                    "Sync scheduler: final flush incomplete ({:?}), {} item(s) stay queued",
                                    outcome,
                                    coordinator.queue().len()
                                );
                            }
                        }
                        log::info!("Sync scheduler: torn down");
                        break;
                    }
                    Some(SyncSchedulerMessage::Shutdown) | None => {
                        log::info!("Sync scheduler: shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{SessionIdentity, SharedIdentity};
    use crate::practice::AttemptSnapshot;
    use crate::sync::queue::{MemoryQueueSlot, SyncQueue};
    use crate::sync::remote::{InMemoryRemote, SharedRemote, WordDocument};

    const USER: &str = "alice";

    fn setup() -> (Arc<InMemoryRemote>, Arc<SyncCoordinator>, String) {
        let remote = Arc::new(InMemoryRemote::new());
        let word_id = remote.insert_document(USER, WordDocument::new("gato", "cat"));
        let coordinator = Arc::new(SyncCoordinator::new(
            SyncQueue::open(Box::new(MemoryQueueSlot::new())).unwrap(),
            remote.clone() as SharedRemote,
            Arc::new(SessionIdentity::signed_in(USER)) as SharedIdentity,
        ));
        (remote, coordinator, word_id)
    }

    fn enqueue(coordinator: &SyncCoordinator, word_id: &str, total: u32) {
        coordinator.queue().enqueue(
            "gato",
            word_id,
            AttemptSnapshot {
                correct_count: total,
                total_attempts: total,
                input_times: vec![2.0; total as usize],
            },
        );
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_and_interval_flushes() {
        let (remote, coordinator, word_id) = setup();
        enqueue(&coordinator, &word_id, 1);

        let scheduler = start_sync_scheduler(Arc::clone(&coordinator), Duration::from_secs(30));
        settle().await;
        assert_eq!(remote.update_calls(), 1);
        assert!(coordinator.queue().is_empty());

        enqueue(&coordinator, &word_id, 2);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(remote.update_calls(), 1);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(remote.update_calls(), 2);
        assert_eq!(remote.document(USER, &word_id).unwrap().counters(), (2, 2));

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_reconnect_triggers_flush() {
        let (remote, coordinator, word_id) = setup();
        let scheduler = start_sync_scheduler(Arc::clone(&coordinator), Duration::from_secs(30));
        let source = scheduler.trigger_source();
        settle().await;

        enqueue(&coordinator, &word_id, 1);
        source.connectivity_changed(true);
        settle().await;
        assert_eq!(remote.update_calls(), 0);

        source.connectivity_changed(false);
        settle().await;
        assert_eq!(remote.update_calls(), 0);

        source.connectivity_changed(true);
        settle().await;
        assert_eq!(remote.update_calls(), 1);
        assert!(coordinator.queue().is_empty());

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_and_manual_triggers() {
        let (remote, coordinator, word_id) = setup();
        let scheduler = start_sync_scheduler(Arc::clone(&coordinator), Duration::from_secs(30));
        let source = scheduler.trigger_source();
        settle().await;

        enqueue(&coordinator, &word_id, 1);
        source.visibility_changed(false);
        settle().await;
        assert_eq!(remote.update_calls(), 0);

        source.visibility_changed(true);
        settle().await;
        assert_eq!(remote.update_calls(), 1);

        enqueue(&coordinator, &word_id, 2);
        source.sync_now();
        settle().await;
        assert_eq!(remote.update_calls(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_flushes_pending_changes() {
        let (remote, coordinator, word_id) = setup();
        let scheduler = start_sync_scheduler(Arc::clone(&coordinator), Duration::from_secs(30));
        let source = scheduler.trigger_source();
        settle().await;

        enqueue(&coordinator, &word_id, 3);
        scheduler.teardown().await;

        assert_eq!(remote.update_calls(), 1);
        assert!(coordinator.queue().is_empty());

        // Loop has ended; further triggers go nowhere
        source.sync_now();
        enqueue(&coordinator, &word_id, 4);
        settle().await;
        assert_eq!(remote.update_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_failure_keeps_items() {
        let (remote, coordinator, word_id) = setup();
        let scheduler = start_sync_scheduler(Arc::clone(&coordinator), Duration::from_secs(30));
        settle().await;

        remote.set_offline(true);
        enqueue(&coordinator, &word_id, 1);
        scheduler.teardown().await;

        let queue = coordinator.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.all()[0].retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_does_not_flush() {
        let (remote, coordinator, word_id) = setup();
        let scheduler = start_sync_scheduler(Arc::clone(&coordinator), Duration::from_secs(30));
        settle().await;

        enqueue(&coordinator, &word_id, 1);
        scheduler.shutdown().await;

        assert_eq!(remote.update_calls(), 0);
        assert_eq!(coordinator.queue().len(), 1);
    }
}
