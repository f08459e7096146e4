//! Progress watch sessions.
//!
//! A session pushes task snapshots to one subscriber on an adaptive cadence:
//! fast while the task encodes, slow once it has ended (only to notice
//! removal). Subscriptions are counted per task and the last subscriber to
//! disconnect cleans the task up.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::debug;
use transcoder_models::TaskId;

use crate::logging::TaskLogger;
use crate::metrics;
use crate::service::TaskService;
use crate::task::Task;

/// Destination of watch snapshots.
#[async_trait]
pub trait ProgressSink: Send {
    /// Deliver a snapshot; `false` means the subscriber is gone.
    async fn send_task(&mut self, task: &Task) -> bool;
}

#[async_trait]
impl ProgressSink for mpsc::Sender<Task> {
    async fn send_task(&mut self, task: &Task) -> bool {
        self.send(task.clone()).await.is_ok()
    }
}

/// Why a watch session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The task is no longer registered
    TaskRemoved,
    /// The subscriber signalled disconnection
    PeerDisconnected,
    /// Delivering a snapshot failed
    SendFailed,
}

/// Active subscription counts per task.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    counts: RwLock<HashMap<TaskId, usize>>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, returning the new count.
    pub async fn acquire(&self, id: &TaskId) -> usize {
        let mut counts = self.counts.write().await;
        let count = counts.entry(id.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop a subscriber, returning how many remain.
    pub async fn release(&self, id: &TaskId) -> usize {
        let mut counts = self.counts.write().await;
        let Some(count) = counts.get_mut(id) else {
            return 0;
        };
        *count = count.saturating_sub(1);
        let remaining = *count;
        if remaining == 0 {
            counts.remove(id);
        }
        remaining
    }

    pub async fn count(&self, id: &TaskId) -> usize {
        self.counts.read().await.get(id).copied().unwrap_or(0)
    }
}

/// One subscriber's view of one task.
pub struct WatchSession {
    service: Arc<TaskService>,
    task_id: TaskId,
}

impl WatchSession {
    pub fn new(service: Arc<TaskService>, task_id: TaskId) -> Self {
        Self { service, task_id }
    }

    /// Stream snapshots into `sink` until the task disappears, the subscriber
    /// disconnects or a send fails.
    ///
    /// `disconnect` reports the peer gone when it turns `true` or its sender
    /// is dropped. On disconnection the last remaining subscriber cleans and
    /// deregisters the task.
    pub async fn run<S: ProgressSink>(
        self,
        sink: &mut S,
        mut disconnect: watch::Receiver<bool>,
    ) -> WatchExit {
        let subscribers = self.service.subscriptions().acquire(&self.task_id).await;
        metrics::watch_session_started();
        debug!(task_id = %self.task_id, subscribers, "Watch session opened");

        let exit = self.watch_loop(sink, &mut disconnect).await;

        let remaining = self.service.subscriptions().release(&self.task_id).await;
        metrics::watch_session_finished();
        debug!(task_id = %self.task_id, ?exit, remaining, "Watch session closed");

        if exit == WatchExit::PeerDisconnected && remaining == 0 {
            match self.service.clean(&self.task_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => TaskLogger::new(&self.task_id, "watch")
                    .log_warning(&format!("failed to clean task: {}", e)),
            }
        }

        exit
    }

    async fn watch_loop<S: ProgressSink>(
        &self,
        sink: &mut S,
        disconnect: &mut watch::Receiver<bool>,
    ) -> WatchExit {
        let Some(task) = self.refresh().await else {
            return WatchExit::TaskRemoved;
        };
        let mut ended = task.is_ended;

        loop {
            let config = self.service.config();
            let interval = if ended {
                config.idle_poll_interval
            } else {
                config.active_poll_interval
            };

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = peer_disconnected(disconnect) => return WatchExit::PeerDisconnected,
            }

            let Some(task) = self.refresh().await else {
                return WatchExit::TaskRemoved;
            };
            ended = task.is_ended;

            if !sink.send_task(&task).await {
                return WatchExit::SendFailed;
            }
        }
    }

    /// Latest snapshot, `None` once the task is gone.
    ///
    /// Progress read failures fall back to the stored snapshot.
    async fn refresh(&self) -> Option<Task> {
        match self.service.load_progress(&self.task_id).await {
            Ok(task) => Some(task),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                TaskLogger::new(&self.task_id, "watch")
                    .log_warning(&format!("failed to refresh progress: {}", e));
                self.service.get(&self.task_id).await.ok()
            }
        }
    }
}

async fn peer_disconnected(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
