//! Concurrency-safe in-memory task store.

use std::collections::HashMap;

use tokio::sync::RwLock;
use transcoder_models::TaskId;

use crate::task::Task;

/// Map from task id to task, shared by every handler and watch session.
///
/// Each operation holds the lock only for its own duration. Nothing is
/// persisted; state is lost on restart.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task.
    pub async fn store(&self, id: TaskId, task: Task) {
        self.tasks.write().await.insert(id, task);
    }

    /// Snapshot of a task, `None` if absent.
    pub async fn load(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Remove a task, returning it if it was present.
    pub async fn delete(&self, id: &TaskId) -> Option<Task> {
        self.tasks.write().await.remove(id)
    }

    /// Modify a task in place if it is still registered.
    ///
    /// Never re-inserts a task that was deleted concurrently.
    pub async fn update<F, R>(&self, id: &TaskId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Task) -> R,
    {
        self.tasks.write().await.get_mut(id).map(f)
    }

    /// Visit a snapshot of all tasks in no particular order.
    ///
    /// Iteration stops when `visit` returns `false`. Changes made while
    /// visiting are not reflected.
    pub async fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&TaskId, &Task) -> bool,
    {
        let snapshot: Vec<(TaskId, Task)> = self
            .tasks
            .read()
            .await
            .iter()
            .map(|(id, task)| (id.clone(), task.clone()))
            .collect();

        for (id, task) in &snapshot {
            if !visit(id, task) {
                break;
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
