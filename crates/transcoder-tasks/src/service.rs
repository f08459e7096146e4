//! Task operations exposed to the transport layer.

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::info;
use transcoder_media::{ChainOutcome, MediaEngine};
use transcoder_models::{MimeCategory, TaskId};

use crate::config::TaskConfig;
use crate::error::{TaskError, TaskResult};
use crate::logging::TaskLogger;
use crate::metrics;
use crate::pipeline::TranscodePipeline;
use crate::registry::TaskRegistry;
use crate::task::Task;
use crate::watch::SubscriptionTracker;

/// Entry point for creating, observing and cleaning tasks.
///
/// Shared across handlers behind an `Arc`; all state lives in the registry.
pub struct TaskService {
    config: TaskConfig,
    registry: TaskRegistry,
    pipeline: TranscodePipeline,
    subscriptions: SubscriptionTracker,
}

impl TaskService {
    pub fn new(config: TaskConfig, engine: Arc<dyn MediaEngine>) -> Self {
        let pipeline =
            TranscodePipeline::new(engine, config.work_dir.clone(), config.public_prefix.clone());
        Self {
            config,
            registry: TaskRegistry::new(),
            pipeline,
            subscriptions: SubscriptionTracker::new(),
        }
    }

    /// Create a service backed by the FFmpeg binaries the config resolves.
    pub fn from_config(config: TaskConfig) -> TaskResult<Self> {
        let engine = config.ffmpeg_engine()?;
        Ok(Self::new(config, Arc::new(engine)))
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn subscriptions(&self) -> &SubscriptionTracker {
        &self.subscriptions
    }

    /// Store an upload and start processing it.
    ///
    /// Images come back ended with all variants written; videos come back
    /// with the transcode chain running. On failure nothing is registered and
    /// files written so far are removed.
    pub async fn create_task<R>(&self, file_name: &str, upload: R, owner: &str) -> TaskResult<Task>
    where
        R: AsyncRead + Unpin,
    {
        let Some(category) = MimeCategory::from_file_name(file_name) else {
            metrics::record_task_failure("unsupported_media_type");
            return Err(TaskError::unsupported(file_name));
        };

        let id = TaskId::new();
        let ext = Path::new(file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let origin_path = self.config.work_dir.join(format!("{}{}", id, ext));
        let mut task = Task::new(id.clone(), owner, origin_path, category);

        let logger = TaskLogger::new(&id, "create");
        logger.log_start(&format!("{} ({})", file_name, category));

        let result = match self.store_upload(&task.origin_path, upload).await {
            Ok(()) => match category {
                MimeCategory::Image => self.pipeline.process_image(&mut task).await,
                MimeCategory::Video => self.pipeline.process_video(&mut task).await,
            },
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            logger.log_error(&e.to_string());
            metrics::record_task_failure(e.reason());
            task.clean_files().await;
            return Err(e);
        }

        self.registry.store(id, task.clone()).await;
        metrics::record_task_created(category);
        logger.log_completion(&format!("registered, ended={}", task.is_ended));
        Ok(task)
    }

    /// Current snapshot without touching the progress log.
    pub async fn get(&self, id: &TaskId) -> TaskResult<Task> {
        self.registry
            .load(id)
            .await
            .ok_or_else(|| TaskError::NotFound(id.clone()))
    }

    /// Refresh a task's progress from its log and return the new snapshot.
    pub async fn load_progress(&self, id: &TaskId) -> TaskResult<Task> {
        let mut task = self.get(id).await?;
        let result = task.load_progress().await;

        self.registry
            .update(id, |stored| stored.merge_refresh(&task))
            .await
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        result?;
        Ok(task)
    }

    /// Whether the task has finished.
    ///
    /// A progress log that cannot be read or parsed counts as ended.
    pub async fn is_ended(&self, id: &TaskId) -> TaskResult<bool> {
        let task = self.get(id).await?;
        match task.check_is_ended().await {
            Ok(ended) => Ok(ended),
            Err(e) => {
                TaskLogger::new(id, "is_ended")
                    .log_warning(&format!("progress unreadable, treating as ended: {}", e));
                Ok(true)
            }
        }
    }

    /// Deregister a task and remove its files.
    ///
    /// A transcode still running is not stopped; use [`TaskService::cancel`]
    /// first for that.
    pub async fn clean(&self, id: &TaskId) -> TaskResult<()> {
        let task = self
            .registry
            .delete(id)
            .await
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        let removed = task.clean_files().await;
        metrics::record_task_cleaned();
        info!(task_id = %id, removed, "Task cleaned");
        Ok(())
    }

    /// Kill the transcode chain of a task and mark it ended.
    ///
    /// Returns the chain outcome, or `None` for tasks without one. Files are
    /// kept.
    pub async fn cancel(&self, id: &TaskId) -> TaskResult<Option<ChainOutcome>> {
        let task = self.get(id).await?;
        let logger = TaskLogger::new(id, "cancel");

        let outcome = match &task.chain {
            Some(chain) => Some(chain.kill().await?),
            None => None,
        };

        self.registry
            .update(id, |stored| {
                stored.sync_chain_outputs();
                stored.is_ended = true;
            })
            .await
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        logger.log_completion(&format!("chain outcome {:?}", outcome));
        Ok(outcome)
    }

    /// Snapshots of every task, with progress refreshed where possible.
    pub async fn list(&self) -> Vec<Task> {
        let mut ids = Vec::new();
        self.registry
            .range(|id, _| {
                ids.push(id.clone());
                true
            })
            .await;

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_progress(&id).await {
                Ok(task) => tasks.push(task),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    TaskLogger::new(&id, "list")
                        .log_warning(&format!("failed to refresh progress: {}", e));
                    if let Ok(task) = self.get(&id).await {
                        tasks.push(task);
                    }
                }
            }
        }
        tasks
    }

    async fn store_upload<R>(&self, path: &Path, mut upload: R) -> TaskResult<()>
    where
        R: AsyncRead + Unpin,
    {
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| TaskError::io(&self.config.work_dir, e))?;

        let mut file = File::create(path)
            .await
            .map_err(|e| TaskError::io(path, e))?;
        tokio::io::copy(&mut upload, &mut file)
            .await
            .map_err(|e| TaskError::io(path, e))?;
        file.flush().await.map_err(|e| TaskError::io(path, e))?;
        Ok(())
    }
}
