//! Task orchestration and progress tracking.
//!
//! This crate provides:
//! - The in-memory task registry
//! - The image/video transcode pipeline
//! - Task lifecycle operations (create, progress, end, cancel, clean)
//! - Watch sessions with per-task subscription counting
//! - Configuration, structured logging and metrics

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod service;
pub mod task;
pub mod watch;

pub use config::TaskConfig;
pub use error::{TaskError, TaskResult};
pub use logging::{init_tracing, TaskLogger};
pub use pipeline::TranscodePipeline;
pub use registry::TaskRegistry;
pub use service::TaskService;
pub use task::{public_url, Task};
pub use watch::{ProgressSink, SubscriptionTracker, WatchExit, WatchSession};
