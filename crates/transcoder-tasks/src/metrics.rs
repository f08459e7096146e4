//! Task engine metrics.
//!
//! Only the recorder-facing side lives here; installing an exporter is left
//! to the embedding service.

use metrics::{counter, gauge};
use transcoder_models::MimeCategory;

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Tasks successfully created, by media category.
    pub const TASKS_CREATED_TOTAL: &str = "transcoder_tasks_created_total";

    /// Task creations that failed, by reason.
    pub const TASK_FAILURES_TOTAL: &str = "transcoder_task_failures_total";

    /// Tasks cleaned and deregistered.
    pub const TASKS_CLEANED_TOTAL: &str = "transcoder_tasks_cleaned_total";

    /// Artifact removals that failed during cleanup.
    pub const CLEANUP_FAILURES_TOTAL: &str = "transcoder_cleanup_failures_total";

    /// Currently running watch sessions.
    pub const ACTIVE_WATCH_SESSIONS: &str = "transcoder_active_watch_sessions";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_task_created(category: MimeCategory) {
    counter!(
        names::TASKS_CREATED_TOTAL,
        "category" => category.as_str()
    )
    .increment(1);
}

pub fn record_task_failure(reason: &'static str) {
    counter!(names::TASK_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_task_cleaned() {
    counter!(names::TASKS_CLEANED_TOTAL).increment(1);
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}

pub fn watch_session_started() {
    gauge!(names::ACTIVE_WATCH_SESSIONS).increment(1.0);
}

pub fn watch_session_finished() {
    gauge!(names::ACTIVE_WATCH_SESSIONS).decrement(1.0);
}
