//! Integration tests for the task engine.
//!
//! Most tests drive [`transcoder_tasks::TaskService`] against
//! [`fake_engine::FakeEngine`]; `ffmpeg_tests` needs the real binaries.

pub mod lifecycle_tests;
pub mod watch_tests;
