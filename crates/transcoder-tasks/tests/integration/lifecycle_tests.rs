//! Task lifecycle tests: create, progress, end, cancel and clean.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use transcoder_media::ChainOutcome;
use transcoder_models::{MimeCategory, Phase, TaskId};
use transcoder_tasks::{TaskConfig, TaskError, TaskService};

use super::fake_engine::FakeEngine;

pub fn test_config(dir: &TempDir) -> TaskConfig {
    TaskConfig {
        work_dir: dir.path().join("work"),
        public_prefix: "/public".to_string(),
        active_poll_interval: Duration::from_millis(10),
        idle_poll_interval: Duration::from_millis(20),
        ffmpeg_bin: None,
        ffprobe_bin: None,
    }
}

pub fn test_service(dir: &TempDir) -> (Arc<TaskService>, Arc<FakeEngine>) {
    let engine = FakeEngine::new();
    let service = TaskService::new(test_config(dir), engine.clone());
    (Arc::new(service), engine)
}

/// File names currently in the work dir, sorted.
pub fn work_files(work_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(work_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_image_task_ends_immediately() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);

    let task = service
        .create_task("photo.jpg", &b"jpeg bytes"[..], "user-1")
        .await
        .unwrap();

    assert_eq!(task.category, MimeCategory::Image);
    assert_eq!(task.owner, "user-1");
    assert!(task.is_ended);
    assert_eq!(task.progress_info.phase, Phase::End);
    assert_eq!((task.media_info.width, task.media_info.height), (1920, 1080));
    assert!(task.progress_log_path.is_none());
    assert!(task.chain.is_none());

    let stem = format!("{}@1920x1080", task.id);
    assert_eq!(
        task.output_files,
        vec![
            dir.path().join("work").join(format!("{}.avif", stem)),
            dir.path().join("work").join(format!("{}.webp", stem)),
        ]
    );
    assert_eq!(task.public_url, Some(format!("/public/{}.avif", stem)));
    assert!(task.output_files.iter().all(|p| p.exists()));
    assert!(task.origin_path.exists());

    assert!(service.is_ended(&task.id).await.unwrap());
    assert_eq!(service.registry().len().await, 1);
}

#[tokio::test]
async fn test_video_task_ends_after_final_stage() {
    let dir = TempDir::new().unwrap();
    let (service, engine) = test_service(&dir);
    let work = dir.path().join("work");

    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();
    let id = task.id.clone();
    let stem = format!("{}@256x144", id);

    assert_eq!(task.category, MimeCategory::Video);
    assert!(!task.is_ended);
    assert_eq!(task.media_info.duration_seconds, 80);
    assert_eq!(
        task.progress_log_path,
        Some(work.join(format!("{}.progress.txt", stem)))
    );
    assert_eq!(
        task.output_files,
        vec![work.join(format!("{}.cover.avif", stem))]
    );
    assert_eq!(
        task.pending_outputs,
        vec![
            work.join(format!("{}.av1.mp4", stem)),
            work.join(format!("{}.hevc.mp4", stem)),
        ]
    );
    // The rotation probe frame is gone.
    assert!(!work_files(&work).iter().any(|f| f.contains(".1f")));

    assert!(!service.is_ended(&id).await.unwrap());
    let snapshot = service.load_progress(&id).await.unwrap();
    assert_eq!(snapshot.progress_info.phase, Phase::Continue);
    assert_eq!(snapshot.progress_info.out_time_seconds, 12);

    // Stage A finishing does not end the task.
    engine.finish_stage();
    engine.wait_for_stages(2).await;
    assert!(!service.is_ended(&id).await.unwrap());
    let snapshot = service.load_progress(&id).await.unwrap();
    assert!(!snapshot.is_ended);
    assert_eq!(snapshot.output_files.len(), 2);

    engine.finish_stage();
    let chain = task.chain.clone().unwrap();
    assert_eq!(chain.wait().await.unwrap(), ChainOutcome::Completed);

    assert!(service.is_ended(&id).await.unwrap());
    let snapshot = service.load_progress(&id).await.unwrap();
    assert!(snapshot.is_ended);
    assert_eq!(snapshot.progress_info.phase, Phase::End);
    assert_eq!(snapshot.progress_info.frame, 805);
    assert!(snapshot.pending_outputs.is_empty());
    assert_eq!(
        snapshot.output_urls("/public"),
        vec![
            format!("/public/{}.cover.avif", stem),
            format!("/public/{}.av1.mp4", stem),
            format!("/public/{}.hevc.mp4", stem),
        ]
    );

    // A missing artifact does not stop cleanup.
    std::fs::remove_file(work.join(format!("{}.av1.mp4", stem))).unwrap();
    service.clean(&id).await.unwrap();

    assert!(work_files(&work).is_empty());
    assert!(matches!(
        service.load_progress(&id).await,
        Err(TaskError::NotFound(_))
    ));
}

/// Poll until the chain has moved on to `stage`.
async fn wait_for_active_stage(chain: &transcoder_media::ChainHandle, stage: usize) {
    for _ in 0..500 {
        if chain.state().active_stage == stage {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("chain never reached stage {}", stage);
}

#[tokio::test]
async fn test_first_stage_end_does_not_end_task_before_final_stage_reports() {
    let dir = TempDir::new().unwrap();
    let (service, engine) = test_service(&dir);
    engine.silent_launch();

    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();
    let chain = task.chain.clone().unwrap();

    // Stage A writes its end block; stage B has not reported anything yet.
    engine.finish_stage();
    engine.wait_for_stages(2).await;
    wait_for_active_stage(&chain, 1).await;
    assert!(chain.state().outcome.is_none());

    let snapshot = service.load_progress(&task.id).await.unwrap();
    assert!(!snapshot.is_ended);
    assert_eq!(snapshot.progress_info.phase, Phase::Continue);
    assert!(!service.is_ended(&task.id).await.unwrap());

    engine.finish_stage();
    assert_eq!(chain.wait().await.unwrap(), ChainOutcome::Completed);
    let snapshot = service.load_progress(&task.id).await.unwrap();
    assert!(snapshot.is_ended);
    assert_eq!(snapshot.progress_info.frame, 805);
}

#[tokio::test]
async fn test_failed_stage_leaves_task_in_progress() {
    let dir = TempDir::new().unwrap();
    let (service, engine) = test_service(&dir);
    engine.fail_stage();

    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();
    let chain = task.chain.clone().unwrap();

    engine.finish_stage();
    assert_eq!(
        chain.wait().await.unwrap(),
        ChainOutcome::StageFailed {
            stage: 0,
            exit_code: Some(1)
        }
    );
    assert_eq!(engine.started_stages().len(), 1);

    // Completion is judged from the log only, and the log never says end.
    let snapshot = service.load_progress(&task.id).await.unwrap();
    assert!(!snapshot.is_ended);
    assert_eq!(snapshot.progress_info.phase, Phase::Continue);
    assert_eq!(snapshot.pending_outputs.len(), 2);
    assert!(!service.is_ended(&task.id).await.unwrap());

    service.clean(&task.id).await.unwrap();
    assert!(work_files(&dir.path().join("work")).is_empty());
}

#[tokio::test]
async fn test_malformed_progress_keeps_stored_snapshot() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);

    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();
    let snapshot = service.load_progress(&task.id).await.unwrap();
    assert_eq!(snapshot.progress_info.frame, 120);

    let log = task.progress_log_path.clone().unwrap();
    std::fs::write(&log, "frame=abc\nprogress=end\n").unwrap();

    let err = service.load_progress(&task.id).await.unwrap_err();
    assert!(matches!(err, TaskError::ProgressParse(_)));

    let stored = service.get(&task.id).await.unwrap();
    assert_eq!(stored.progress_info.frame, 120);
    assert_eq!(stored.progress_info.phase, Phase::Continue);
    assert!(!stored.is_ended);

    // An unreadable log reads as ended.
    assert!(service.is_ended(&task.id).await.unwrap());

    service.cancel(&task.id).await.unwrap();
}

#[tokio::test]
async fn test_rotated_video_uses_decoded_frame_dimensions() {
    let dir = TempDir::new().unwrap();
    let (service, engine) = test_service(&dir);
    engine.rotated();

    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();

    assert_eq!((task.media_info.width, task.media_info.height), (1080, 1920));
    assert_eq!(task.media_info.duration_seconds, 80);
    let stem = format!("{}@256x455", task.id);
    assert_eq!(
        task.progress_log_path,
        Some(dir.path().join("work").join(format!("{}.progress.txt", stem)))
    );

    service.cancel(&task.id).await.unwrap();
}

#[tokio::test]
async fn test_load_progress_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);

    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();

    let first = service.load_progress(&task.id).await.unwrap();
    let second = service.load_progress(&task.id).await.unwrap();
    assert_eq!(first.progress_info, second.progress_info);
    assert_eq!(first.is_ended, second.is_ended);

    service.cancel(&task.id).await.unwrap();
}

#[tokio::test]
async fn test_unsupported_file_rejected() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);

    let err = service
        .create_task("notes.txt", &b"hello"[..], "user-1")
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::UnsupportedMediaType { .. }));
    assert!(service.registry().is_empty().await);
    assert!(work_files(&dir.path().join("work")).is_empty());
}

#[tokio::test]
async fn test_failed_image_encode_leaves_nothing_behind() {
    let dir = TempDir::new().unwrap();
    let (service, engine) = test_service(&dir);
    engine.fail_image_encode();

    let err = service
        .create_task("photo.png", &b"png bytes"[..], "user-1")
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Encode(_)));
    assert!(service.registry().is_empty().await);
    assert!(work_files(&dir.path().join("work")).is_empty());
}

#[tokio::test]
async fn test_launch_failure_leaves_nothing_behind() {
    let dir = TempDir::new().unwrap();
    let (service, engine) = test_service(&dir);
    engine.fail_launch();

    let err = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::EncodeLaunch(_)));
    assert!(service.registry().is_empty().await);
    assert!(work_files(&dir.path().join("work")).is_empty());
}

#[tokio::test]
async fn test_cancel_kills_chain_and_ends_task() {
    let dir = TempDir::new().unwrap();
    let (service, engine) = test_service(&dir);

    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();

    let outcome = service.cancel(&task.id).await.unwrap();
    assert_eq!(outcome, Some(ChainOutcome::Killed { stage: 0 }));
    assert_eq!(engine.started_stages().len(), 1);

    assert!(service.is_ended(&task.id).await.unwrap());
    let snapshot = service.get(&task.id).await.unwrap();
    assert!(snapshot.is_ended);
    assert_eq!(snapshot.pending_outputs.len(), 2);

    // Files are still there until cleaned.
    assert!(snapshot.origin_path.exists());
    service.clean(&task.id).await.unwrap();
    assert!(!snapshot.origin_path.exists());
}

#[tokio::test]
async fn test_cancel_image_has_no_chain() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);

    let task = service
        .create_task("photo.jpg", &b"jpeg bytes"[..], "user-1")
        .await
        .unwrap();
    assert_eq!(service.cancel(&task.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_list_returns_every_task() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);

    let image = service
        .create_task("photo.jpg", &b"jpeg bytes"[..], "user-1")
        .await
        .unwrap();
    let video = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-2")
        .await
        .unwrap();

    let mut ids: Vec<TaskId> = service.list().await.into_iter().map(|t| t.id).collect();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    let mut expected = vec![image.id, video.id.clone()];
    expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(ids, expected);

    service.cancel(&video.id).await.unwrap();
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);
    let id = TaskId::from("missing");

    assert!(service.get(&id).await.unwrap_err().is_not_found());
    assert!(service.is_ended(&id).await.unwrap_err().is_not_found());
    assert!(service.clean(&id).await.unwrap_err().is_not_found());
    assert!(service.cancel(&id).await.unwrap_err().is_not_found());
}

#[test]
fn test_work_files_of_missing_dir() {
    assert!(work_files(&PathBuf::from("/definitely/not/here")).is_empty());
}
