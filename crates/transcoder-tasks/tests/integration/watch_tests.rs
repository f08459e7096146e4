//! Watch session tests: cadence, exits and last-subscriber cleanup.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use transcoder_models::TaskId;
use transcoder_tasks::{Task, TaskService, WatchExit, WatchSession};

use super::lifecycle_tests::{test_service, work_files};

struct Watcher {
    snapshots: mpsc::Receiver<Task>,
    disconnect: watch::Sender<bool>,
    handle: JoinHandle<WatchExit>,
}

fn spawn_watcher(service: &Arc<TaskService>, id: &TaskId) -> Watcher {
    let (tx, snapshots) = mpsc::channel(256);
    let (disconnect, disconnect_rx) = watch::channel(false);
    let session = WatchSession::new(service.clone(), id.clone());
    let handle = tokio::spawn(async move {
        let mut tx = tx;
        session.run(&mut tx, disconnect_rx).await
    });
    Watcher {
        snapshots,
        disconnect,
        handle,
    }
}

async fn wait_for_subscribers(service: &TaskService, id: &TaskId, count: usize) {
    for _ in 0..500 {
        if service.subscriptions().count(id).await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} subscribers", count);
}

#[tokio::test]
async fn test_watcher_receives_snapshots_and_cleans_on_disconnect() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);
    let task = service
        .create_task("clip.mp4", &b"mp4 bytes"[..], "user-1")
        .await
        .unwrap();

    let mut watcher = spawn_watcher(&service, &task.id);
    let snapshot = watcher.snapshots.recv().await.unwrap();
    assert_eq!(snapshot.id, task.id);
    assert!(!snapshot.is_ended);
    assert_eq!(snapshot.progress_info.out_time_seconds, 12);

    watcher.disconnect.send(true).unwrap();
    assert_eq!(watcher.handle.await.unwrap(), WatchExit::PeerDisconnected);

    assert!(service.get(&task.id).await.unwrap_err().is_not_found());
    assert!(work_files(&dir.path().join("work")).is_empty());
}

#[tokio::test]
async fn test_only_last_watcher_cleans() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);
    let task = service
        .create_task("photo.jpg", &b"jpeg bytes"[..], "user-1")
        .await
        .unwrap();

    let first = spawn_watcher(&service, &task.id);
    let second = spawn_watcher(&service, &task.id);
    wait_for_subscribers(&service, &task.id, 2).await;

    drop(first.disconnect);
    assert_eq!(first.handle.await.unwrap(), WatchExit::PeerDisconnected);
    assert!(service.get(&task.id).await.is_ok());
    assert!(task.origin_path.exists());

    second.disconnect.send(true).unwrap();
    assert_eq!(second.handle.await.unwrap(), WatchExit::PeerDisconnected);
    assert!(service.get(&task.id).await.unwrap_err().is_not_found());
    assert!(!task.origin_path.exists());
}

#[tokio::test]
async fn test_watcher_stops_when_task_removed() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);
    let task = service
        .create_task("photo.jpg", &b"jpeg bytes"[..], "user-1")
        .await
        .unwrap();

    let mut watcher = spawn_watcher(&service, &task.id);
    let snapshot = watcher.snapshots.recv().await.unwrap();
    assert!(snapshot.is_ended);

    service.clean(&task.id).await.unwrap();
    assert_eq!(watcher.handle.await.unwrap(), WatchExit::TaskRemoved);
    assert_eq!(service.subscriptions().count(&task.id).await, 0);
}

#[tokio::test]
async fn test_watcher_stops_when_send_fails() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);
    let task = service
        .create_task("photo.jpg", &b"jpeg bytes"[..], "user-1")
        .await
        .unwrap();

    let watcher = spawn_watcher(&service, &task.id);
    drop(watcher.snapshots);

    assert_eq!(watcher.handle.await.unwrap(), WatchExit::SendFailed);
    // Send failures are not disconnections: the task stays.
    assert!(service.get(&task.id).await.is_ok());
    drop(watcher.disconnect);
}

#[tokio::test]
async fn test_watching_unknown_task_exits_immediately() {
    let dir = TempDir::new().unwrap();
    let (service, _engine) = test_service(&dir);

    let watcher = spawn_watcher(&service, &TaskId::from("missing"));
    assert_eq!(watcher.handle.await.unwrap(), WatchExit::TaskRemoved);
    drop(watcher.disconnect);
}
