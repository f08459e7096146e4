//! Supervised chain of dependent transcode stages.
//!
//! Stage N+1 is launched only after stage N exits successfully. The first
//! stage is launched synchronously so launch failures reach the caller; the
//! rest run on a background supervisor task. A single [`ChainHandle::kill`]
//! terminates whichever stage is active.
//!
//! Stages share one progress log. It is removed before each later stage is
//! launched, so its contents always belong to the active stage and a finished
//! stage's `progress=end` cannot be mistaken for the next one's.
//!
//! Dropping every handle does not stop the chain.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::{MediaEngine, StageProcess, TranscodeStage};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_if_exists;

/// How a chain finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every stage exited successfully
    Completed,
    /// A stage exited non-zero (or could not be waited on)
    StageFailed { stage: usize, exit_code: Option<i32> },
    /// A later stage could not be started
    LaunchFailed { stage: usize, message: String },
    /// Terminated through [`ChainHandle::kill`]
    Killed { stage: usize },
}

/// Observable supervisor state.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    /// Index of the running (or last attempted) stage
    pub active_stage: usize,
    /// Number of stages in the chain
    pub stage_count: usize,
    /// Destinations of stages that exited successfully, in order
    pub completed_outputs: Vec<PathBuf>,
    /// Set once the supervisor is done
    pub outcome: Option<ChainOutcome>,
}

impl ChainState {
    /// Whether the last stage has been reached.
    pub fn on_final_stage(&self) -> bool {
        self.active_stage + 1 >= self.stage_count
    }
}

/// Shared handle to a running chain.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    state: watch::Receiver<ChainState>,
    cancel: Arc<watch::Sender<bool>>,
}

impl ChainHandle {
    /// Current supervisor state.
    pub fn state(&self) -> ChainState {
        self.state.borrow().clone()
    }

    /// Wait until the chain finishes.
    pub async fn wait(&self) -> MediaResult<ChainOutcome> {
        let mut rx = self.state.clone();
        let outcome = rx
            .wait_for(|s| s.outcome.is_some())
            .await
            .ok()
            .and_then(|s| s.outcome.clone());
        outcome.ok_or_else(|| MediaError::internal("transcode supervisor exited without an outcome"))
    }

    /// Terminate the active stage and wait for the supervisor to stop.
    ///
    /// Killing a finished chain returns its original outcome.
    pub async fn kill(&self) -> MediaResult<ChainOutcome> {
        // Fails only when the supervisor is already gone.
        let _ = self.cancel.send(true);
        self.wait().await
    }
}

/// Launches and supervises stage chains.
pub struct TranscodeChain;

impl TranscodeChain {
    /// Start the first stage and hand the rest to a supervisor task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(
        engine: Arc<dyn MediaEngine>,
        stages: Vec<TranscodeStage>,
    ) -> MediaResult<ChainHandle> {
        let first = stages
            .first()
            .ok_or_else(|| MediaError::internal("transcode chain has no stages"))?;
        let process = engine.start_transcode(first)?;

        let (state_tx, state_rx) = watch::channel(ChainState {
            active_stage: 0,
            stage_count: stages.len(),
            completed_outputs: Vec::new(),
            outcome: None,
        });
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(supervise(engine, stages, process, state_tx, cancel_rx));

        Ok(ChainHandle {
            state: state_rx,
            cancel: Arc::new(cancel_tx),
        })
    }
}

async fn supervise(
    engine: Arc<dyn MediaEngine>,
    stages: Vec<TranscodeStage>,
    mut process: Box<dyn StageProcess>,
    state_tx: watch::Sender<ChainState>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut stage = 0;

    let outcome = loop {
        let exit = tokio::select! {
            exit = process.wait() => Some(exit),
            _ = cancelled(&mut cancel_rx) => None,
        };

        match exit {
            None => {
                info!(stage, "Killing transcode stage");
                if let Err(e) = process.kill().await {
                    warn!(stage, "Failed to kill transcode stage: {}", e);
                }
                break ChainOutcome::Killed { stage };
            }
            Some(Err(e)) => {
                warn!(stage, "Failed waiting on transcode stage: {}", e);
                break ChainOutcome::StageFailed {
                    stage,
                    exit_code: None,
                };
            }
            Some(Ok(exit)) if !exit.is_success() => {
                // Not surfaced to task state: completion is judged from the
                // progress log alone.
                warn!(
                    stage,
                    exit_code = ?exit.code,
                    "Transcode stage failed, skipping remaining stages"
                );
                break ChainOutcome::StageFailed {
                    stage,
                    exit_code: exit.code,
                };
            }
            Some(Ok(_)) => {
                let output = stages[stage].destination.clone();
                debug!(stage, "Transcode stage finished: {}", output.display());
                state_tx.send_modify(|s| s.completed_outputs.push(output));
            }
        }

        stage += 1;
        if stage == stages.len() {
            break ChainOutcome::Completed;
        }
        if *cancel_rx.borrow() {
            break ChainOutcome::Killed { stage };
        }

        if let Err(e) = remove_if_exists(&stages[stage].progress_log).await {
            warn!(stage, "Failed to reset progress log: {}", e);
            state_tx.send_modify(|s| s.active_stage = stage);
            break ChainOutcome::LaunchFailed {
                stage,
                message: format!("progress log reset failed: {}", e),
            };
        }

        match engine.start_transcode(&stages[stage]) {
            Ok(next) => {
                process = next;
                state_tx.send_modify(|s| s.active_stage = stage);
            }
            Err(e) => {
                warn!(stage, "Failed to launch transcode stage: {}", e);
                state_tx.send_modify(|s| s.active_stage = stage);
                break ChainOutcome::LaunchFailed {
                    stage,
                    message: e.to_string(),
                };
            }
        }
    };

    state_tx.send_modify(|s| s.outcome = Some(outcome));
}

/// Resolve once cancellation is requested; never resolves if every handle is
/// dropped first.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
