use super::state::{RunStatus, WorkflowSnapshot};
use super::Command;
use crate::error::{MatchError, Result};
use crate::types::photo::SlotId;
use tokio::sync::{mpsc, oneshot, watch};

/// Command and observation surface of a running workflow.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<WorkflowSnapshot>,
    progress: watch::Receiver<f64>,
}

impl WorkflowHandle {
    pub(super) fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<WorkflowSnapshot>,
        progress: watch::Receiver<f64>,
    ) -> Self {
        Self {
            commands,
            snapshots,
            progress,
        }
    }

    /// Offers raw file content for a slot. Non-image payloads are rejected
    /// and leave the slot unchanged.
    pub async fn submit(
        &self,
        slot: SlotId,
        bytes: Vec<u8>,
        file_name: Option<String>,
    ) -> Result<()> {
        self.call(|reply| Command::Submit {
            slot,
            bytes,
            file_name,
            reply,
        })
        .await?
    }

    pub async fn clear(&self, slot: SlotId) -> Result<()> {
        self.call(|reply| Command::Clear { slot, reply }).await?
    }

    pub async fn request_run(&self) -> Result<RunStatus> {
        self.call(|reply| Command::Run { reply }).await?
    }

    pub async fn request_reset(&self) -> Result<()> {
        self.call(|reply| Command::Reset { reply }).await
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn progress(&self) -> f64 {
        *self.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Waits until the current run has settled or failed.
    pub async fn wait_until_finished(&self) -> Result<WorkflowSnapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| snapshot.stage.is_finished())
            .await
            .map_err(|_| MatchError::WorkflowClosed)?;
        Ok(snapshot.clone())
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| MatchError::WorkflowClosed)?;
        response.await.map_err(|_| MatchError::WorkflowClosed)
    }
}
