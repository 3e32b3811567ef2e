//! Task queue seams.
//!
//! The queue backend is an existing shared resource; these traits are the
//! only way the gateway, the status endpoint and the worker touch it.
//! Each concern gets its own trait so a caller can only do what its role
//! allows: the gateway enqueues, the status endpoint reads, and only the
//! worker ledger may write a terminal status.

use async_trait::async_trait;

use crate::task::{NewTask, Task, TaskHandle, TaskStatus};

/// Errors raised by a queue backend.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue backend rejected the task: {0}")]
    Rejected(String),

    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Illegal status transition for task {handle}: {from} -> {to}")]
    IllegalTransition {
        handle: TaskHandle,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Enqueue side, used by the submission gateway.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Persist a new `pending` task and return its handle without waiting
    /// for any work to run.
    async fn enqueue(&self, task: NewTask) -> Result<TaskHandle, QueueError>;
}

/// Read side, used by the status endpoint.
#[async_trait]
pub trait TaskLookup: Send + Sync {
    async fn find(&self, handle: &TaskHandle) -> Result<Option<Task>, QueueError>;
}

/// Worker side: the sole writer of a task's status.
#[async_trait]
pub trait TaskLedger: Send + Sync {
    /// Claim the oldest unclaimed pending task, if any. A claimed task is
    /// never handed to a second caller.
    async fn claim_next(&self) -> Result<Option<Task>, QueueError>;

    /// Record the terminal status of a claimed task.
    ///
    /// Returns `Ok(false)` when the task was already terminal; the stored
    /// status is left as it was.
    async fn finish(
        &self,
        handle: &TaskHandle,
        status: TaskStatus,
        message: &str,
    ) -> Result<bool, QueueError>;

    /// Give up a claim without recording an outcome, so a later
    /// `claim_next` hands the task out again. No-op once terminal.
    async fn release(&self, handle: &TaskHandle) -> Result<(), QueueError>;
}
