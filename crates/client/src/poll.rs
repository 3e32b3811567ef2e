//! Poll a task handle until it resolves, then finalize exactly once.
//!
//! ```text
//! Active ──ok──────► Resolved   (on_final { ok: true })
//!    ├────error────► Failed     (on_final { ok: false })
//!    ├────4xx──────► Failed     (on_final { ok: false }, server message)
//!    ├────timeout──► Failed     (on_final { ok: false }, only with max_attempts)
//!    └────cancel()─► Cancelled  (on_final never fires)
//! ```
//!
//! Each session runs on its own tokio task and issues strictly sequential
//! queries at a constant interval. The first query is sent immediately.
//! A transport error or a 5xx counts as a `pending` observation; a 4xx
//! answer (unknown or forbidden handle) fails the session. State changes and
//! the callback hand-off happen under one lock, so a response that lands
//! after `cancel()` or after a terminal state is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cirrus_core::task::{TaskHandle, TaskStatus, TaskStatusReport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::error::ClientError;

/// Where task status comes from, usually [`ApiClient`](crate::api::ApiClient).
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatusReport, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Constant delay between the end of one query and the next.
    pub interval: Duration,
    /// Stop with a timeout failure after this many queries.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The worker recorded `error`.
    WorkerFailed,
    /// `max_attempts` queries returned no terminal status.
    Timeout,
    /// The server refused the status query for good, e.g. unknown handle.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Active,
    Resolved,
    Failed(FailureReason),
    Cancelled,
}

impl PollState {
    pub fn is_active(self) -> bool {
        self == PollState::Active
    }
}

/// What the finalize callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub ok: bool,
    pub message: String,
}

type Finalizer = Box<dyn FnOnce(TaskOutcome) + Send>;

struct Shared {
    state: PollState,
    attempts: u32,
    on_final: Option<Finalizer>,
}

type SharedState = Arc<Mutex<Shared>>;

fn lock(shared: &SharedState) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle on one running poll loop.
///
/// Dropping the session leaves the loop running; call [`cancel`](Self::cancel)
/// to stop it.
pub struct PollSession {
    handle: TaskHandle,
    shared: SharedState,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PollSession {
    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    pub fn state(&self) -> PollState {
        lock(&self.shared).state
    }

    /// Status queries that have completed so far.
    pub fn attempts(&self) -> u32 {
        lock(&self.shared).attempts
    }

    /// Stop polling. No-op unless the session is still active; the
    /// callback will never fire afterwards.
    pub fn cancel(&self) {
        let dropped = {
            let mut shared = lock(&self.shared);
            if !shared.state.is_active() {
                return;
            }
            shared.state = PollState::Cancelled;
            shared.on_final.take()
        };
        self.cancel.cancel();
        drop(dropped);
        tracing::debug!(task_handle = %self.handle, "Polling cancelled");
    }

    /// Wait for the poll loop to exit and return the final state.
    pub async fn finished(self) -> PollState {
        if let Err(e) = self.join.await {
            tracing::error!(task_handle = %self.handle, error = %e, "Poll loop panicked");
        }
        lock(&self.shared).state
    }
}

/// Start polling `handle` on a new tokio task.
///
/// `on_final` runs at most once, on the polling task, when the task
/// reaches `ok` or `error` (or the attempt bound is hit).
pub fn start_polling<F>(
    source: Arc<dyn StatusSource>,
    handle: TaskHandle,
    config: PollConfig,
    on_final: F,
) -> PollSession
where
    F: FnOnce(TaskOutcome) + Send + 'static,
{
    let shared = Arc::new(Mutex::new(Shared {
        state: PollState::Active,
        attempts: 0,
        on_final: Some(Box::new(on_final)),
    }));
    let cancel = CancellationToken::new();

    let join = tokio::spawn(poll_loop(
        source,
        handle.clone(),
        config,
        Arc::clone(&shared),
        cancel.clone(),
    ));

    PollSession {
        handle,
        shared,
        cancel,
        join,
    }
}

async fn poll_loop(
    source: Arc<dyn StatusSource>,
    handle: TaskHandle,
    config: PollConfig,
    shared: SharedState,
    cancel: CancellationToken,
) {
    tracing::debug!(
        task_handle = %handle,
        interval_ms = config.interval.as_millis() as u64,
        "Polling started",
    );

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = source.fetch_status(&handle) => result,
        };

        let attempts = {
            let mut guard = lock(&shared);
            if !guard.state.is_active() {
                return;
            }
            guard.attempts += 1;
            guard.attempts
        };

        match result {
            Ok(report) => match report.status {
                TaskStatus::Pending => {}
                TaskStatus::Ok => {
                    let message = report.message.unwrap_or_else(|| "Task completed".into());
                    settle(&shared, PollState::Resolved, TaskOutcome { ok: true, message });
                    return;
                }
                TaskStatus::Error => {
                    let message = report.message.unwrap_or_else(|| "Task failed".into());
                    settle(
                        &shared,
                        PollState::Failed(FailureReason::WorkerFailed),
                        TaskOutcome { ok: false, message },
                    );
                    return;
                }
            },
            Err(e) if e.is_permanent() => {
                tracing::warn!(
                    task_handle = %handle,
                    attempts,
                    error = %e,
                    "Status query rejected",
                );
                let message = match e {
                    ClientError::Api { message, .. } => message,
                    other => other.to_string(),
                };
                settle(
                    &shared,
                    PollState::Failed(FailureReason::Rejected),
                    TaskOutcome { ok: false, message },
                );
                return;
            }
            Err(e) => {
                tracing::warn!(task_handle = %handle, attempts, error = %e, "Status query failed");
            }
        }

        if config.max_attempts.is_some_and(|max| attempts >= max) {
            settle(
                &shared,
                PollState::Failed(FailureReason::Timeout),
                TaskOutcome {
                    ok: false,
                    message: format!("Timed out waiting for task {handle} after {attempts} polls"),
                },
            );
            return;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

/// Move an active session to `next` and fire the callback. Returns
/// without effect if the session already left `Active`.
fn settle(shared: &SharedState, next: PollState, outcome: TaskOutcome) {
    let finalizer = {
        let mut guard = lock(shared);
        if !guard.state.is_active() {
            return;
        }
        guard.state = next;
        guard.on_final.take()
    };

    if let Some(on_final) = finalizer {
        on_final(outcome);
    }
}
