//! Claim loop.
//!
//! Every `poll_interval` the runner claims up to `batch_size` pending tasks
//! and executes them one by one. Each claimed task ends with exactly one
//! successful `finish` call; the ledger ignores a second terminal write.
//!
//! An outcome whose `finish` call fails is kept and written again at the
//! start of the next cycle, so the task is neither re-executed nor left
//! claimed and pending. Outcomes still unwritten at shutdown have their
//! claim released for another worker to pick up.

use std::sync::Arc;
use std::time::Duration;

use cirrus_core::action::TenantAction;
use cirrus_core::messages;
use cirrus_core::queue::{QueueError, TaskLedger};
use cirrus_core::task::{Task, TaskHandle, TaskStatus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::provider::{ProviderError, TenantProvider};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BATCH_SIZE: usize = 10;

/// A computed result the ledger has not accepted yet.
struct Unrecorded {
    handle: TaskHandle,
    status: TaskStatus,
    message: String,
}

pub struct TaskRunner {
    ledger: Arc<dyn TaskLedger>,
    provider: Arc<dyn TenantProvider>,
    poll_interval: Duration,
    batch_size: usize,
    unrecorded: Mutex<Vec<Unrecorded>>,
}

impl TaskRunner {
    pub fn new(ledger: Arc<dyn TaskLedger>, provider: Arc<dyn TenantProvider>) -> Self {
        Self {
            ledger,
            provider,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            unrecorded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "Task runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Task runner shutting down");
                    self.release_unrecorded().await;
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Claim cycle failed");
                    }
                }
            }
        }
    }

    /// One claim cycle. Returns the number of tasks finished, including
    /// outcomes from earlier cycles written only now.
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let mut finished = self.record_unrecorded().await;
        for _ in 0..self.batch_size {
            let Some(task) = self.ledger.claim_next().await? else {
                break;
            };
            tracing::info!(
                task_handle = %task.handle,
                action = %task.action,
                targets = task.target_ids.len(),
                "Task claimed",
            );

            let (status, message) = self.execute(&task).await;
            let outcome = Unrecorded {
                handle: task.handle,
                status,
                message,
            };
            if let Some(outcome) = self.record(outcome).await {
                self.unrecorded.lock().await.push(outcome);
            } else {
                finished += 1;
            }
        }
        Ok(finished)
    }

    /// Write one outcome. Hands it back if the ledger call failed.
    async fn record(&self, outcome: Unrecorded) -> Option<Unrecorded> {
        match self
            .ledger
            .finish(&outcome.handle, outcome.status, &outcome.message)
            .await
        {
            Ok(true) => {
                tracing::info!(
                    task_handle = %outcome.handle,
                    status = %outcome.status,
                    "Task finished",
                );
                None
            }
            Ok(false) => {
                tracing::warn!(task_handle = %outcome.handle, "Task was already terminal");
                None
            }
            Err(e) => {
                tracing::error!(
                    task_handle = %outcome.handle,
                    error = %e,
                    "Failed to record task outcome; will retry",
                );
                Some(outcome)
            }
        }
    }

    /// Retry outcomes left over from earlier cycles. Returns how many were
    /// written.
    async fn record_unrecorded(&self) -> usize {
        let pending = std::mem::take(&mut *self.unrecorded.lock().await);
        let mut written = 0;
        let mut failed = Vec::new();
        for outcome in pending {
            match self.record(outcome).await {
                Some(outcome) => failed.push(outcome),
                None => written += 1,
            }
        }
        self.unrecorded.lock().await.extend(failed);
        written
    }

    /// Hand claims of still-unrecorded tasks back to the queue.
    async fn release_unrecorded(&self) {
        let unrecorded = std::mem::take(&mut *self.unrecorded.lock().await);
        for outcome in unrecorded {
            if let Err(e) = self.ledger.release(&outcome.handle).await {
                tracing::error!(
                    task_handle = %outcome.handle,
                    error = %e,
                    "Failed to release task claim",
                );
            }
        }
    }

    /// Apply one task and compose its terminal status and message.
    pub async fn execute(&self, task: &Task) -> (TaskStatus, String) {
        match task.action {
            TenantAction::Create => {
                let result = match task.target_ids.first() {
                    Some(ems_id) => self.provider.create_tenant(*ems_id, &task.payload).await,
                    None => Err(ProviderError::Rejected("no provider selected".into())),
                };
                single_outcome(task, result, messages::worker_created(&task.label))
            }
            TenantAction::Update => {
                let result = match task.target_ids.as_slice() {
                    [tenant_id] => self.provider.update_tenant(*tenant_id, &task.payload).await,
                    _ => Err(ProviderError::Rejected(
                        "update requires exactly one Cloud Tenant".into(),
                    )),
                };
                single_outcome(task, result, messages::worker_updated(&task.label))
            }
            TenantAction::Delete => self.execute_delete(task).await,
        }
    }

    /// Every target is attempted; any failure makes the whole task `error`.
    async fn execute_delete(&self, task: &Task) -> (TaskStatus, String) {
        let mut failures = Vec::new();
        for tenant_id in &task.target_ids {
            if let Err(e) = self.provider.delete_tenant(*tenant_id).await {
                tracing::warn!(
                    task_handle = %task.handle,
                    tenant_id = *tenant_id,
                    error = %e,
                    "Tenant delete failed",
                );
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            (
                TaskStatus::Ok,
                messages::worker_deleted(task.target_ids.len()),
            )
        } else {
            (TaskStatus::Error, failures.join("; "))
        }
    }
}

fn single_outcome(
    task: &Task,
    result: Result<(), ProviderError>,
    success: String,
) -> (TaskStatus, String) {
    match result {
        Ok(()) => (TaskStatus::Ok, success),
        Err(e) => {
            tracing::warn!(task_handle = %task.handle, error = %e, "Task failed");
            (TaskStatus::Error, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use cirrus_core::memory::InMemoryTaskStore;
    use cirrus_core::options::TenantOptions;
    use cirrus_core::queue::{TaskLookup, TaskQueue};
    use cirrus_core::task::NewTask;
    use cirrus_core::types::DbId;

    use super::*;

    /// Provider that records calls and fails on configured ids.
    #[derive(Default)]
    struct FakeProvider {
        failures: HashMap<DbId, String>,
        calls: Mutex<Vec<(&'static str, DbId)>>,
    }

    impl FakeProvider {
        fn failing(id: DbId, message: &str) -> Self {
            Self {
                failures: HashMap::from([(id, message.to_string())]),
                ..Default::default()
            }
        }

        async fn call(&self, op: &'static str, id: DbId) -> Result<(), ProviderError> {
            self.calls.lock().await.push((op, id));
            match self.failures.get(&id) {
                Some(message) => Err(ProviderError::Rejected(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TenantProvider for FakeProvider {
        async fn create_tenant(
            &self,
            ems_id: DbId,
            _options: &TenantOptions,
        ) -> Result<(), ProviderError> {
            self.call("create", ems_id).await
        }

        async fn update_tenant(
            &self,
            tenant_id: DbId,
            _options: &TenantOptions,
        ) -> Result<(), ProviderError> {
            self.call("update", tenant_id).await
        }

        async fn delete_tenant(&self, tenant_id: DbId) -> Result<(), ProviderError> {
            self.call("delete", tenant_id).await
        }
    }

    /// Ledger whose `finish` fails a set number of times before passing
    /// through to the in-memory store.
    struct FlakyLedger {
        store: Arc<InMemoryTaskStore>,
        finish_failures: AtomicU32,
    }

    impl FlakyLedger {
        fn new(store: &Arc<InMemoryTaskStore>, finish_failures: u32) -> Arc<Self> {
            Arc::new(Self {
                store: store.clone(),
                finish_failures: AtomicU32::new(finish_failures),
            })
        }
    }

    #[async_trait]
    impl TaskLedger for FlakyLedger {
        async fn claim_next(&self) -> Result<Option<Task>, QueueError> {
            self.store.claim_next().await
        }

        async fn finish(
            &self,
            handle: &TaskHandle,
            status: TaskStatus,
            message: &str,
        ) -> Result<bool, QueueError> {
            let failing = self
                .finish_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(QueueError::Backend("connection reset".into()));
            }
            self.store.finish(handle, status, message).await
        }

        async fn release(&self, handle: &TaskHandle) -> Result<(), QueueError> {
            self.store.release(handle).await
        }
    }

    fn task(action: TenantAction, target_ids: Vec<DbId>, label: &str) -> NewTask {
        NewTask {
            action,
            target_ids,
            payload: TenantOptions {
                name: Some(label.into()),
                ..Default::default()
            },
            label: label.into(),
            submitted_by: 7,
        }
    }

    fn runner(store: &Arc<InMemoryTaskStore>, provider: FakeProvider) -> TaskRunner {
        TaskRunner::new(store.clone(), Arc::new(provider))
    }

    #[tokio::test]
    async fn create_success_records_name_created() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Create, vec![1], "tenant-a"))
            .await
            .unwrap();

        assert_eq!(runner(&store, FakeProvider::default()).run_once().await.unwrap(), 1);

        let done = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Ok);
        assert_eq!(done.message.as_deref(), Some("tenant-a created"));
    }

    #[tokio::test]
    async fn provider_failure_is_recorded_verbatim() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Create, vec![1], "tenant-a"))
            .await
            .unwrap();

        runner(&store, FakeProvider::failing(1, "name already exists"))
            .run_once()
            .await
            .unwrap();

        let done = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Error);
        assert_eq!(done.message.as_deref(), Some("name already exists"));
    }

    #[tokio::test]
    async fn update_records_name_updated() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Update, vec![10], "renamed"))
            .await
            .unwrap();

        runner(&store, FakeProvider::default()).run_once().await.unwrap();

        let done = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(done.message.as_deref(), Some("renamed updated"));
    }

    #[tokio::test]
    async fn batch_delete_attempts_every_target() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Delete, vec![10, 12], "idle, spare"))
            .await
            .unwrap();
        let provider = Arc::new(FakeProvider::default());
        let runner = TaskRunner::new(store.clone(), provider.clone());

        runner.run_once().await.unwrap();

        let done = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Ok);
        assert_eq!(done.message.as_deref(), Some("Deleted 2 Cloud Tenants"));
        assert_eq!(
            *provider.calls.lock().await,
            vec![("delete", 10), ("delete", 12)]
        );
    }

    #[tokio::test]
    async fn partial_delete_failure_fails_the_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Delete, vec![10, 12], "idle, spare"))
            .await
            .unwrap();

        runner(&store, FakeProvider::failing(12, "spare is locked"))
            .run_once()
            .await
            .unwrap();

        let done = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Error);
        assert_eq!(done.message.as_deref(), Some("spare is locked"));
    }

    #[tokio::test]
    async fn claims_at_most_batch_size_per_cycle() {
        let store = Arc::new(InMemoryTaskStore::new());
        for name in ["a", "b", "c"] {
            store
                .enqueue(task(TenantAction::Create, vec![1], name))
                .await
                .unwrap();
        }
        let runner = runner(&store, FakeProvider::default()).with_batch_size(2);

        assert_eq!(runner.run_once().await.unwrap(), 2);
        assert_eq!(runner.run_once().await.unwrap(), 1);
        assert_eq!(runner.run_once().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Create, vec![1], "tenant-a"))
            .await
            .unwrap();
        let runner = Arc::new(
            runner(&store, FakeProvider::default())
                .with_poll_interval(Duration::from_millis(50)),
        );
        let cancel = CancellationToken::new();

        let join = tokio::spawn({
            let runner = runner.clone();
            let cancel = cancel.clone();
            async move { runner.run(cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        join.await.unwrap();

        let done = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Ok);
    }

    #[tokio::test]
    async fn failed_outcome_write_is_retried_without_re_executing() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Create, vec![1], "tenant-a"))
            .await
            .unwrap();
        let provider = Arc::new(FakeProvider::default());
        let runner = TaskRunner::new(FlakyLedger::new(&store, 1), provider.clone());

        assert_eq!(runner.run_once().await.unwrap(), 0);
        assert_eq!(
            store.find(&handle).await.unwrap().unwrap().status,
            TaskStatus::Pending
        );

        assert_eq!(runner.run_once().await.unwrap(), 1);
        let done = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Ok);
        assert_eq!(done.message.as_deref(), Some("tenant-a created"));
        assert_eq!(*provider.calls.lock().await, vec![("create", 1)]);
    }

    #[tokio::test]
    async fn failed_outcome_write_does_not_abandon_the_batch() {
        let store = Arc::new(InMemoryTaskStore::new());
        let first = store
            .enqueue(task(TenantAction::Create, vec![1], "a"))
            .await
            .unwrap();
        let second = store
            .enqueue(task(TenantAction::Create, vec![1], "b"))
            .await
            .unwrap();
        let runner = TaskRunner::new(
            FlakyLedger::new(&store, 1),
            Arc::new(FakeProvider::default()),
        );

        assert_eq!(runner.run_once().await.unwrap(), 1);
        assert_eq!(
            store.find(&second).await.unwrap().unwrap().status,
            TaskStatus::Ok
        );

        runner.run_once().await.unwrap();
        assert_eq!(
            store.find(&first).await.unwrap().unwrap().status,
            TaskStatus::Ok
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_claims_of_unrecorded_tasks() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handle = store
            .enqueue(task(TenantAction::Create, vec![1], "tenant-a"))
            .await
            .unwrap();
        let runner = Arc::new(
            TaskRunner::new(
                FlakyLedger::new(&store, u32::MAX),
                Arc::new(FakeProvider::default()),
            )
            .with_poll_interval(Duration::from_millis(50)),
        );
        let cancel = CancellationToken::new();

        let join = tokio::spawn({
            let runner = runner.clone();
            let cancel = cancel.clone();
            async move { runner.run(cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        join.await.unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.handle, handle);
        assert_eq!(claimed.status, TaskStatus::Pending);
    }
}
