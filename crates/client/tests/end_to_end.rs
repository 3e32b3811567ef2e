//! Submission gateway, worker and poll loop wired together in-process.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cirrus_client::error::ClientError;
use cirrus_client::poll::{start_polling, FailureReason, PollConfig, PollState, StatusSource};
use cirrus_core::memory::{InMemoryDirectory, InMemoryTaskStore, RecordingAuditSink};
use cirrus_core::messages;
use cirrus_core::options::{TenantForm, TenantOptions};
use cirrus_core::queue::TaskLookup;
use cirrus_core::roles::{ROLE_ADMIN, ROLE_OPERATOR};
use cirrus_core::submission::{
    Actor, Submission, SubmissionGateway, SubmissionRequest, TenantRecord,
};
use cirrus_core::task::{TaskHandle, TaskStatusReport};
use cirrus_core::types::DbId;
use cirrus_worker::provider::{ProviderError, TenantProvider};
use cirrus_worker::runner::TaskRunner;

const INTERVAL: Duration = Duration::from_millis(100);
const PROVIDER: DbId = 1;
const OPERATOR: DbId = 7;

/// Provider that enforces unique tenant names.
#[derive(Default)]
struct NameRegistry {
    names: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<DbId>>,
}

#[async_trait]
impl TenantProvider for NameRegistry {
    async fn create_tenant(
        &self,
        _ems_id: DbId,
        options: &TenantOptions,
    ) -> Result<(), ProviderError> {
        let name = options.name.clone().unwrap_or_default();
        if !self.names.lock().unwrap().insert(name) {
            return Err(ProviderError::Rejected("name already exists".into()));
        }
        Ok(())
    }

    async fn update_tenant(
        &self,
        _tenant_id: DbId,
        _options: &TenantOptions,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn delete_tenant(&self, tenant_id: DbId) -> Result<(), ProviderError> {
        self.deleted.lock().unwrap().push(tenant_id);
        Ok(())
    }
}

/// Reads status straight from the store, standing in for the HTTP API.
struct StoreStatus {
    store: Arc<InMemoryTaskStore>,
    calls: Mutex<u32>,
}

#[async_trait]
impl StatusSource for StoreStatus {
    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatusReport, ClientError> {
        *self.calls.lock().unwrap() += 1;
        match self.store.find(handle).await {
            Ok(Some(task)) => Ok(TaskStatusReport::from(&task)),
            Ok(None) => Err(ClientError::InvalidResponse(format!("Task {handle} not found"))),
            Err(e) => Err(ClientError::InvalidResponse(e.to_string())),
        }
    }
}

struct Harness {
    gateway: SubmissionGateway,
    runner: TaskRunner,
    status: Arc<StoreStatus>,
    audit: Arc<RecordingAuditSink>,
    provider: Arc<NameRegistry>,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let provider = Arc::new(NameRegistry::default());

        directory.add_provider(PROVIDER).await;
        directory.grant(OPERATOR, PROVIDER).await;
        for (id, name, instance_count) in [(10, "idle", 0), (11, "busy", 2)] {
            directory
                .add_tenant(TenantRecord {
                    id,
                    name: name.into(),
                    ems_id: PROVIDER,
                    ems_ref: format!("ref-{id}"),
                    instance_count,
                })
                .await;
        }

        Self {
            gateway: SubmissionGateway::new(
                store.clone(),
                directory.clone(),
                directory,
                audit.clone(),
            ),
            runner: TaskRunner::new(store.clone(), provider.clone()),
            status: Arc::new(StoreStatus {
                store,
                calls: Mutex::new(0),
            }),
            audit,
            provider,
        }
    }

    fn status_calls(&self) -> u32 {
        *self.status.calls.lock().unwrap()
    }
}

fn operator() -> Actor {
    Actor {
        user_id: OPERATOR,
        role: ROLE_OPERATOR.into(),
    }
}

fn create_form(name: &str) -> TenantForm {
    TenantForm {
        name: Some(name.into()),
        ems_id: Some(PROVIDER.to_string()),
    }
}

struct Finished {
    submission: Submission,
    state: PollState,
    flash: Option<String>,
}

/// Submit, let the poller see `pending` a few times, run the worker, then
/// return the final state and the flash text the caller would show.
async fn submit_and_wait(harness: &Harness, request: SubmissionRequest, label: &str) -> Finished {
    let action = request.action;
    let submission = harness.gateway.submit(request).await.unwrap();
    let handle = submission
        .task_handle
        .clone()
        .expect("a task should be enqueued");

    let flash = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&flash);
    let label = label.to_string();
    let session = start_polling(
        harness.status.clone(),
        handle,
        PollConfig::new(INTERVAL),
        move |outcome| {
            *sink.lock().unwrap() = Some(messages::finished(
                action,
                &label,
                outcome.ok,
                &outcome.message,
            ));
        },
    );

    tokio::time::sleep(INTERVAL * 2 + Duration::from_millis(10)).await;
    assert_eq!(session.state(), PollState::Active);
    assert_eq!(harness.runner.run_once().await.unwrap(), 1);

    let state = session.finished().await;
    let flash = flash.lock().unwrap().clone();
    Finished {
        submission,
        state,
        flash,
    }
}

#[tokio::test(start_paused = true)]
async fn create_resolves_with_worker_message() {
    let harness = Harness::new().await;

    let done = submit_and_wait(
        &harness,
        SubmissionRequest::create(operator(), create_form("tenant-a")),
        "tenant-a",
    )
    .await;

    assert_eq!(done.state, PollState::Resolved);
    assert_eq!(done.flash.as_deref(), Some("Cloud Tenant \"tenant-a\" created"));
    assert_eq!(harness.audit.events().await.len(), 1);

    // Nothing polls once the outcome is delivered.
    let calls = harness.status_calls();
    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(harness.status_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn duplicate_name_fails_with_provider_message() {
    let harness = Harness::new().await;
    harness.provider.names.lock().unwrap().insert("tenant-a".into());

    let done = submit_and_wait(
        &harness,
        SubmissionRequest::create(operator(), create_form("tenant-a")),
        "tenant-a",
    )
    .await;

    assert_eq!(done.state, PollState::Failed(FailureReason::WorkerFailed));
    assert_eq!(
        done.flash.as_deref(),
        Some("Unable to create Cloud Tenant \"tenant-a\": name already exists")
    );
}

#[tokio::test(start_paused = true)]
async fn bulk_delete_skips_busy_tenant_and_deletes_the_rest() {
    let harness = Harness::new().await;
    let admin = Actor {
        user_id: 1,
        role: ROLE_ADMIN.into(),
    };

    let done = submit_and_wait(
        &harness,
        SubmissionRequest::delete(admin, vec![10, 11]),
        "idle",
    )
    .await;

    assert_eq!(done.submission.warnings.len(), 1);
    assert_eq!(done.submission.warnings[0].target_id, 11);
    assert_eq!(done.state, PollState::Resolved);
    assert_eq!(done.flash.as_deref(), Some("Deleted 1 Cloud Tenant"));
    assert_eq!(*harness.provider.deleted.lock().unwrap(), vec![10]);
}
