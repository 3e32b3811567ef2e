//! In-memory collaborators.
//!
//! Process-local implementations of the queue, RBAC filter, tenant
//! directory and audit sink. Integration tests across the workspace run
//! the real gateway, worker and poll loop against these instead of
//! PostgreSQL.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::audit::AuditEvent;
use crate::error::CoreError;
use crate::queue::{QueueError, TaskLedger, TaskLookup, TaskQueue};
use crate::roles::ROLE_ADMIN;
use crate::submission::{
    AccessFilter, Actor, AuditSink, ResourceClass, TenantDirectory, TenantRecord,
};
use crate::task::{NewTask, Task, TaskHandle, TaskStatus};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// InMemoryTaskStore
// ---------------------------------------------------------------------------

struct Entry {
    task: Task,
    claimed: bool,
}

/// Task queue kept in a `Vec`, in submission order.
#[derive(Default)]
pub struct InMemoryTaskStore {
    entries: Mutex<Vec<Entry>>,
    reject_enqueue: AtomicBool,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `enqueue` fail with [`QueueError::Rejected`].
    pub fn set_reject_enqueue(&self, reject: bool) {
        self.reject_enqueue.store(reject, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every task, oldest first.
    pub async fn tasks(&self) -> Vec<Task> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|e| e.task.clone())
            .collect()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskStore {
    async fn enqueue(&self, task: NewTask) -> Result<TaskHandle, QueueError> {
        if self.reject_enqueue.load(Ordering::SeqCst) {
            return Err(QueueError::Rejected("queue is not accepting tasks".into()));
        }

        let handle = TaskHandle::generate();
        self.entries.lock().await.push(Entry {
            task: Task {
                handle: handle.clone(),
                status: TaskStatus::Pending,
                message: None,
                action: task.action,
                target_ids: task.target_ids,
                payload: task.payload,
                label: task.label,
                submitted_by: task.submitted_by,
                created_at: chrono::Utc::now(),
                completed_at: None,
            },
            claimed: false,
        });
        Ok(handle)
    }
}

#[async_trait]
impl TaskLookup for InMemoryTaskStore {
    async fn find(&self, handle: &TaskHandle) -> Result<Option<Task>, QueueError> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|e| &e.task.handle == handle)
            .map(|e| e.task.clone()))
    }
}

#[async_trait]
impl TaskLedger for InMemoryTaskStore {
    async fn claim_next(&self) -> Result<Option<Task>, QueueError> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .iter_mut()
            .find(|e| !e.claimed && e.task.status == TaskStatus::Pending)
            .map(|e| {
                e.claimed = true;
                e.task.clone()
            }))
    }

    async fn finish(
        &self,
        handle: &TaskHandle,
        status: TaskStatus,
        message: &str,
    ) -> Result<bool, QueueError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| &e.task.handle == handle)
            .ok_or_else(|| QueueError::Backend(format!("Task {handle} not found")))?;

        if entry.task.status.is_terminal() {
            return Ok(false);
        }
        if !entry.task.status.can_transition_to(status) {
            return Err(QueueError::IllegalTransition {
                handle: handle.clone(),
                from: entry.task.status,
                to: status,
            });
        }

        entry.task.status = status;
        entry.task.message = Some(message.to_string());
        entry.task.completed_at = Some(chrono::Utc::now());
        Ok(true)
    }

    async fn release(&self, handle: &TaskHandle) -> Result<(), QueueError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| &e.task.handle == handle && e.task.status == TaskStatus::Pending)
        {
            entry.claimed = false;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryDirectory
// ---------------------------------------------------------------------------

/// Providers, tenants and per-user provider grants.
///
/// A non-admin user may act on the providers granted to it and on every
/// tenant of those providers. Admins may act on everything.
#[derive(Default)]
pub struct InMemoryDirectory {
    providers: Mutex<BTreeSet<DbId>>,
    tenants: Mutex<BTreeMap<DbId, TenantRecord>>,
    grants: Mutex<HashMap<DbId, HashSet<DbId>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_provider(&self, ems_id: DbId) {
        self.providers.lock().await.insert(ems_id);
    }

    pub async fn add_tenant(&self, tenant: TenantRecord) {
        self.tenants.lock().await.insert(tenant.id, tenant);
    }

    pub async fn remove_tenant(&self, id: DbId) -> Option<TenantRecord> {
        self.tenants.lock().await.remove(&id)
    }

    /// Allow `user_id` to act on provider `ems_id` and its tenants.
    pub async fn grant(&self, user_id: DbId, ems_id: DbId) {
        self.grants
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .insert(ems_id);
    }
}

#[async_trait]
impl AccessFilter for InMemoryDirectory {
    async fn filter_accessible(
        &self,
        class: ResourceClass,
        actor: &Actor,
    ) -> Result<HashSet<DbId>, CoreError> {
        let granted: HashSet<DbId> = if actor.role == ROLE_ADMIN {
            self.providers.lock().await.iter().copied().collect()
        } else {
            self.grants
                .lock()
                .await
                .get(&actor.user_id)
                .cloned()
                .unwrap_or_default()
        };

        Ok(match class {
            ResourceClass::Provider => granted,
            ResourceClass::Tenant => self
                .tenants
                .lock()
                .await
                .values()
                .filter(|t| actor.role == ROLE_ADMIN || granted.contains(&t.ems_id))
                .map(|t| t.id)
                .collect(),
        })
    }
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn find_tenants(&self, ids: &[DbId]) -> Result<Vec<TenantRecord>, CoreError> {
        let tenants = self.tenants.lock().await;
        Ok(ids.iter().filter_map(|id| tenants.get(id).cloned()).collect())
    }
}

// ---------------------------------------------------------------------------
// RecordingAuditSink
// ---------------------------------------------------------------------------

/// Audit sink that keeps every event; can be told to fail.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: AtomicBool,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), CoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Internal("audit sink unavailable".into()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::action::TenantAction;
    use crate::options::TenantOptions;

    fn new_task(label: &str) -> NewTask {
        NewTask {
            action: TenantAction::Delete,
            target_ids: vec![1],
            payload: TenantOptions::default(),
            label: label.into(),
            submitted_by: 1,
        }
    }

    #[tokio::test]
    async fn claims_in_submission_order_and_only_once() {
        let store = InMemoryTaskStore::new();
        let first = store.enqueue(new_task("a")).await.unwrap();
        let second = store.enqueue(new_task("b")).await.unwrap();

        assert_eq!(store.claim_next().await.unwrap().unwrap().handle, first);
        assert_eq!(store.claim_next().await.unwrap().unwrap().handle, second);
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminal_status_is_written_once() {
        let store = InMemoryTaskStore::new();
        let handle = store.enqueue(new_task("a")).await.unwrap();

        assert!(store.finish(&handle, TaskStatus::Error, "boom").await.unwrap());
        assert!(!store.finish(&handle, TaskStatus::Ok, "late").await.unwrap());

        let task = store.find(&handle).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.message.as_deref(), Some("boom"));
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn released_task_is_claimable_again() {
        let store = InMemoryTaskStore::new();
        let handle = store.enqueue(new_task("a")).await.unwrap();

        store.claim_next().await.unwrap().unwrap();
        assert!(store.claim_next().await.unwrap().is_none());

        store.release(&handle).await.unwrap();
        assert_eq!(store.claim_next().await.unwrap().unwrap().handle, handle);
    }

    #[tokio::test]
    async fn releasing_a_terminal_task_does_not_requeue_it() {
        let store = InMemoryTaskStore::new();
        let handle = store.enqueue(new_task("a")).await.unwrap();
        store.claim_next().await.unwrap();
        store.finish(&handle, TaskStatus::Ok, "done").await.unwrap();

        store.release(&handle).await.unwrap();
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finishing_as_pending_is_illegal() {
        let store = InMemoryTaskStore::new();
        let handle = store.enqueue(new_task("a")).await.unwrap();

        assert_matches!(
            store.finish(&handle, TaskStatus::Pending, "").await,
            Err(QueueError::IllegalTransition { .. })
        );
    }

    #[tokio::test]
    async fn non_admin_sees_only_granted_providers_tenants() {
        let directory = InMemoryDirectory::new();
        directory.add_provider(1).await;
        directory.add_provider(2).await;
        for (id, ems_id) in [(10, 1), (20, 2)] {
            directory
                .add_tenant(TenantRecord {
                    id,
                    name: format!("t{id}"),
                    ems_id,
                    ems_ref: String::new(),
                    instance_count: 0,
                })
                .await;
        }
        directory.grant(5, 1).await;
        let user = Actor {
            user_id: 5,
            role: "operator".into(),
        };

        let tenants = directory
            .filter_accessible(ResourceClass::Tenant, &user)
            .await
            .unwrap();
        assert_eq!(tenants, HashSet::from([10]));

        let admin = Actor {
            user_id: 1,
            role: ROLE_ADMIN.into(),
        };
        let providers = directory
            .filter_accessible(ResourceClass::Provider, &admin)
            .await
            .unwrap();
        assert_eq!(providers, HashSet::from([1, 2]));
    }
}
