//! PostgreSQL-backed implementations of the gateway and worker seams.

use std::collections::HashSet;

use async_trait::async_trait;
use cirrus_core::audit::AuditEvent;
use cirrus_core::error::CoreError;
use cirrus_core::queue::{QueueError, TaskLedger, TaskLookup, TaskQueue};
use cirrus_core::roles::ROLE_ADMIN;
use cirrus_core::submission::{
    AccessFilter, Actor, AuditSink, ResourceClass, TenantDirectory, TenantRecord,
};
use cirrus_core::task::{NewTask, Task, TaskHandle, TaskStatus};
use cirrus_core::types::DbId;

use crate::models::audit::CreateAuditLog;
use crate::models::task::TaskRow;
use crate::repositories::{AccessRepo, AuditLogRepo, TaskRepo, TenantRepo};
use crate::DbPool;

fn backend(err: sqlx::Error) -> QueueError {
    QueueError::Backend(err.to_string())
}

fn internal(err: sqlx::Error) -> CoreError {
    CoreError::Internal(err.to_string())
}

fn to_task(row: TaskRow) -> Result<Task, QueueError> {
    Task::try_from(row).map_err(|e| QueueError::Backend(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// The `tasks` table as a queue.
#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskQueue for PgTaskStore {
    async fn enqueue(&self, task: NewTask) -> Result<TaskHandle, QueueError> {
        let handle = TaskHandle::generate();
        let row = TaskRepo::insert(&self.pool, handle.as_str(), &task)
            .await
            .map_err(|e| {
                tracing::error!(task_handle = %handle, error = %e, "Task insert failed");
                QueueError::Rejected(e.to_string())
            })?;
        Ok(TaskHandle::from(row.handle))
    }
}

#[async_trait]
impl TaskLookup for PgTaskStore {
    async fn find(&self, handle: &TaskHandle) -> Result<Option<Task>, QueueError> {
        TaskRepo::find_by_handle(&self.pool, handle.as_str())
            .await
            .map_err(backend)?
            .map(to_task)
            .transpose()
    }
}

#[async_trait]
impl TaskLedger for PgTaskStore {
    async fn claim_next(&self) -> Result<Option<Task>, QueueError> {
        TaskRepo::claim_next(&self.pool)
            .await
            .map_err(backend)?
            .map(to_task)
            .transpose()
    }

    async fn finish(
        &self,
        handle: &TaskHandle,
        status: TaskStatus,
        message: &str,
    ) -> Result<bool, QueueError> {
        if !TaskStatus::Pending.can_transition_to(status) {
            return Err(QueueError::IllegalTransition {
                handle: handle.clone(),
                from: TaskStatus::Pending,
                to: status,
            });
        }
        TaskRepo::finish(&self.pool, handle.as_str(), status, message)
            .await
            .map_err(backend)
    }

    async fn release(&self, handle: &TaskHandle) -> Result<(), QueueError> {
        TaskRepo::release(&self.pool, handle.as_str())
            .await
            .map_err(backend)
    }
}

// ---------------------------------------------------------------------------
// RBAC + tenant directory
// ---------------------------------------------------------------------------

/// RBAC scope and tenant lookups backed by `user_provider_access`.
#[derive(Clone)]
pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessFilter for PgDirectory {
    async fn filter_accessible(
        &self,
        class: ResourceClass,
        actor: &Actor,
    ) -> Result<HashSet<DbId>, CoreError> {
        let admin = actor.role == ROLE_ADMIN;
        let ids = match (class, admin) {
            (ResourceClass::Provider, true) => AccessRepo::all_provider_ids(&self.pool).await,
            (ResourceClass::Provider, false) => {
                AccessRepo::provider_ids_for_user(&self.pool, actor.user_id).await
            }
            (ResourceClass::Tenant, true) => AccessRepo::all_tenant_ids(&self.pool).await,
            (ResourceClass::Tenant, false) => {
                AccessRepo::tenant_ids_for_user(&self.pool, actor.user_id).await
            }
        }
        .map_err(internal)?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl TenantDirectory for PgDirectory {
    async fn find_tenants(&self, ids: &[DbId]) -> Result<Vec<TenantRecord>, CoreError> {
        let rows = TenantRepo::find_summaries(&self.pool, ids)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(TenantRecord::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgAuditSink {
    pool: DbPool,
}

impl PgAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), CoreError> {
        AuditLogRepo::insert(&self.pool, &CreateAuditLog::from(event))
            .await
            .map_err(internal)?;
        Ok(())
    }
}
