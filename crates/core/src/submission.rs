//! Task submission gateway.
//!
//! Turns a validated tenant mutation request into exactly one queued task
//! and returns its handle without waiting for the work to run. All checks
//! (capability, RBAC, option parsing, delete eligibility) happen here,
//! synchronously, before anything is enqueued; the worker never re-checks.
//!
//! Bulk deletes produce **one task per batch**: every eligible tenant in a
//! submission is listed in that task's `target_ids`, and the caller polls a
//! single handle. Ineligible tenants are reported as individual warnings.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::action::{FormButton, TenantAction};
use crate::audit::{self, target_classes, AuditEvent};
use crate::error::CoreError;
use crate::messages;
use crate::options::{ProviderRef, TenantForm, TenantOptions};
use crate::queue::TaskQueue;
use crate::roles::role_grants;
use crate::task::{NewTask, TaskHandle};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Class of resource an RBAC lookup is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Provider,
    Tenant,
}

impl ResourceClass {
    /// Class name as recorded in audit logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::Provider => target_classes::CLOUD_PROVIDER,
            ResourceClass::Tenant => target_classes::CLOUD_TENANT,
        }
    }
}

/// The user a submission is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
    pub role: String,
}

/// What the gateway needs to know about an existing tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantRecord {
    pub id: DbId,
    pub name: String,
    pub ems_id: DbId,
    /// Provider-side reference of the tenant.
    pub ems_ref: String,
    /// Number of instances attached to the tenant.
    pub instance_count: i64,
}

/// RBAC filter: which resources of a class the actor may act on.
#[async_trait]
pub trait AccessFilter: Send + Sync {
    async fn filter_accessible(
        &self,
        class: ResourceClass,
        actor: &Actor,
    ) -> Result<HashSet<DbId>, CoreError>;
}

/// Read access to tenant records. Unknown ids are omitted from the result.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenants(&self, ids: &[DbId]) -> Result<Vec<TenantRecord>, CoreError>;
}

/// Audit sink. Fire-and-forget: a failure is logged, never propagated.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// Submission-time failures. None of these ever produces a task.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The actor lacks the capability, or a target is outside its RBAC scope.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The queue backend rejected the job. Safe to retry without
    /// re-validating.
    #[error("Task enqueue failed: {0}")]
    EnqueueFailed(String),

    /// A collaborator lookup failed before anything was enqueued.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for SubmitError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) | CoreError::Conflict(msg) => {
                SubmitError::ValidationFailed(msg)
            }
            CoreError::NotFound { entity, id } => {
                SubmitError::ValidationFailed(format!("{entity} with id {id} not found"))
            }
            CoreError::Unauthorized(msg) | CoreError::Forbidden(msg) => {
                SubmitError::Unauthorized(msg)
            }
            CoreError::Internal(msg) => SubmitError::Internal(msg),
        }
    }
}

/// One mutation request from a form or toolbar.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub action: TenantAction,
    pub button: FormButton,
    /// Target tenants for edit and delete. A create takes its target
    /// provider from `form.ems_id` instead.
    pub resource_refs: Vec<DbId>,
    pub form: TenantForm,
    pub actor: Actor,
}

impl SubmissionRequest {
    pub fn create(actor: Actor, form: TenantForm) -> Self {
        Self {
            action: TenantAction::Create,
            button: FormButton::Submit,
            resource_refs: Vec::new(),
            form,
            actor,
        }
    }

    pub fn update(actor: Actor, tenant_id: DbId, form: TenantForm) -> Self {
        Self {
            action: TenantAction::Update,
            button: FormButton::Submit,
            resource_refs: vec![tenant_id],
            form,
            actor,
        }
    }

    pub fn delete(actor: Actor, tenant_ids: Vec<DbId>) -> Self {
        Self {
            action: TenantAction::Delete,
            button: FormButton::Submit,
            resource_refs: tenant_ids,
            form: TenantForm::default(),
            actor,
        }
    }

    /// Request for an action chosen at runtime, e.g. dispatched by name.
    pub fn new(
        actor: Actor,
        action: TenantAction,
        resource_refs: Vec<DbId>,
        form: TenantForm,
    ) -> Self {
        Self {
            action,
            button: FormButton::Submit,
            resource_refs,
            form,
            actor,
        }
    }

    pub fn with_button(mut self, button: FormButton) -> Self {
        self.button = button;
        self
    }
}

/// A target that was skipped, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetWarning {
    pub target_id: DbId,
    pub message: String,
}

/// Accepted submission.
///
/// `task_handle` is `None` when nothing was enqueued: a cancelled form, or
/// a bulk delete in which every target was ineligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub task_handle: Option<TaskHandle>,
    pub warnings: Vec<TargetWarning>,
    pub message: Option<String>,
}

impl Submission {
    fn enqueued(handle: TaskHandle) -> Self {
        Self {
            task_handle: Some(handle),
            warnings: Vec::new(),
            message: None,
        }
    }

    fn cancelled(message: String) -> Self {
        Self {
            task_handle: None,
            warnings: Vec::new(),
            message: Some(message),
        }
    }
}

/// Editable fields of an existing tenant, used to prefill the edit form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantFormFields {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct SubmissionGateway {
    queue: Arc<dyn TaskQueue>,
    access: Arc<dyn AccessFilter>,
    directory: Arc<dyn TenantDirectory>,
    audit: Arc<dyn AuditSink>,
}

impl SubmissionGateway {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        access: Arc<dyn AccessFilter>,
        directory: Arc<dyn TenantDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            queue,
            access,
            directory,
            audit,
        }
    }

    /// Validate, enqueue and audit one submission.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<Submission, SubmitError> {
        authorize(&request.actor, request.action)?;

        match request.action {
            TenantAction::Create => self.submit_create(request).await,
            TenantAction::Update => self.submit_update(request).await,
            TenantAction::Delete => self.submit_delete(request).await,
        }
    }

    /// Current editable fields of a tenant the actor may edit.
    pub async fn form_fields(
        &self,
        actor: &Actor,
        tenant_id: DbId,
    ) -> Result<TenantFormFields, SubmitError> {
        authorize(actor, TenantAction::Update)?;
        let tenant = self.find_tenant(actor, tenant_id).await?;
        Ok(TenantFormFields { name: tenant.name })
    }

    async fn submit_create(&self, request: SubmissionRequest) -> Result<Submission, SubmitError> {
        if request.button == FormButton::Cancel {
            return Ok(Submission::cancelled(messages::create_cancelled()));
        }

        request.form.check()?;
        let name = request
            .form
            .name
            .clone()
            .ok_or_else(|| SubmitError::ValidationFailed("Name is required".into()))?;
        let provider: ProviderRef = request
            .form
            .ems_id
            .as_deref()
            .ok_or_else(|| SubmitError::ValidationFailed("Provider is required".into()))?
            .parse()?;

        self.ensure_accessible(ResourceClass::Provider, &[provider.ems_id], &request.actor)
            .await?;
        let parent_id = self.resolve_parent(&request.actor, provider).await?;

        let task = NewTask {
            action: TenantAction::Create,
            target_ids: vec![provider.ems_id],
            payload: TenantOptions {
                name: Some(name.clone()),
                ems_id: None,
                parent_id,
            },
            label: name.clone(),
            submitted_by: request.actor.user_id,
        };
        let handle = self.enqueue(task).await?;

        self.audit_each(
            &request.actor,
            TenantAction::Create,
            ResourceClass::Provider,
            &[(provider.ems_id, name)],
        )
        .await;

        Ok(Submission::enqueued(handle))
    }

    async fn submit_update(&self, request: SubmissionRequest) -> Result<Submission, SubmitError> {
        let [tenant_id] = request.resource_refs.as_slice() else {
            return Err(SubmitError::ValidationFailed(
                "Edit requires exactly one Cloud Tenant".into(),
            ));
        };
        let tenant = self.find_tenant(&request.actor, *tenant_id).await?;

        if request.button == FormButton::Cancel {
            return Ok(Submission::cancelled(messages::update_cancelled(&tenant.name)));
        }

        request.form.check()?;
        let mut payload = TenantOptions {
            name: request.form.name.clone(),
            ..Default::default()
        };
        if let Some(raw) = request.form.ems_id.as_deref() {
            let provider: ProviderRef = raw.parse()?;
            self.ensure_accessible(ResourceClass::Provider, &[provider.ems_id], &request.actor)
                .await?;
            payload.ems_id = Some(provider.ems_id);
            payload.parent_id = self.resolve_parent(&request.actor, provider).await?;
        }
        if payload.is_empty() {
            return Err(SubmitError::ValidationFailed(
                "No fields supplied for update".into(),
            ));
        }

        let label = payload.name.clone().unwrap_or_else(|| tenant.name.clone());
        let task = NewTask {
            action: TenantAction::Update,
            target_ids: vec![tenant.id],
            payload,
            label,
            submitted_by: request.actor.user_id,
        };
        let handle = self.enqueue(task).await?;

        self.audit_each(
            &request.actor,
            TenantAction::Update,
            ResourceClass::Tenant,
            &[(tenant.id, tenant.name)],
        )
        .await;

        Ok(Submission::enqueued(handle))
    }

    async fn submit_delete(&self, request: SubmissionRequest) -> Result<Submission, SubmitError> {
        let mut seen = HashSet::new();
        let ids: Vec<DbId> = request
            .resource_refs
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if ids.is_empty() {
            return Err(SubmitError::ValidationFailed(
                "No Cloud Tenants were selected for deletion".into(),
            ));
        }

        self.ensure_accessible(ResourceClass::Tenant, &ids, &request.actor)
            .await?;

        let mut found: HashMap<DbId, TenantRecord> = self
            .directory
            .find_tenants(&ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut eligible = Vec::new();
        let mut warnings = Vec::new();
        for id in ids {
            let tenant = found.remove(&id).ok_or(CoreError::NotFound {
                entity: "Cloud Tenant",
                id,
            })?;
            if tenant.instance_count > 0 {
                warnings.push(TargetWarning {
                    target_id: id,
                    message: messages::delete_blocked(&tenant.name),
                });
            } else {
                eligible.push(tenant);
            }
        }

        if eligible.is_empty() {
            tracing::info!(
                user_id = request.actor.user_id,
                blocked = warnings.len(),
                "No eligible Cloud Tenants to delete",
            );
            return Ok(Submission {
                task_handle: None,
                warnings,
                message: None,
            });
        }

        let targets: Vec<(DbId, String)> =
            eligible.into_iter().map(|t| (t.id, t.name)).collect();
        let task = NewTask {
            action: TenantAction::Delete,
            target_ids: targets.iter().map(|(id, _)| *id).collect(),
            payload: TenantOptions::default(),
            label: targets
                .iter()
                .map(|(_, name)| name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            submitted_by: request.actor.user_id,
        };
        let handle = self.enqueue(task).await?;

        self.audit_each(
            &request.actor,
            TenantAction::Delete,
            ResourceClass::Tenant,
            &targets,
        )
        .await;

        Ok(Submission {
            task_handle: Some(handle),
            warnings,
            message: Some(messages::delete_initiated(targets.len())),
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Reject unless every id is in the actor's RBAC scope for `class`.
    async fn ensure_accessible(
        &self,
        class: ResourceClass,
        ids: &[DbId],
        actor: &Actor,
    ) -> Result<(), SubmitError> {
        let accessible = self
            .access
            .filter_accessible(class, actor)
            .await
            .map_err(|e| SubmitError::Internal(e.to_string()))?;

        if let Some(denied) = ids.iter().find(|id| !accessible.contains(id)) {
            tracing::warn!(
                user_id = actor.user_id,
                class = class.as_str(),
                target_id = *denied,
                "Target outside RBAC scope",
            );
            return Err(SubmitError::Unauthorized(
                "Can't access selected records".into(),
            ));
        }
        Ok(())
    }

    async fn find_tenant(
        &self,
        actor: &Actor,
        tenant_id: DbId,
    ) -> Result<TenantRecord, SubmitError> {
        self.ensure_accessible(ResourceClass::Tenant, &[tenant_id], actor)
            .await?;
        let tenant = self
            .directory
            .find_tenants(&[tenant_id])
            .await?
            .into_iter()
            .next()
            .ok_or(CoreError::NotFound {
                entity: "Cloud Tenant",
                id: tenant_id,
            })?;
        Ok(tenant)
    }

    /// Resolve a `"<ems>:<tenant>"` parent selection to the parent's
    /// provider-side reference.
    async fn resolve_parent(
        &self,
        actor: &Actor,
        provider: ProviderRef,
    ) -> Result<Option<String>, SubmitError> {
        let Some(parent_id) = provider.parent_tenant_id else {
            return Ok(None);
        };
        let parent = self.find_tenant(actor, parent_id).await?;
        if parent.ems_id != provider.ems_id {
            return Err(SubmitError::ValidationFailed(format!(
                "Cloud Tenant {parent_id} does not belong to provider {}",
                provider.ems_id
            )));
        }
        Ok(Some(parent.ems_ref))
    }

    async fn enqueue(&self, task: NewTask) -> Result<TaskHandle, SubmitError> {
        let action = task.action;
        let user_id = task.submitted_by;
        let targets = task.target_ids.len();

        match self.queue.enqueue(task).await {
            Ok(handle) => {
                tracing::info!(
                    task_handle = %handle,
                    %action,
                    user_id,
                    targets,
                    "Task enqueued",
                );
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(%action, user_id, error = %e, "Task enqueue failed");
                Err(SubmitError::EnqueueFailed(e.to_string()))
            }
        }
    }

    /// One audit record per affected resource. Failures are logged only.
    async fn audit_each(
        &self,
        actor: &Actor,
        action: TenantAction,
        class: ResourceClass,
        targets: &[(DbId, String)],
    ) {
        let verb = match action {
            TenantAction::Create => "create",
            TenantAction::Update => "update",
            TenantAction::Delete => "delete",
        };
        for (target_id, name) in targets {
            let event = AuditEvent::new(
                action.audit_event(),
                class.as_str(),
                *target_id,
                actor.user_id,
            )
            .with_message(audit::record_message(name, verb));
            if let Err(e) = self.audit.record(event).await {
                tracing::warn!(
                    target_id = *target_id,
                    %action,
                    error = %e,
                    "Failed to record audit event",
                );
            }
        }
    }
}

/// Reject unless the actor's role grants the action's capability.
fn authorize(actor: &Actor, action: TenantAction) -> Result<(), SubmitError> {
    let capability = action.capability();
    if role_grants(&actor.role, capability) {
        return Ok(());
    }
    tracing::warn!(
        user_id = actor.user_id,
        role = %actor.role,
        capability = capability.name(),
        "Capability check failed",
    );
    Err(SubmitError::Unauthorized(format!(
        "Missing privilege {}",
        capability.name()
    )))
}
