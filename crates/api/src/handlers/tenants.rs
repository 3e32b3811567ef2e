//! Handlers for the `/tenants` resource.
//!
//! Every mutation goes through the [`SubmissionGateway`] and answers with
//! `201` and a task handle (or warnings) without waiting for the worker.
//!
//! [`SubmissionGateway`]: cirrus_core::submission::SubmissionGateway

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cirrus_core::action::{FormButton, TenantAction};
use cirrus_core::options::TenantForm;
use cirrus_core::submission::{Submission, SubmissionRequest};
use cirrus_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of the create and edit forms.
#[derive(Debug, Default, Deserialize)]
pub struct TenantFormBody {
    /// `add` / `save` submit the form, `cancel` abandons it.
    pub button: Option<String>,
    #[serde(flatten)]
    pub form: TenantForm,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTenantsBody {
    pub ids: Vec<DbId>,
}

/// A toolbar action dispatched by name, e.g. `cloud_tenant_delete`.
#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub action: String,
    #[serde(default)]
    pub ids: Vec<DbId>,
    pub button: Option<String>,
    #[serde(flatten)]
    pub form: TenantForm,
}

fn parse_button(raw: Option<&str>) -> AppResult<FormButton> {
    Ok(raw
        .map(str::parse::<FormButton>)
        .transpose()?
        .unwrap_or(FormButton::Submit))
}

async fn submit(state: &AppState, request: SubmissionRequest) -> AppResult<impl IntoResponse> {
    let submission: Submission = state.gateway.submit(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: submission })))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/tenants
pub async fn create_tenant(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<TenantFormBody>,
) -> AppResult<impl IntoResponse> {
    let button = parse_button(body.button.as_deref())?;
    let request = SubmissionRequest::create(auth.actor(), body.form).with_button(button);
    submit(&state, request).await
}

/// PUT /api/v1/tenants/{id}
pub async fn update_tenant(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<TenantFormBody>,
) -> AppResult<impl IntoResponse> {
    let button = parse_button(body.button.as_deref())?;
    let request = SubmissionRequest::update(auth.actor(), id, body.form).with_button(button);
    submit(&state, request).await
}

/// POST /api/v1/tenants/delete
///
/// Tenants with attached instances are skipped and reported as warnings;
/// the rest are deleted by a single task.
pub async fn delete_tenants(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<DeleteTenantsBody>,
) -> AppResult<impl IntoResponse> {
    let request = SubmissionRequest::delete(auth.actor(), body.ids);
    submit(&state, request).await
}

/// POST /api/v1/tenants/actions
///
/// Resolves `action` to a [`TenantAction`]; unknown names are rejected
/// with `VALIDATION_FAILED`.
pub async fn dispatch_action(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<ActionBody>,
) -> AppResult<impl IntoResponse> {
    let action: TenantAction = body.action.parse()?;
    let button = parse_button(body.button.as_deref())?;
    tracing::debug!(
        %action,
        user_id = auth.user_id,
        targets = body.ids.len(),
        "Dispatching action",
    );

    let request =
        SubmissionRequest::new(auth.actor(), action, body.ids, body.form).with_button(button);
    submit(&state, request).await
}

/// GET /api/v1/tenants/{id}/form-fields
pub async fn form_fields(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let fields = state.gateway.form_fields(&auth.actor(), id).await?;
    Ok(Json(DataResponse { data: fields }))
}
