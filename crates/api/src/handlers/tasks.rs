//! Task status queries, polled by clients until a terminal status.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use cirrus_core::error::CoreError;
use cirrus_core::roles::ROLE_ADMIN;
use cirrus_core::task::{TaskHandle, TaskStatusReport};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/tasks/{handle}
///
/// Only the submitter or an admin may read a task. Reads are idempotent:
/// once terminal, every call returns the same status and message.
pub async fn get_task_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> AppResult<impl IntoResponse> {
    let handle = TaskHandle::from(handle);
    let task = state
        .tasks
        .find(&handle)
        .await?
        .ok_or_else(|| AppError::TaskNotFound(handle.clone()))?;

    if task.submitted_by != auth.user_id && auth.role != ROLE_ADMIN {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view another user's task".into(),
        )));
    }

    Ok(Json(DataResponse {
        data: TaskStatusReport::from(&task),
    }))
}
