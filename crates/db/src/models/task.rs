//! Row type for the `tasks` table.

use cirrus_core::action::TenantAction;
use cirrus_core::error::CoreError;
use cirrus_core::options::TenantOptions;
use cirrus_core::task::{Task, TaskHandle, TaskStatus};
use cirrus_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `tasks` table, with status and action still as text.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub handle: String,
    pub status: String,
    pub message: Option<String>,
    pub action: String,
    pub target_ids: Vec<DbId>,
    pub payload: serde_json::Value,
    pub label: String,
    pub submitted_by: DbId,
    pub created_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<TaskRow> for Task {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status: TaskStatus = row.status.parse()?;
        let action: TenantAction = row
            .action
            .parse()
            .map_err(|_| CoreError::Internal(format!("Unknown task action '{}'", row.action)))?;
        let payload: TenantOptions = serde_json::from_value(row.payload)
            .map_err(|e| CoreError::Internal(format!("Malformed task payload: {e}")))?;

        Ok(Task {
            handle: TaskHandle::from(row.handle),
            status,
            message: row.message,
            action,
            target_ids: row.target_ids,
            payload,
            label: row.label,
            submitted_by: row.submitted_by,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, action: &str) -> TaskRow {
        TaskRow {
            handle: "h-1".into(),
            status: status.into(),
            message: None,
            action: action.into(),
            target_ids: vec![10, 12],
            payload: serde_json::json!({ "name": "tenant-a" }),
            label: "tenant-a".into(),
            submitted_by: 7,
            created_at: chrono::Utc::now(),
            claimed_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn converts_a_stored_row() {
        let task = Task::try_from(row("pending", "cloud_tenant_edit")).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.action, TenantAction::Update);
        assert_eq!(task.payload.name.as_deref(), Some("tenant-a"));
        assert_eq!(task.target_ids, vec![10, 12]);
    }

    #[test]
    fn unknown_status_is_an_internal_error() {
        assert!(matches!(
            Task::try_from(row("running", "cloud_tenant_new")),
            Err(CoreError::Internal(_))
        ));
    }

    #[test]
    fn unknown_action_is_an_internal_error() {
        assert!(matches!(
            Task::try_from(row("ok", "cloud_tenant_frobnicate")),
            Err(CoreError::Internal(_))
        ));
    }
}
