//! The asynchronous task record and its status lifecycle.
//!
//! A task is created `pending` by the submission gateway and moved to a
//! terminal status exactly once by the worker that claimed it:
//!
//! ```text
//! pending ──► ok
//!    └──────► error
//! ```
//!
//! Terminal statuses never change again. Readers may observe `pending`
//! any number of times, then only ever the same terminal value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::action::TenantAction;
use crate::error::CoreError;
use crate::options::TenantOptions;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Ok,
    Error,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ok => "ok",
            TaskStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    /// Only `pending -> ok` and `pending -> error` are legal.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        self == TaskStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "ok" => Ok(TaskStatus::Ok),
            "error" => Ok(TaskStatus::Error),
            other => Err(CoreError::Internal(format!("Unknown task status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskHandle
// ---------------------------------------------------------------------------

/// Opaque task identifier handed to the caller at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    /// Mint a fresh handle (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A queued unit of background work against one or more tenants.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub handle: TaskHandle,
    pub status: TaskStatus,
    /// Human-readable result, set when the task reaches a terminal status.
    pub message: Option<String>,
    pub action: TenantAction,
    /// Target resources: the provider for a create, tenants otherwise.
    pub target_ids: Vec<DbId>,
    pub payload: TenantOptions,
    /// Display name used when composing result messages.
    pub label: String,
    pub submitted_by: DbId,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Input for enqueueing a new task. The queue assigns the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub action: TenantAction,
    pub target_ids: Vec<DbId>,
    pub payload: TenantOptions,
    pub label: String,
    pub submitted_by: DbId,
}

/// Wire shape of a status query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskStatusReport {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            message: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Ok,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            message: Some(message.into()),
        }
    }
}

impl From<&Task> for TaskStatusReport {
    fn from(task: &Task) -> Self {
        Self {
            status: task.status,
            message: task.message.clone(),
        }
    }
}
