//! Audit event names and the record emitted per affected resource.
//!
//! Audit records are written at submission time, not when the background
//! work finishes, so they capture intent even for tasks that later fail.

use serde::Serialize;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Action type constants
// ---------------------------------------------------------------------------

/// Known event names for audit log entries.
pub mod action_types {
    pub const TENANT_CREATE_INITIATED: &str = "cloud_tenant_record_create_initiated";
    pub const TENANT_UPDATE_INITIATED: &str = "cloud_tenant_record_update_initiated";
    pub const TENANT_DELETE_INITIATED: &str = "cloud_tenant_record_delete_initiated";
}

/// Target class names stored in `audit_logs.target_class`.
pub mod target_classes {
    pub const CLOUD_TENANT: &str = "CloudTenant";
    pub const CLOUD_PROVIDER: &str = "CloudProvider";
}

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

/// One audit record: who did what to which resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub event: String,
    pub message: String,
    pub target_id: DbId,
    pub target_class: String,
    pub user_id: DbId,
}

impl AuditEvent {
    pub fn new(
        event: impl Into<String>,
        target_class: impl Into<String>,
        target_id: DbId,
        user_id: DbId,
    ) -> Self {
        Self {
            event: event.into(),
            message: String::new(),
            target_id,
            target_class: target_class.into(),
            user_id,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Message recorded for a tenant record action, e.g. `[tenant-a] Record delete initiated`.
pub fn record_message(name: &str, verb: &str) -> String {
    format!("[{name}] Record {verb} initiated")
}
