//! Audit log rows.

use cirrus_core::audit::AuditEvent;
use cirrus_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `audit_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: DbId,
    pub event: String,
    pub message: String,
    pub target_id: DbId,
    pub target_class: String,
    pub user_id: DbId,
    pub created_at: Timestamp,
}

/// Insert DTO.
#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub event: String,
    pub message: String,
    pub target_id: DbId,
    pub target_class: String,
    pub user_id: DbId,
}

impl From<AuditEvent> for CreateAuditLog {
    fn from(event: AuditEvent) -> Self {
        Self {
            event: event.event,
            message: event.message,
            target_id: event.target_id,
            target_class: event.target_class,
            user_id: event.user_id,
        }
    }
}
