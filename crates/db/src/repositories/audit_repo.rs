//! Repository for the `audit_logs` table.

use cirrus_core::types::DbId;
use sqlx::PgPool;

use crate::models::audit::{AuditLog, CreateAuditLog};

/// Column list for `audit_logs` SELECT queries.
const COLUMNS: &str = "id, event, message, target_id, target_class, user_id, created_at";

/// Provides insert and query operations for audit logs.
pub struct AuditLogRepo;

impl AuditLogRepo {
    pub async fn insert(pool: &PgPool, entry: &CreateAuditLog) -> Result<AuditLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_logs (event, message, target_id, target_class, user_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(&entry.event)
            .bind(&entry.message)
            .bind(entry.target_id)
            .bind(&entry.target_class)
            .bind(entry.user_id)
            .fetch_one(pool)
            .await
    }

    /// Audit trail of one resource, oldest first.
    pub async fn list_for_target(
        pool: &PgPool,
        target_class: &str,
        target_id: DbId,
    ) -> Result<Vec<AuditLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs \
             WHERE target_class = $1 AND target_id = $2 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(target_class)
            .bind(target_id)
            .fetch_all(pool)
            .await
    }
}
