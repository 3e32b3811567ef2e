//! Repository for the `tasks` table.

use cirrus_core::task::{NewTask, TaskStatus};
use sqlx::PgPool;

use crate::models::task::TaskRow;

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    handle, status, message, action, target_ids, payload, label, \
    submitted_by, created_at, claimed_at, completed_at";

/// Provides enqueue, lookup and completion for background tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Insert a new `pending` task under `handle`.
    pub async fn insert(
        pool: &PgPool,
        handle: &str,
        task: &NewTask,
    ) -> Result<TaskRow, sqlx::Error> {
        let payload = serde_json::to_value(&task.payload)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let query = format!(
            "INSERT INTO tasks (handle, status, action, target_ids, payload, label, submitted_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(handle)
            .bind(TaskStatus::Pending.as_str())
            .bind(task.action.as_str())
            .bind(&task.target_ids)
            .bind(payload)
            .bind(&task.label)
            .bind(task.submitted_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_handle(
        pool: &PgPool,
        handle: &str,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE handle = $1");
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(handle)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest unclaimed pending task.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same task.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks \
             SET claimed_at = NOW() \
             WHERE handle = ( \
                 SELECT handle FROM tasks \
                 WHERE status = $1 AND claimed_at IS NULL \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(TaskStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Write a terminal status. Only a pending row is touched, so the
    /// first writer wins; returns `false` if the task was already terminal
    /// or does not exist.
    pub async fn finish(
        pool: &PgPool,
        handle: &str,
        status: TaskStatus,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $2, message = $3, completed_at = NOW() \
             WHERE handle = $1 AND status = $4",
        )
        .bind(handle)
        .bind(status.as_str())
        .bind(message)
        .bind(TaskStatus::Pending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Clear the claim on a still-pending task so it can be claimed again.
    pub async fn release(pool: &PgPool, handle: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET claimed_at = NULL WHERE handle = $1 AND status = $2")
            .bind(handle)
            .bind(TaskStatus::Pending.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }
}
