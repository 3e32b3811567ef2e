//! Repository for the `cloud_tenants` table.

use cirrus_core::types::DbId;
use sqlx::PgPool;

use crate::models::tenant::{CloudTenant, CreateCloudTenant, TenantSummary, UpdateCloudTenant};

/// Column list for `cloud_tenants` queries.
const COLUMNS: &str = "id, name, ems_id, ems_ref, parent_ref, created_at, updated_at";

/// Provides CRUD operations for cloud tenants.
pub struct TenantRepo;

impl TenantRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CloudTenant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cloud_tenants WHERE id = $1");
        sqlx::query_as::<_, CloudTenant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Tenants among `ids` with their attached instance counts. Unknown
    /// ids are omitted.
    pub async fn find_summaries(
        pool: &PgPool,
        ids: &[DbId],
    ) -> Result<Vec<TenantSummary>, sqlx::Error> {
        sqlx::query_as::<_, TenantSummary>(
            "SELECT t.id, t.name, t.ems_id, t.ems_ref, COUNT(v.id) AS instance_count \
             FROM cloud_tenants t \
             LEFT JOIN vms v ON v.cloud_tenant_id = t.id \
             WHERE t.id = ANY($1) \
             GROUP BY t.id \
             ORDER BY t.id",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        input: &CreateCloudTenant,
    ) -> Result<CloudTenant, sqlx::Error> {
        let query = format!(
            "INSERT INTO cloud_tenants (name, ems_id, ems_ref, parent_ref) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CloudTenant>(&query)
            .bind(&input.name)
            .bind(input.ems_id)
            .bind(&input.ems_ref)
            .bind(&input.parent_ref)
            .fetch_one(pool)
            .await
    }

    /// Partial update. Returns `None` if the tenant does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCloudTenant,
    ) -> Result<Option<CloudTenant>, sqlx::Error> {
        let query = format!(
            "UPDATE cloud_tenants SET \
                name = COALESCE($2, name), \
                ems_id = COALESCE($3, ems_id), \
                parent_ref = COALESCE($4, parent_ref), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CloudTenant>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(input.ems_id)
            .bind(&input.parent_ref)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cloud_tenants WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn instance_count(pool: &PgPool, id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM vms WHERE cloud_tenant_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}
