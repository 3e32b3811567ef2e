//! RBAC scope queries over `user_provider_access`.

use cirrus_core::types::DbId;
use sqlx::PgPool;

pub struct AccessRepo;

impl AccessRepo {
    pub async fn all_provider_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM cloud_providers ORDER BY id")
            .fetch_all(pool)
            .await
    }

    pub async fn all_tenant_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM cloud_tenants ORDER BY id")
            .fetch_all(pool)
            .await
    }

    /// Providers granted to `user_id`.
    pub async fn provider_ids_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT ems_id FROM user_provider_access WHERE user_id = $1 ORDER BY ems_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Tenants belonging to providers granted to `user_id`.
    pub async fn tenant_ids_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT t.id FROM cloud_tenants t \
             JOIN user_provider_access a ON a.ems_id = t.ems_id \
             WHERE a.user_id = $1 \
             ORDER BY t.id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn grant(pool: &PgPool, user_id: DbId, ems_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_provider_access (user_id, ems_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(ems_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
