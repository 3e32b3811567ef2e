//! The side that actually changes tenants.
//!
//! In production this is the cloud provider's API; the bundled
//! [`PgTenantProvider`] applies the change to the inventory tables.

use async_trait::async_trait;
use cirrus_core::options::TenantOptions;
use cirrus_core::types::DbId;
use cirrus_db::models::tenant::{CreateCloudTenant, UpdateCloudTenant};
use cirrus_db::repositories::TenantRepo;
use cirrus_db::DbPool;

/// A provider failure. `Rejected` messages are shown to the user verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    Rejected(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TenantProvider: Send + Sync {
    async fn create_tenant(&self, ems_id: DbId, options: &TenantOptions)
        -> Result<(), ProviderError>;

    async fn update_tenant(
        &self,
        tenant_id: DbId,
        options: &TenantOptions,
    ) -> Result<(), ProviderError>;

    async fn delete_tenant(&self, tenant_id: DbId) -> Result<(), ProviderError>;
}

// ---------------------------------------------------------------------------
// PgTenantProvider
// ---------------------------------------------------------------------------

pub struct PgTenantProvider {
    pool: DbPool,
}

impl PgTenantProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_db_error(err: sqlx::Error) -> ProviderError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ProviderError::Rejected("name already exists".into())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            ProviderError::Rejected("provider does not exist".into())
        }
        _ => ProviderError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl TenantProvider for PgTenantProvider {
    async fn create_tenant(
        &self,
        ems_id: DbId,
        options: &TenantOptions,
    ) -> Result<(), ProviderError> {
        let name = options
            .name
            .clone()
            .ok_or_else(|| ProviderError::Rejected("name is required".into()))?;
        let input = CreateCloudTenant {
            name,
            ems_id,
            ems_ref: uuid::Uuid::new_v4().to_string(),
            parent_ref: options.parent_id.clone(),
        };
        TenantRepo::create(&self.pool, &input)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn update_tenant(
        &self,
        tenant_id: DbId,
        options: &TenantOptions,
    ) -> Result<(), ProviderError> {
        let input = UpdateCloudTenant {
            name: options.name.clone(),
            ems_id: options.ems_id,
            parent_ref: options.parent_id.clone(),
        };
        TenantRepo::update(&self.pool, tenant_id, &input)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| ProviderError::Rejected(format!("Cloud Tenant {tenant_id} not found")))?;
        Ok(())
    }

    async fn delete_tenant(&self, tenant_id: DbId) -> Result<(), ProviderError> {
        let tenant = TenantRepo::find_by_id(&self.pool, tenant_id)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| ProviderError::Rejected(format!("Cloud Tenant {tenant_id} not found")))?;

        // Instances may have been attached after submission.
        let attached = TenantRepo::instance_count(&self.pool, tenant_id)
            .await
            .map_err(map_db_error)?;
        if attached > 0 {
            return Err(ProviderError::Rejected(format!(
                "{} has {attached} attached instance(s)",
                tenant.name
            )));
        }

        TenantRepo::delete(&self.pool, tenant_id)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}
