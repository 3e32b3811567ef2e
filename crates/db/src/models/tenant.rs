//! Cloud tenant rows and DTOs.

use cirrus_core::submission::TenantRecord;
use cirrus_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `cloud_tenants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CloudTenant {
    pub id: DbId,
    pub name: String,
    pub ems_id: DbId,
    pub ems_ref: String,
    pub parent_ref: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Tenant joined with the number of instances attached to it.
#[derive(Debug, Clone, FromRow)]
pub struct TenantSummary {
    pub id: DbId,
    pub name: String,
    pub ems_id: DbId,
    pub ems_ref: String,
    pub instance_count: i64,
}

impl From<TenantSummary> for TenantRecord {
    fn from(row: TenantSummary) -> Self {
        Self {
            id: row.id,
            name: row.name,
            ems_id: row.ems_id,
            ems_ref: row.ems_ref,
            instance_count: row.instance_count,
        }
    }
}

/// Insert DTO used by the worker.
#[derive(Debug, Clone)]
pub struct CreateCloudTenant {
    pub name: String,
    pub ems_id: DbId,
    pub ems_ref: String,
    pub parent_ref: Option<String>,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateCloudTenant {
    pub name: Option<String>,
    pub ems_id: Option<DbId>,
    pub parent_ref: Option<String>,
}
