//! Tenant form input and the partial field mapping carried by a task.
//!
//! [`TenantForm`] is what the browser posts: raw strings, every field
//! optional. [`TenantOptions`] is what the worker applies: only fields the
//! caller actually supplied are present, so an omitted field is left
//! untouched downstream instead of being reset.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::DbId;

/// Raw create/edit form fields as posted by the caller.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TenantForm {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub name: Option<String>,
    /// Composite provider identifier, `"<ems_id>"` or `"<ems_id>:<parent_tenant_id>"`.
    pub ems_id: Option<String>,
}

impl TenantForm {
    /// Run field validators, flattening failures into a single message.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string().replace('\n', "; ")))
    }
}

/// Parsed composite provider identifier.
///
/// Hierarchical providers list their tenants as `"<ems_id>:<tenant_id>"`
/// choices; selecting one creates the new tenant under that parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderRef {
    pub ems_id: DbId,
    pub parent_tenant_id: Option<DbId>,
}

impl FromStr for ProviderRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_id = |part: &str| {
            part.trim().parse::<DbId>().map_err(|_| {
                CoreError::Validation(format!("Invalid provider identifier '{s}'"))
            })
        };

        let mut parts = s.split(':');
        let ems_id = parse_id(parts.next().unwrap_or_default())?;
        let parent_tenant_id = parts.next().map(parse_id).transpose()?;
        if parts.next().is_some() {
            return Err(CoreError::Validation(format!(
                "Invalid provider identifier '{s}'"
            )));
        }

        Ok(ProviderRef {
            ems_id,
            parent_tenant_id,
        })
    }
}

/// Field mapping applied by the worker. Absent fields are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ems_id: Option<DbId>,
    /// Provider-side reference of the parent tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl TenantOptions {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.ems_id.is_none() && self.parent_id.is_none()
    }
}
