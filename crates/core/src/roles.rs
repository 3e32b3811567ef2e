//! Well-known role names and the capabilities each role grants.
//!
//! Role names must match the seed data in `db/migrations/0001_initial.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OPERATOR: &str = "operator";
pub const ROLE_VIEWER: &str = "viewer";

/// A privilege required to submit one class of tenant mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    TenantNew,
    TenantEdit,
    TenantDelete,
}

impl Capability {
    /// Privilege identifier as it appears in role configuration and logs.
    pub fn name(self) -> &'static str {
        match self {
            Capability::TenantNew => "cloud_tenant_new",
            Capability::TenantEdit => "cloud_tenant_edit",
            Capability::TenantDelete => "cloud_tenant_delete",
        }
    }
}

/// Whether `role` holds `capability`.
///
/// Admins hold everything, operators may create and edit but not delete,
/// viewers hold nothing. Unknown roles hold nothing.
pub fn role_grants(role: &str, capability: Capability) -> bool {
    match role {
        ROLE_ADMIN => true,
        ROLE_OPERATOR => matches!(capability, Capability::TenantNew | Capability::TenantEdit),
        _ => false,
    }
}
