//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod access_repo;
pub mod audit_repo;
pub mod task_repo;
pub mod tenant_repo;

pub use access_repo::AccessRepo;
pub use audit_repo::AuditLogRepo;
pub use task_repo::TaskRepo;
pub use tenant_repo::TenantRepo;
