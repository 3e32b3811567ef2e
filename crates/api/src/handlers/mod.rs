pub mod tasks;
pub mod tenants;
