//! Domain types and the task submission gateway for the Cirrus console.
//!
//! This crate has no database or HTTP dependencies. Collaborators
//! (task queue, RBAC filter, tenant directory, audit sink) are reached
//! through the traits in [`submission`] and [`queue`], so the same gateway
//! runs against PostgreSQL in production and against [`memory`] in tests.

pub mod action;
pub mod audit;
pub mod error;
pub mod memory;
pub mod messages;
pub mod options;
pub mod queue;
pub mod roles;
pub mod submission;
pub mod task;
pub mod types;
