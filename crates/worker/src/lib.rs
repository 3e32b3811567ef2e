//! Task worker: the single writer of a task's terminal status.
//!
//! Claims pending tasks from a [`TaskLedger`](cirrus_core::queue::TaskLedger),
//! applies the mutation through a [`TenantProvider`](provider::TenantProvider)
//! and records `ok` or `error` with a human-readable message.

pub mod config;
pub mod provider;
pub mod runner;
