//! Row types and DTOs, one module per table family.

pub mod audit;
pub mod task;
pub mod tenant;
