//! Client side of the task protocol.
//!
//! [`api::ApiClient`] submits tenant mutations over HTTP and reads task
//! status; [`poll::start_polling`] drives a task handle to its single
//! outcome.

pub mod api;
pub mod config;
pub mod error;
pub mod poll;
