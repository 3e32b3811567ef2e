use std::sync::Arc;

use cirrus_core::queue::TaskLookup;
use cirrus_core::submission::SubmissionGateway;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Validates, enqueues and audits tenant submissions.
    pub gateway: Arc<SubmissionGateway>,
    /// Read side of the task queue, for status queries.
    pub tasks: Arc<dyn TaskLookup>,
}
