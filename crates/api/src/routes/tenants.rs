//! Route definitions for the `/tenants` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::tenants;
use crate::state::AppState;

/// Routes mounted at `/tenants`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(tenants::create_tenant))
        .route("/delete", post(tenants::delete_tenants))
        .route("/actions", post(tenants::dispatch_action))
        .route("/{id}", put(tenants::update_tenant))
        .route("/{id}/form-fields", get(tenants::form_fields))
}
