pub mod health;
pub mod tasks;
pub mod tenants;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /tenants                         create (POST)
/// /tenants/delete                  bulk delete (POST)
/// /tenants/actions                 dispatch by action name (POST)
/// /tenants/{id}                    update (PUT)
/// /tenants/{id}/form-fields        editable fields (GET)
///
/// /tasks/{handle}                  task status (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tenants", tenants::router())
        .nest("/tasks", tasks::router())
}
