//! HTTP-level tests for `GET /api/v1/tasks/{handle}`.

mod common;

use axum::http::StatusCode;
use cirrus_core::queue::TaskLedger;
use cirrus_core::task::{TaskHandle, TaskStatus};
use common::{body_json, build_test_app, get, post_json, TestApp, ADMIN, OPERATOR, OTHER_OPERATOR};
use serde_json::json;

async fn submit_create(app: &TestApp) -> String {
    let response = post_json(
        app,
        "/api/v1/tenants",
        &app.token(OPERATOR),
        json!({ "name": "tenant-a", "ems_id": "1" }),
    )
    .await;
    body_json(response).await["data"]["task_handle"]
        .as_str()
        .unwrap()
        .to_string()
}

// ---------------------------------------------------------------------------
// Status lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_task_reports_pending_without_message() {
    let app = build_test_app().await;
    let handle = submit_create(&app).await;

    let token = app.token(OPERATOR);
    let response = get(&app, &format!("/api/v1/tasks/{handle}"), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "data": { "status": "pending" } })
    );
}

#[tokio::test]
async fn terminal_status_is_stable_across_reads() {
    let app = build_test_app().await;
    let handle = submit_create(&app).await;
    let task_handle = TaskHandle::from(handle.as_str());
    app.store.claim_next().await.unwrap();
    app.store
        .finish(&task_handle, TaskStatus::Error, "name already exists")
        .await
        .unwrap();

    let token = app.token(OPERATOR);
    for _ in 0..2 {
        let response = get(&app, &format!("/api/v1/tasks/{handle}"), Some(&token)).await;
        assert_eq!(
            body_json(response).await,
            json!({ "data": { "status": "error", "message": "name already exists" } })
        );
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_may_read_any_task() {
    let app = build_test_app().await;
    let handle = submit_create(&app).await;

    let token = app.token(ADMIN);
    let response = get(&app, &format!("/api/v1/tasks/{handle}"), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn other_users_cannot_read_the_task() {
    let app = build_test_app().await;
    let handle = submit_create(&app).await;

    let token = app.token(OTHER_OPERATOR);
    let response = get(&app, &format!("/api/v1/tasks/{handle}"), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

#[tokio::test]
async fn unknown_handle_is_404() {
    let app = build_test_app().await;
    let token = app.token(OPERATOR);

    let response = get(&app, "/api/v1/tasks/does-not-exist", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Task does-not-exist not found");
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_public() {
    let app = build_test_app().await;
    let response = get(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
