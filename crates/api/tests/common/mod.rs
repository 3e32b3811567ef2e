#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use cirrus_api::auth::jwt::{generate_access_token, JwtConfig};
use cirrus_api::config::ServerConfig;
use cirrus_api::routes;
use cirrus_api::state::AppState;
use cirrus_core::memory::{InMemoryDirectory, InMemoryTaskStore, RecordingAuditSink};
use cirrus_core::roles::{ROLE_ADMIN, ROLE_OPERATOR, ROLE_VIEWER};
use cirrus_core::submission::{SubmissionGateway, TenantRecord};

pub const ADMIN: i64 = 1;
pub const OPERATOR: i64 = 7;
pub const OTHER_OPERATOR: i64 = 8;
pub const VIEWER: i64 = 9;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// The router plus handles on the in-memory collaborators behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryTaskStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub audit: Arc<RecordingAuditSink>,
    config: ServerConfig,
}

impl TestApp {
    pub fn token(&self, user_id: i64) -> String {
        let role = match user_id {
            ADMIN => ROLE_ADMIN,
            VIEWER => ROLE_VIEWER,
            _ => ROLE_OPERATOR,
        };
        generate_access_token(user_id, role, &self.config.jwt).unwrap()
    }
}

/// Seed the directory:
///
/// - providers 1 and 2
/// - tenants on provider 1: 10 "idle", 11 "busy" (3 instances), 12 "spare"
/// - tenant on provider 2: 20 "other"
/// - operator 7 and viewer 9 are granted provider 1; operator 8 provider 2
pub async fn seed(directory: &InMemoryDirectory) {
    directory.add_provider(1).await;
    directory.add_provider(2).await;
    for (id, name, ems_id, instance_count) in [
        (10, "idle", 1, 0),
        (11, "busy", 1, 3),
        (12, "spare", 1, 0),
        (20, "other", 2, 0),
    ] {
        directory
            .add_tenant(TenantRecord {
                id,
                name: name.to_string(),
                ems_id,
                ems_ref: format!("ref-{name}"),
                instance_count,
            })
            .await;
    }
    directory.grant(OPERATOR, 1).await;
    directory.grant(VIEWER, 1).await;
    directory.grant(OTHER_OPERATOR, 2).await;
}

/// Build the full application router with all middleware layers.
///
/// Mirrors the router construction in `main.rs`, with in-memory
/// collaborators in place of PostgreSQL.
pub async fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(InMemoryTaskStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let audit = Arc::new(RecordingAuditSink::new());
    seed(&directory).await;

    let gateway = SubmissionGateway::new(
        store.clone(),
        directory.clone(),
        directory.clone(),
        audit.clone(),
    );
    let state = AppState {
        config: Arc::new(config.clone()),
        gateway: Arc::new(gateway),
        tasks: store.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        store,
        directory,
        audit,
        config,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn send_json(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json(
    app: &TestApp,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    send_json(app, Method::POST, uri, token, body).await
}

pub async fn put_json(
    app: &TestApp,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    send_json(app, Method::PUT, uri, token, body).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
