use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use quill_api::auth::jwt::{generate_access_token, JwtConfig};
use quill_api::config::ServerConfig;
use quill_api::middleware::auth::WORKER_TOKEN_HEADER;
use quill_api::routes;
use quill_api::state::AppState;
use quill_core::polling::PollBackoff;
use quill_core::readiness::{VectorStoreReport, VectorStoreState};
use quill_core::types::DbId;
use quill_registry::{ChannelWorkQueue, WorkerCommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const WORKER_TOKEN: &str = "test-worker-token";

/// Character reported ready by [`build_test_app`].
pub const READY_CHARACTER: DbId = 1;

/// Build a test `ServerConfig` with safe defaults.
///
/// Caching is disabled so every listing reflects the latest state.
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
        worker_token: WORKER_TOKEN.to_string(),
        worker_pool_url: None,
        worker_pool_timeout_secs: 10,
        job_list_cache_ttl_secs: 0,
        stale_job_timeout_mins: 30,
        stale_sweep_interval_secs: 60,
        poll_backoff: PollBackoff::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub worker_rx: UnboundedReceiver<WorkerCommand>,
}

impl TestApp {
    /// Bearer token for `user_id`.
    pub fn token(&self, user_id: DbId) -> String {
        generate_access_token(user_id, None, &self.state.config.jwt).unwrap()
    }

    pub fn token_with_email(&self, user_id: DbId, email: &str) -> String {
        generate_access_token(user_id, Some(email), &self.state.config.jwt).unwrap()
    }
}

/// Build the full application router with all middleware layers.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack that production uses.
/// [`READY_CHARACTER`] has a ready vector store.
pub async fn build_test_app() -> TestApp {
    let (queue, worker_rx) = ChannelWorkQueue::new();
    let state = AppState::new(test_config(), Arc::new(queue));
    state
        .vector_stores
        .report(
            READY_CHARACTER,
            VectorStoreReport {
                status: VectorStoreState::Ready,
                collection_id: Some("character_1".into()),
                embedding_count: Some(120),
                initialized_at: None,
                error_message: None,
            },
        )
        .await;

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(WORKER_TOKEN_HEADER),
        ])
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
        .with_state(state.clone());

    TestApp {
        router,
        state,
        worker_rx,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: &TestApp, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn json_auth(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: &TestApp,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    json_auth(app, Method::POST, uri, token, body).await
}

/// Worker callback carrying the shared token.
pub async fn worker_call(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(WORKER_TOKEN_HEADER, WORKER_TOKEN)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit a job for [`READY_CHARACTER`] and return its id.
pub async fn submit_job(app: &TestApp, token: &str, sub_chapter_id: DbId) -> DbId {
    let response = post_json_auth(
        app,
        "/api/v1/generation-jobs",
        token,
        serde_json::json!({
            "trilogy_id": 3,
            "character_id": READY_CHARACTER,
            "sub_chapter_id": sub_chapter_id,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}
