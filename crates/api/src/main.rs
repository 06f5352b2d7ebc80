use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill_api::config::ServerConfig;
use quill_api::engine::{StaleJobSweeper, WorkerForwarder, WorkerPoolClient};
use quill_api::middleware::auth::WORKER_TOKEN_HEADER;
use quill_api::notifications::NotificationRouter;
use quill_api::routes;
use quill_api::state::AppState;
use quill_events::{EmailConfig, EmailDelivery};
use quill_registry::ChannelWorkQueue;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quill_api=debug,quill_registry=debug,quill_events=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Worker queue ---
    let (queue, worker_rx) = ChannelWorkQueue::new();
    let pool_client = config
        .worker_pool_url
        .clone()
        .map(|url| {
            WorkerPoolClient::new(url, Duration::from_secs(config.worker_pool_timeout_secs))
        })
        .transpose()
        .expect("Failed to build worker pool HTTP client");
    let forwarder = WorkerForwarder::new(pool_client);
    let forwarder_handle = tokio::spawn(forwarder.run(worker_rx));

    // --- App state ---
    let state = AppState::new(config.clone(), Arc::new(queue));

    // --- Notifications ---
    let email = EmailConfig::from_env().map(EmailDelivery::new);
    if email.is_none() {
        tracing::info!("SMTP_HOST not set, email notifications disabled");
    }
    let notification_router = NotificationRouter::new(
        Arc::clone(&state.preferences),
        Arc::clone(&state.inbox),
        email,
    );
    let router_handle = tokio::spawn(notification_router.run(state.event_bus.subscribe()));

    // --- Stale job sweeper ---
    let sweeper_cancel = tokio_util::sync::CancellationToken::new();
    let sweeper_handle = StaleJobSweeper::new(
        Arc::clone(&state.registry),
        Duration::from_secs(config.stale_sweep_interval_secs),
        config.stale_job_timeout_mins,
    )
    .map(|sweeper| {
        let cancel = sweeper_cancel.clone();
        tokio::spawn(async move { sweeper.run(cancel).await })
    });
    if sweeper_handle.is_none() {
        tracing::info!("STALE_JOB_TIMEOUT_MINS is 0, stale job sweeper disabled");
    }

    tracing::info!("Background services started (forwarder, notification router, sweeper)");

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
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

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = Duration::from_secs(config.shutdown_timeout_secs);

    sweeper_cancel.cancel();
    if let Some(handle) = sweeper_handle {
        let _ = tokio::time::timeout(drain, handle).await;
    }
    tracing::info!("Stale job sweeper stopped");

    // Dropping the last state handle closes the event bus and the worker
    // channel, which ends the router and forwarder loops.
    drop(state);
    let _ = tokio::time::timeout(drain, router_handle).await;
    let _ = tokio::time::timeout(drain, forwarder_handle).await;
    tracing::info!("Notification router and worker forwarder shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(WORKER_TOKEN_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
