use quill_core::polling::{
    PollBackoff, DEFAULT_POLL_BASE_SECS, DEFAULT_POLL_MAX_SECS, DEFAULT_POLL_STEP_SECS,
};

use crate::auth::jwt::JwtConfig;
use crate::engine::WorkerPoolClient;

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background tasks to stop after the server does.
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Shared secret expected in `X-Worker-Token` on worker callbacks.
    pub worker_token: String,
    /// Base URL of the external worker pool. Work items are not forwarded
    /// when unset.
    pub worker_pool_url: Option<String>,
    /// Per-request timeout for worker pool calls (default: `10`).
    pub worker_pool_timeout_secs: u64,
    /// Lifetime of cached job listings, `0` disables caching (default: `5`).
    pub job_list_cache_ttl_secs: u64,
    /// Pending or running jobs without an update for this long are failed,
    /// `0` disables the sweeper (default: `30`).
    pub stale_job_timeout_mins: u64,
    /// Sweeper tick interval (default: `60`).
    pub stale_sweep_interval_secs: u64,
    /// Poll backoff curve.
    pub poll_backoff: PollBackoff,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `WORKER_CALLBACK_TOKEN`     | **required**            |
    /// | `WORKER_POOL_URL`           | unset                   |
    /// | `WORKER_POOL_TIMEOUT_SECS`  | `10`                    |
    /// | `JOB_LIST_CACHE_TTL_SECS`   | `5`                     |
    /// | `STALE_JOB_TIMEOUT_MINS`    | `30`                    |
    /// | `STALE_SWEEP_INTERVAL_SECS` | `60`                    |
    /// | `POLL_BASE_SECS`            | `2`                     |
    /// | `POLL_MAX_SECS`             | `30`                    |
    /// | `POLL_STEP_SECS`            | `20`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let worker_token = std::env::var("WORKER_CALLBACK_TOKEN")
            .expect("WORKER_CALLBACK_TOKEN must be set in the environment");
        assert!(!worker_token.is_empty(), "WORKER_CALLBACK_TOKEN must not be empty");

        let worker_pool_url = std::env::var("WORKER_POOL_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let poll_backoff = PollBackoff {
            base_secs: env_u64("POLL_BASE_SECS", DEFAULT_POLL_BASE_SECS),
            max_secs: env_u64("POLL_MAX_SECS", DEFAULT_POLL_MAX_SECS),
            step_secs: env_u64("POLL_STEP_SECS", DEFAULT_POLL_STEP_SECS),
        };
        assert!(poll_backoff.step_secs > 0, "POLL_STEP_SECS must be positive");

        let worker_pool_timeout_secs = env_u64(
            "WORKER_POOL_TIMEOUT_SECS",
            WorkerPoolClient::DEFAULT_TIMEOUT.as_secs(),
        );
        assert!(
            worker_pool_timeout_secs > 0,
            "WORKER_POOL_TIMEOUT_SECS must be positive"
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_u64("SHUTDOWN_TIMEOUT_SECS", 30),
            jwt: JwtConfig::from_env(),
            worker_token,
            worker_pool_url,
            worker_pool_timeout_secs,
            job_list_cache_ttl_secs: env_u64("JOB_LIST_CACHE_TTL_SECS", 5),
            stale_job_timeout_mins: env_u64("STALE_JOB_TIMEOUT_MINS", 30),
            stale_sweep_interval_secs: env_u64("STALE_SWEEP_INTERVAL_SECS", 60),
            poll_backoff,
        }
    }
}

/// Read a `u64` env var, panicking on a malformed value.
fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        Err(_) => default,
    }
}
