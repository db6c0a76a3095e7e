use std::path::PathBuf;
use std::time::Duration;

use snapdoc_worker::DispatcherConfig;

use crate::engine::PersistRetryPolicy;

/// Which [`DocumentStore`](snapdoc_db::DocumentStore) implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on the post-shutdown drain of the capture pipeline.
    pub shutdown_timeout_secs: u64,
    /// Hosts a capture may be requested from. Empty means any host.
    pub allowed_source_hosts: Vec<String>,
    pub store_backend: StoreBackend,
    /// Root directory of the filesystem object store.
    pub object_store_root: PathBuf,
    /// `User-Agent` sent when fetching source documents.
    pub capture_user_agent: String,
    pub persist_retry: PersistRetryPolicy,
    pub dispatcher: DispatcherConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                  |
    /// |-----------------------------|--------------------------|
    /// | `HOST`                      | `0.0.0.0`                |
    /// | `PORT`                      | `8080`                   |
    /// | `CORS_ORIGINS`              | `http://localhost:8080`  |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                     |
    /// | `ALLOWED_SOURCE_HOSTS`      | `docsend.com`            |
    /// | `STORE_BACKEND`             | `postgres`               |
    /// | `OBJECT_STORE_ROOT`         | `/tmp/snapdoc`           |
    /// | `CAPTURE_USER_AGENT`        | `snapdoc/<version>`      |
    /// | `STATUS_PERSIST_RETRIES`    | `0`                      |
    /// | `STATUS_PERSIST_BACKOFF_MS` | `200`                    |
    ///
    /// Worker pool variables are documented on [`DispatcherConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:8080".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let allowed_source_hosts = split_list(
            &std::env::var("ALLOWED_SOURCE_HOSTS").unwrap_or_else(|_| "docsend.com".into()),
        );

        let store_backend: StoreBackend = std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse()
            .expect("STORE_BACKEND must be 'postgres' or 'memory'");

        let object_store_root = std::env::var("OBJECT_STORE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(snapdoc_db::objects::DEFAULT_OBJECT_ROOT));

        let capture_user_agent = std::env::var("CAPTURE_USER_AGENT")
            .unwrap_or_else(|_| default_user_agent());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            allowed_source_hosts,
            store_backend,
            object_store_root,
            capture_user_agent,
            persist_retry: PersistRetryPolicy::from_env(),
            dispatcher: DispatcherConfig::from_env(),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

pub fn default_user_agent() -> String {
    format!("snapdoc/{}", env!("CARGO_PKG_VERSION"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
