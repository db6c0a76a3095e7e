use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use snapdoc_api::config::{ServerConfig, StoreBackend};
use snapdoc_api::router::build_app_router;
use snapdoc_api::service::DocumentService;
use snapdoc_api::state::AppState;
use snapdoc_api::ws;
use snapdoc_db::{DocumentStore, FsObjectStore, MemoryDocumentStore, ObjectStore, PgDocumentStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long closing sockets get to flush their queued pushes.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "snapdoc_api=debug,snapdoc_worker=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        workers = config.dispatcher.workers,
        store = ?config.store_backend,
        "Loaded server configuration"
    );

    // --- Stores ---
    let store = build_store(config.store_backend).await;
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.object_store_root));
    tracing::info!(root = %config.object_store_root.display(), "Object store ready");

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Capture pipeline ---
    let service = Arc::new(
        DocumentService::new(&config, store, objects, Arc::clone(&ws_manager))
            .expect("Failed to build HTTP client"),
    );
    service
        .start()
        .await
        .expect("Failed to start document service");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        service: Arc::clone(&service),
        ws_manager: Arc::clone(&ws_manager),
    };
    let app = build_app_router(state, &config);

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

    // Drain the capture pipeline while subscribers can still see the outcome.
    match tokio::time::timeout(config.shutdown_timeout(), service.stop()).await {
        Ok(Ok(())) => tracing::info!("Capture pipeline drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Failed to stop capture pipeline"),
        Err(_) => tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Capture pipeline did not drain in time"
        ),
    }

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, ws_manager.wait_for_writers())
        .await
        .is_err()
    {
        tracing::warn!("WebSocket writers did not flush in time");
    }

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Select and prepare the document store backend.
async fn build_store(backend: StoreBackend) -> Arc<dyn DocumentStore> {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory document store; records are lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
        StoreBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = snapdoc_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            snapdoc_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            snapdoc_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgDocumentStore::new(pool))
        }
    }
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
