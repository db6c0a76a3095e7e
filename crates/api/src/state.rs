use std::sync::Arc;

use crate::config::ServerConfig;
use crate::service::DocumentService;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Capture pipeline: stores, dispatcher and status router.
    pub service: Arc<DocumentService>,
    /// Live status subscribers, keyed by owner.
    pub ws_manager: Arc<WsManager>,
}
