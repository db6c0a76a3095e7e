pub mod documents;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// ```text
/// /documents                       list (?owner=), create
/// /documents/{id}                  get
/// /documents/{id}/download         captured file
/// /status                          WebSocket (?owner=)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/documents", documents::router())
        .route("/status", get(ws::ws_handler))
}
