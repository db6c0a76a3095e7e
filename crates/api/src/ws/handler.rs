use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::StreamExt;
use serde::Deserialize;
use snapdoc_core::messages::PushMessage;
use snapdoc_core::source::validate_owner;

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::connection::{read_loop, write_loop};
use crate::ws::manager::WsManager;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub owner: String,
}

/// GET /api/status?owner=<owner>
///
/// Upgrades to a WebSocket that receives `UPDATE` pushes for every status
/// change of the owner's documents.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StatusQuery>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    validate_owner(&query.owner)?;
    let ws_manager = Arc::clone(&state.ws_manager);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, query.owner, ws_manager)))
}

/// Own a single connection after upgrade: register it, run the write loop on
/// a spawned task and the read loop here, then deregister.
async fn handle_socket(socket: WebSocket, owner: String, ws_manager: Arc<WsManager>) {
    let conn = ws_manager.add(&owner).await;
    let conn_id = conn.conn_id.clone();
    tracing::info!(owner = %owner, conn_id = %conn_id, "WebSocket connected");

    if conn.sender.try_send(PushMessage::ping()).is_err() {
        tracing::debug!(conn_id = %conn_id, "Could not queue initial PING");
    }

    let (sink, stream) = socket.split();
    let write_task = ws_manager.spawn_writer(write_loop(conn.mailbox, sink, conn.shutdown.clone()));

    read_loop(stream, conn.sender, conn.shutdown).await;

    ws_manager.remove(&owner, &conn_id).await;
    if let Err(e) = write_task.await {
        tracing::error!(conn_id = %conn_id, error = %e, "WebSocket writer terminated abnormally");
    }
    tracing::info!(owner = %owner, conn_id = %conn_id, "WebSocket disconnected");
}
