use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings (in seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that queues a `PING` message on every connection
/// each [`HEARTBEAT_INTERVAL_SECS`].
///
/// Runs until aborted through the returned handle.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        // The first tick completes immediately; connections already got a PING on attach.
        interval.tick().await;

        loop {
            interval.tick().await;
            let count = ws_manager.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            ws_manager.ping_all().await;
        }
    })
}
