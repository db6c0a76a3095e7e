use std::collections::HashMap;
use std::future::Future;

use snapdoc_core::messages::PushMessage;
use snapdoc_core::types::Timestamp;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Capacity of every connection's outbound mailbox.
pub const MAILBOX_CAPACITY: usize = 100;

/// Sender half of a connection's outbound mailbox.
pub type Mailbox = mpsc::Sender<PushMessage>;

/// Registry entry for the connection currently attached for an owner.
struct WsConnection {
    conn_id: String,
    sender: Mailbox,
    shutdown: CancellationToken,
    connected_at: Timestamp,
}

/// Handle returned to the socket task that owns a freshly attached connection.
pub struct Connection {
    pub conn_id: String,
    /// Outbound messages to write to the socket.
    pub mailbox: mpsc::Receiver<PushMessage>,
    /// Enqueue replies (e.g. `PONG`) on this connection.
    pub sender: Mailbox,
    /// Cancelled when either side of the connection ends or on server shutdown.
    pub shutdown: CancellationToken,
}

/// Manages the live connection of every subscribed owner.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
    /// Write loops still flushing their sockets.
    writers: TaskTracker,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            writers: TaskTracker::new(),
        }
    }

    /// Attach a new connection for `owner`.
    ///
    /// A previous connection of the same owner is superseded: it no longer
    /// receives pushes but keeps running until its own socket closes.
    pub async fn add(&self, owner: &str) -> Connection {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let conn_id = uuid::Uuid::new_v4().to_string();
        let shutdown = CancellationToken::new();

        let entry = WsConnection {
            conn_id: conn_id.clone(),
            sender: tx.clone(),
            shutdown: shutdown.clone(),
            connected_at: chrono::Utc::now(),
        };
        let previous = self
            .connections
            .write()
            .await
            .insert(owner.to_string(), entry);
        if let Some(previous) = previous {
            tracing::debug!(owner = %owner, superseded = %previous.conn_id, "Connection superseded");
        }

        Connection {
            conn_id,
            mailbox: rx,
            sender: tx,
            shutdown,
        }
    }

    /// Detach `owner`'s connection if it is still `conn_id`.
    ///
    /// Returns `false` when the entry was already replaced or removed.
    pub async fn remove(&self, owner: &str, conn_id: &str) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get(owner) {
            Some(current) if current.conn_id == conn_id => {
                conns.remove(owner);
                true
            }
            _ => false,
        }
    }

    /// Queue `message` on `owner`'s connection without waiting.
    ///
    /// Returns `true` when the message was enqueued. A full mailbox drops the
    /// message.
    pub async fn push_to_owner(&self, owner: &str, message: PushMessage) -> bool {
        let conns = self.connections.read().await;
        let Some(conn) = conns.get(owner) else {
            return false;
        };
        match conn.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(owner = %owner, conn_id = %conn.conn_id, "Mailbox full, dropping push");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(owner = %owner, conn_id = %conn.conn_id, "Mailbox closed, dropping push");
                false
            }
        }
    }

    /// When `owner`'s current connection was attached, if any.
    pub async fn connected_at(&self, owner: &str) -> Option<Timestamp> {
        self.connections
            .read()
            .await
            .get(owner)
            .map(|conn| conn.connected_at)
    }

    /// Return the current number of attached owners.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Queue a `PING` on every connection. Full mailboxes are skipped.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.try_send(PushMessage::ping());
        }
    }

    /// Signal every connection to close, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            conn.shutdown.cancel();
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Spawn a connection's write loop so shutdown can wait for it.
    pub fn spawn_writer<F>(&self, writer: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.writers.spawn(writer)
    }

    /// Wait until every spawned write loop has finished.
    ///
    /// No further writers are expected once this is called.
    pub async fn wait_for_writers(&self) {
        self.writers.close();
        self.writers.wait().await;
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
