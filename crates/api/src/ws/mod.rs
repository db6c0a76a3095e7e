//! Live status fan-out over WebSocket.
//!
//! Each owner has at most one registered connection. Pushes land in the
//! connection's bounded mailbox; a write loop drains it into the socket and a
//! read loop answers `PING` messages and notices disconnects.

pub mod connection;
mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{Connection, WsManager, MAILBOX_CAPACITY};
