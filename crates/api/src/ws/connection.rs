//! The two halves of a live connection.
//!
//! Both loops are generic over the transport so they can be driven by an
//! axum `WebSocket` in production and by in-memory sinks/streams in tests.

use std::fmt::Display;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use snapdoc_core::messages::{MessageType, PushMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Drain `mailbox` into `sink` as JSON text frames.
///
/// Exits on shutdown, when the mailbox closes, or when the sink fails; a
/// failing sink cancels `shutdown` so the read side stops too. Messages
/// already queued when shutdown fires are still written.
pub async fn write_loop<S>(
    mut mailbox: mpsc::Receiver<PushMessage>,
    mut sink: S,
    shutdown: CancellationToken,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                flush_queued(&mut mailbox, &mut sink, &shutdown).await;
                break;
            }
            message = mailbox.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        if !send_message(&mut sink, &message, &shutdown).await {
            break;
        }
    }

    let _ = sink.close().await;
}

async fn flush_queued<S>(mailbox: &mut mpsc::Receiver<PushMessage>, sink: &mut S, shutdown: &CancellationToken)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    mailbox.close();
    let mut flushed = 0usize;
    while let Ok(message) = mailbox.try_recv() {
        if !send_message(sink, &message, shutdown).await {
            break;
        }
        flushed += 1;
    }
    if flushed > 0 {
        tracing::debug!(count = flushed, "Flushed queued messages on shutdown");
    }
}

/// Returns `false` once the sink has failed.
async fn send_message<S>(sink: &mut S, message: &PushMessage, shutdown: &CancellationToken) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize push message");
            return true;
        }
    };
    tracing::trace!(kind = ?message.kind, "Send");
    if let Err(e) = sink.send(Message::Text(text.into())).await {
        tracing::debug!(error = %e, "WebSocket sink closed");
        shutdown.cancel();
        return false;
    }
    true
}

/// Read inbound frames until the peer goes away or `shutdown` fires.
///
/// A `PING` message is answered with exactly one `PONG` on `replies`.
/// Frames that do not decode as a push message are ignored.
pub async fn read_loop<S, E>(mut stream: S, replies: mpsc::Sender<PushMessage>, shutdown: CancellationToken)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            None => {
                tracing::debug!("WebSocket stream ended");
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket receive error");
                break;
            }
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(Message::Text(text))) => handle_text(text.as_str(), &replies).await,
            Some(Ok(_)) => {}
        }
    }

    shutdown.cancel();
}

async fn handle_text(text: &str, replies: &mpsc::Sender<PushMessage>) {
    match serde_json::from_str::<PushMessage>(text) {
        Ok(message) if message.kind == MessageType::Ping => {
            if replies.send(PushMessage::pong()).await.is_err() {
                tracing::debug!("Mailbox closed, dropping PONG");
            }
        }
        Ok(message) => {
            tracing::trace!(kind = ?message.kind, "Ignoring inbound message");
        }
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring undecodable inbound message");
        }
    }
}
