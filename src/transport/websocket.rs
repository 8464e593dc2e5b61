//! WebSocket transport
//!
//! Accepts TCP connections, upgrades them to WebSockets and runs two loops
//! per connection:
//! - the write loop drains the session's outbound queue into the socket;
//! - the read loop parses client events and hands message text to the
//!   relay controller.
//!
//! When the read side ends, cleanly or not, the session is closed and
//! removed from the registry.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use super::lifecycle::SessionLifecycle;
use super::message::ClientEvent;
use crate::relay::RelayController;
use crate::utils::error::{AppError, RelayError};

pub async fn bind(addr: &str) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr).await.map_err(|source| AppError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Accept connections forever. A failed accept is logged and skipped.
pub async fn serve(listener: TcpListener, relay: Arc<RelayController>) {
    let lifecycle = SessionLifecycle::new(Arc::clone(relay.registry()));

    match listener.local_addr() {
        Ok(addr) => info!("Server running on ws://{addr}"),
        Err(e) => warn!(error = %e, "Server running on unknown address"),
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let relay = Arc::clone(&relay);
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, relay, lifecycle).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<RelayController>,
    lifecycle: SessionLifecycle,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (session_id, mut outbound) = lifecycle.open(Some(peer));

    let writer = {
        let session_id = session_id.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                let closing = frame.is_close();
                if let Err(e) = ws_sender.send(frame).await {
                    debug!(session = %session_id, error = %e, "Write loop stopped");
                    break;
                }
                if closing {
                    break;
                }
            }
        })
    };

    let reason = loop {
        match ws_receiver.next().await {
            Some(Ok(WsMessage::Text(text))) => on_text(&relay, &session_id, text.as_str()),
            Some(Ok(WsMessage::Close(_))) => break "client closed",
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(session = %session_id, error = %e, "Read loop stopped");
                break "transport error";
            }
            None => break "connection dropped",
        }
    };

    lifecycle.close(&session_id, reason);
    let _ = writer.await;
}

fn on_text(relay: &RelayController, session_id: &str, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Message(body)) => match relay.handle_inbound(session_id, &body) {
            Ok(_) => {}
            Err(RelayError::EmptyMessage) => {
                debug!(session = session_id, "Ignoring empty message");
            }
            Err(e) => warn!(session = session_id, error = %e, "Message not relayed"),
        },
        Err(e) => {
            warn!(
                session = session_id,
                error = %e,
                "Invalid client event: {}",
                text.chars().take(100).collect::<String>()
            );
        }
    }
}
