//! Session lifecycle
//!
//! Opening a connection creates its `Session` and registers it; closing
//! removes it. A closed session id is never reused.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver};
use tracing::info;
use tungstenite::protocol::Message as WsMessage;

use crate::registry::{ConnectionRegistry, OUTBOUND_CAPACITY, Session, SessionId};

#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    registry: Arc<ConnectionRegistry>,
}

impl SessionLifecycle {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Register a new session. The returned receiver is the session's
    /// outbound queue and belongs to the connection's write loop.
    pub fn open(&self, peer: Option<SocketAddr>) -> (SessionId, Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let session = Session::new(tx);
        let id = session.id().to_string();
        self.registry.add(session);
        info!(session = %id, peer = ?peer, "New connection");
        (id, rx)
    }

    /// Unregister and close a session. Safe to call more than once.
    pub fn close(&self, id: &str, reason: &str) {
        if let Some(session) = self.registry.remove(id) {
            session.close();
            info!(session = %id, reason, "Disconnect");
        }
    }
}
