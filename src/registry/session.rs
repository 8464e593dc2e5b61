//! Client session handle
//!
//! A `Session` is the registry's handle on one live WebSocket connection.
//! It owns the sending half of the connection's outbound queue; the
//! transport's write loop owns the receiving half. Once closed, a session
//! never reopens.
//!
//! The queue is bounded. A client that stops reading until its queue fills
//! up fails the next send and is dropped like a dead connection.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::utils::error::SessionError;

pub type SessionId = String;

/// Frames a session may have queued before it counts as unreachable.
pub const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    sender: Sender<WsMessage>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(sender: Sender<WsMessage>) -> Self {
        Self {
            id: format!("session-{}", Uuid::new_v4()),
            sender,
            closed: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_id(id: &str, sender: Sender<WsMessage>) -> Self {
        Self {
            id: id.to_string(),
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A session also counts as closed once its write loop has gone away.
    pub fn state(&self) -> SessionState {
        if self.closed.load(Ordering::SeqCst) || self.sender.is_closed() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    /// Queue a frame for this client.
    pub fn send(&self, frame: WsMessage) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed(self.id.clone()));
        }
        match self.sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SessionError::Lagging(self.id.clone())),
            Err(TrySendError::Closed(_)) => Err(SessionError::Write(self.id.clone())),
        }
    }

    /// Ask the write loop to send a Close frame and stop. Idempotent.
    ///
    /// With a full queue the Close frame is skipped; the write loop still
    /// stops once the session is dropped.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.sender.try_send(WsMessage::Close(None));
        }
    }
}
