//! Connection registry
//!
//! Sessions are keyed by id, so a session is registered at most once.
//! The map sits behind a mutex because connect, disconnect and broker
//! deliveries arrive on different tasks. `broadcast` runs entirely under
//! the lock; sends only enqueue and never wait on the network.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info};

use super::session::{Session, SessionId};
use crate::relay::message::Message;
use crate::transport::message::ServerEvent;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session. Returns `false` and keeps the existing entry if
    /// the id is already present.
    pub fn add(&self, session: Session) -> bool {
        let mut sessions = self.sessions();
        if sessions.contains_key(session.id()) {
            return false;
        }
        sessions.insert(session.id().to_string(), session);
        true
    }

    /// Unregister a session. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Send `message` to every registered session and return how many
    /// accepted it. Sessions that fail are dropped from the registry; the
    /// rest still receive the message.
    pub fn broadcast(&self, message: &Message) -> usize {
        let frame = match ServerEvent::Message(message.clone()).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to encode outbound message");
                return 0;
            }
        };

        let mut sessions = self.sessions();
        let mut failed = Vec::new();
        for (id, session) in sessions.iter() {
            if let Err(e) = session.send(frame.clone()) {
                info!(session = %id, reason = %e, "Dropping unreachable session");
                failed.push(id.clone());
            }
        }

        for id in &failed {
            sessions.remove(id);
        }
        sessions.len()
    }
}
