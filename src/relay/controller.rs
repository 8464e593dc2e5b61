//! Relay controller
//!
//! Client text goes out to the broker only. Local sessions see a message
//! when the broker delivers it back, like every other process does.

use std::sync::Arc;

use tracing::debug;

use super::clock::MonotonicClock;
use super::message::Message;
use crate::gateway::{Gateway, ReceiveHandler};
use crate::registry::ConnectionRegistry;
use crate::utils::error::RelayError;

/// Routes client text to the broker and broker deliveries to the sessions.
pub struct RelayController {
    gateway: Arc<dyn Gateway>,
    registry: Arc<ConnectionRegistry>,
    clock: MonotonicClock,
}

impl RelayController {
    /// Take over the gateway's receive handler so that every delivery is
    /// broadcast to `registry`.
    pub fn new(gateway: Arc<dyn Gateway>, registry: Arc<ConnectionRegistry>) -> Self {
        let sessions = Arc::clone(&registry);
        let on_delivery: ReceiveHandler = Arc::new(move |message: Message| {
            let delivered = sessions.broadcast(&message);
            debug!(delivered, text = message.text(), "Relayed broker message");
        });
        gateway.set_receive_handler(on_delivery);

        Self {
            gateway,
            registry,
            clock: MonotonicClock::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Stamp `text` and publish it. Nothing is sent to local sessions here.
    ///
    /// The publish happens while the clock is held, so concurrent callers
    /// enqueue in timestamp order.
    pub fn handle_inbound(&self, session_id: &str, text: &str) -> Result<Message, RelayError> {
        self.clock.stamp(|now| -> Result<Message, RelayError> {
            let message = Message::new(text, now)?;
            debug!(session = session_id, text, "New message");
            self.gateway.publish(&message);
            Ok(message)
        })
    }
}

impl std::fmt::Debug for RelayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayController")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
