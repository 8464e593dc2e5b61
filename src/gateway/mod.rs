//! The `gateway` module owns the link to the publish/subscribe exchange.
//!
//! A gateway publishes relay messages to a fanout exchange and hands every
//! message delivered to its exclusive queue to a registered receive handler.
//! `amqp` talks to a real broker; `memory` keeps the exchange inside the
//! process.

pub mod amqp;
pub mod memory;

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::relay::message::Message;

pub use amqp::AmqpGateway;
pub use memory::{MemoryExchange, MemoryGateway};

/// Name of the fanout exchange every relay process binds to.
pub const EXCHANGE_NAME: &str = "messages";

/// Callback invoked once per delivered message.
pub type ReceiveHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Publish side and delivery side of a broker connection.
pub trait Gateway: Send + Sync {
    /// Hand a message to the exchange. Never blocks on the broker and never
    /// reports failure to the caller.
    fn publish(&self, message: &Message);

    /// Replace the handler that receives broker deliveries.
    fn set_receive_handler(&self, handler: ReceiveHandler);
}

/// Holds the current receive handler and decodes deliveries for it.
///
/// Until a handler is registered, deliveries are decoded and logged only.
#[derive(Clone)]
pub struct HandlerSlot {
    handler: Arc<RwLock<ReceiveHandler>>,
}

impl HandlerSlot {
    pub fn new() -> Self {
        let noop: ReceiveHandler = Arc::new(|message: Message| {
            debug!(text = message.text(), "Message received. Nothing to do.");
        });
        Self {
            handler: Arc::new(RwLock::new(noop)),
        }
    }

    pub fn replace(&self, handler: ReceiveHandler) {
        let mut slot = self
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = handler;
    }

    /// Decode a broker body and pass it to the handler. Returns whether the
    /// handler ran.
    pub fn deliver(&self, payload: &[u8]) -> bool {
        let message = match Message::from_bytes(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Skipping undecodable delivery");
                return false;
            }
        };

        // Clone out of the lock so a handler may itself replace the slot.
        let handler = Arc::clone(&self.handler.read().unwrap_or_else(PoisonError::into_inner));
        handler(message);
        true
    }
}

impl Default for HandlerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSlot").finish_non_exhaustive()
    }
}
