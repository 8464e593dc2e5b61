//! In-process fanout exchange
//!
//! `MemoryExchange` plays the role of the broker's `messages` exchange for a
//! single process: each `MemoryGateway` bound to it behaves like one relay
//! process with its own exclusive queue. Bodies travel as encoded bytes so
//! the broker codec is exercised exactly as with AMQP.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{Gateway, HandlerSlot, ReceiveHandler};
use crate::relay::message::Message;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct MemoryExchange {
    sender: broadcast::Sender<Arc<Vec<u8>>>,
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Queue depth per bound gateway before slow consumers start losing
    /// messages.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Bind a new exclusive queue to the exchange and start consuming it.
    ///
    /// Only messages published after the bind are delivered. Must be called
    /// from within a tokio runtime.
    pub fn bind(&self) -> MemoryGateway {
        let handler = HandlerSlot::new();
        let mut queue = self.sender.subscribe();
        let slot = handler.clone();

        let consumer = tokio::spawn(async move {
            loop {
                match queue.recv().await {
                    Ok(body) => {
                        slot.deliver(&body);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "In-memory queue overflowed, messages lost");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        MemoryGateway {
            exchange: self.sender.clone(),
            handler,
            consumer,
        }
    }

    /// Number of queues currently bound.
    pub fn bound_queues(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryExchange {
    fn default() -> Self {
        Self::new()
    }
}

/// One process's view of a [`MemoryExchange`]. Dropping it deletes its queue.
#[derive(Debug)]
pub struct MemoryGateway {
    exchange: broadcast::Sender<Arc<Vec<u8>>>,
    handler: HandlerSlot,
    consumer: JoinHandle<()>,
}

impl Gateway for MemoryGateway {
    fn publish(&self, message: &Message) {
        let body = match message.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Dropping message that failed to encode");
                return;
            }
        };
        // No bound queue means nobody to deliver to, same as a fanout
        // exchange without bindings.
        let _ = self.exchange.send(Arc::new(body));
    }

    fn set_receive_handler(&self, handler: ReceiveHandler) {
        self.handler.replace(handler);
    }
}

impl Drop for MemoryGateway {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}
